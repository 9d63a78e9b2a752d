//! 文档存储层
//!
//! - `traits`: 存储接口
//! - `query`: 类型化过滤器与聚合管道
//! - `builder`: 回源查询构建
//! - `postgres` / `memory`: 两种后端实现

mod builder;
mod error;
mod memory;
mod postgres;
pub mod query;
mod traits;

pub use builder::{CampaignQueryBuilder, PROJECTED_FIELDS};
pub use error::StoreError;
pub use memory::MemoryDocumentStore;
pub use postgres::PgDocumentStore;
pub use query::{Filter, Pipeline, SortOrder, Stage};
#[cfg(test)]
pub use traits::MockDocumentStore;
pub use traits::DocumentStore;
