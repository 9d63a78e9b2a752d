//! 活动资格缓存
//!
//! ## 模块结构
//!
//! - `store`: 国家索引与活动表
//! - `handle`: 已发布缓存的原子引用
//! - `loader`: 并发预热与全量刷新
//! - `refresh`: 定时刷新 Worker

mod error;
mod handle;
mod loader;
mod refresh;
mod store;

pub use error::{CacheError, CacheLoadError};
pub use handle::CampaignCacheHandle;
pub use loader::{CacheLoader, LoadUnit};
pub use refresh::CacheRefreshWorker;
pub use store::{CacheSnapshot, CacheStats, CampaignCache};
