//! 活动投放服务
//!
//! 按请求方的应用、国家和操作系统返回有资格投放的活动列表。
//!
//! ## 核心功能
//!
//! - **预热缓存**：启动时并发加载全部活动详情和各国家活动列表，编译定向规则
//! - **进程内判定**：缓存命中时只做内存查表，不访问存储
//! - **回源查询**：缓存不可用或维度超出缓存能力时，构建聚合管道由存储侧筛选
//! - **维度白名单**：多维度查询的维度名由配置文档约束
//!
//! ## 模块结构
//!
//! - `models`: 活动文档、编译后的活动与请求模型
//! - `targeting`: 定向规则编译与资格判定
//! - `cache`: 活动缓存、发布句柄、加载与刷新
//! - `store`: 文档存储接口、查询 AST 与两种后端
//! - `service`: 缓存优先的投放服务
//! - `handlers` / `routes` / `state`: HTTP 接入
//! - `error`: 错误类型定义

pub mod cache;
pub mod error;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod service;
pub mod state;
pub mod store;
pub mod targeting;

pub use cache::{CacheLoadError, CacheLoader, CacheRefreshWorker, CampaignCache, CampaignCacheHandle};
pub use error::{DeliveryError, Result};
pub use models::{Campaign, CampaignSummary, DimensionQuery, PageRequest};
pub use service::{CacheOutcome, DeliveryService, DeliveryServiceConfig};
pub use state::AppState;
pub use store::{DocumentStore, MemoryDocumentStore, PgDocumentStore, StoreError};
pub use targeting::{EligibilityEvaluator, KnownDimensions, RuleCompiler};
