//! 服务层
//!
//! 组合缓存与文档存储，对外提供两种投放查询

mod delivery_service;

pub use delivery_service::{CacheOutcome, DeliveryService, DeliveryServiceConfig};
