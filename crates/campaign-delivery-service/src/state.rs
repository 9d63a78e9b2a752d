//! 应用状态定义

use std::sync::Arc;

use crate::cache::CampaignCacheHandle;
use crate::service::DeliveryService;
use crate::store::DocumentStore;

/// 具体后端在启动时选定，路由只看到存储接口
pub type DynDeliveryService = DeliveryService<dyn DocumentStore>;

/// Axum 应用共享状态
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<DynDeliveryService>,
    pub cache: Arc<CampaignCacheHandle>,
}

impl AppState {
    pub fn new(service: Arc<DynDeliveryService>) -> Self {
        let cache = service.cache().clone();
        Self { service, cache }
    }
}
