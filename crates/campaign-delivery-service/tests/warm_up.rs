//! 启动预热集成测试

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use campaign_delivery::{
    AppState, CacheLoadError, CacheLoader, CampaignCacheHandle, DeliveryService,
    DeliveryServiceConfig, DocumentStore, KnownDimensions, MemoryDocumentStore, RuleCompiler,
    routes,
};
use serde_json::json;
use tower::ServiceExt;

fn loader(store: Arc<MemoryDocumentStore>) -> CacheLoader<MemoryDocumentStore> {
    CacheLoader::new(
        store,
        Arc::new(RuleCompiler::new(KnownDimensions::new(["android", "ios"], ["com.abc.xyz"]))),
        vec!["us".to_string(), "india".to_string()],
        "campaigns_details",
    )
}

#[tokio::test]
async fn test_unreachable_store_leaves_service_unready() {
    let store = Arc::new(MemoryDocumentStore::new());
    store.set_available(false);
    let cache = Arc::new(CampaignCacheHandle::new());

    let err = loader(store.clone()).warm_up(&cache).await.unwrap_err();
    assert!(matches!(err, CacheLoadError::Store { .. }));
    assert!(!cache.is_ready());

    let dyn_store: Arc<dyn DocumentStore> = store;
    let service = DeliveryService::new(dyn_store, cache, DeliveryServiceConfig::default());
    let app = routes::build_router(AppState::new(Arc::new(service)), Duration::from_secs(5));

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_malformed_campaign_fails_warm_up() {
    let store = MemoryDocumentStore::from_seed(json!({
        "campaigns_details": [{ "name": "no id", "isActive": true }],
        "us": [{ "_id": "x" }]
    }))
    .unwrap();
    let cache = CampaignCacheHandle::new();

    let err = loader(Arc::new(store)).warm_up(&cache).await.unwrap_err();

    assert_eq!(err.unit(), "campaigns");
    assert_eq!(err.error_code(), "CACHE_LOAD_DECODE_ERROR");
    assert!(!cache.is_ready());
}

#[tokio::test]
async fn test_empty_store_warms_up_empty_cache() {
    let cache = CampaignCacheHandle::new();

    loader(Arc::new(MemoryDocumentStore::new()))
        .warm_up(&cache)
        .await
        .unwrap();

    let stats = cache.stats().unwrap();
    assert_eq!(stats.countries, 2);
    assert_eq!(stats.campaigns, 0);
    assert!(cache.get_campaigns_by_country("us").unwrap().is_empty());
}
