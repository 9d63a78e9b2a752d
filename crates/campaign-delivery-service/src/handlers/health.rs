//! 健康检查处理器

use axum::{Json, extract::State, http::StatusCode};
use serde_json::{Value, json};
use tracing::warn;

use crate::state::AppState;

/// 就绪探针：缓存发布前返回 503
///
/// GET /health
///
/// 存储状态只出现在 `checks` 中，不影响状态码：缓存命中的请求不依赖存储。
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let store = match state.service.store_health().await {
        Ok(()) => "ok",
        Err(e) => {
            warn!(code = e.error_code(), error = %e, "存储健康检查失败");
            "fail"
        }
    };

    match state.cache.stats() {
        Some(stats) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "service": "campaign-delivery",
                "cache": stats,
                "checks": { "store": store }
            })),
        ),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "warming_up",
                "service": "campaign-delivery",
                "checks": { "store": store }
            })),
        ),
    }
}
