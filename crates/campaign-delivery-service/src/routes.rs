//! 路由配置模块

use std::time::Duration;

use axum::{Router, middleware, routing::get};
use delivery_shared::observability::middleware as obs_middleware;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::{handlers, state::AppState};

/// 投放查询路由
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/v1/delivery", get(handlers::delivery::get_delivery))
        .route("/v1/campaigns", get(handlers::delivery::get_campaigns))
}

/// 构建完整应用路由
///
/// 中间件自外向内：request_id → http_tracing → TraceLayer → 超时
pub fn build_router(state: AppState, request_timeout: Duration) -> Router {
    Router::new()
        .merge(api_routes())
        .route("/health", get(handlers::health::health_check))
        .method_not_allowed_fallback(handlers::delivery::method_not_allowed)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(obs_middleware::http_tracing))
        .layer(middleware::from_fn(obs_middleware::request_id))
        .with_state(state)
}
