//! Prometheus 指标模块
//!
//! 基于 metrics crate 和 metrics-exporter-prometheus 实现指标收集与导出。
//! 指标通过独立的 HTTP 端口暴露，供 Prometheus 抓取。

use anyhow::Result;
use axum::{Router, routing::get};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{error, info};

use super::ObservabilityConfig;

/// 缓存命中计数器
pub const CACHE_HITS_TOTAL: &str = "campaign_cache_hits_total";
/// 缓存未命中计数器
pub const CACHE_MISSES_TOTAL: &str = "campaign_cache_misses_total";
/// 投放请求耗时直方图
pub const DELIVERY_REQUEST_DURATION: &str = "delivery_request_duration_seconds";
/// 缓存加载次数
pub const CACHE_LOADS_TOTAL: &str = "campaign_cache_loads_total";

/// Metrics 资源守卫
pub struct MetricsHandle {
    _server_handle: tokio::task::JoinHandle<()>,
}

/// 初始化 Prometheus 指标导出
///
/// 启动一个独立的 HTTP 服务器在指定端口暴露 `/metrics` 端点。
pub async fn init(config: &ObservabilityConfig) -> Result<MetricsHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    register_common_metrics(&config.service_name);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.metrics_port));
    let server_handle = start_metrics_server(addr, handle).await?;

    Ok(MetricsHandle {
        _server_handle: server_handle,
    })
}

/// 注册投放服务的指标描述
fn register_common_metrics(service_name: &str) {
    metrics::describe_counter!("http_requests_total", "Total number of HTTP requests");
    metrics::describe_histogram!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds"
    );

    metrics::describe_counter!(CACHE_HITS_TOTAL, "Requests answered from the campaign cache");
    metrics::describe_counter!(
        CACHE_MISSES_TOTAL,
        "Requests that fell back to a store query"
    );
    metrics::describe_histogram!(
        DELIVERY_REQUEST_DURATION,
        "Campaign delivery request duration in seconds"
    );
    metrics::describe_counter!(CACHE_LOADS_TOTAL, "Campaign cache load attempts");

    metrics::counter!("service_starts_total", "service" => service_name.to_string()).increment(1);
}

/// 启动指标 HTTP 服务器
async fn start_metrics_server(
    addr: SocketAddr,
    handle: PrometheusHandle,
) -> Result<tokio::task::JoinHandle<()>> {
    let app = Router::new()
        .route("/metrics", get(move || std::future::ready(handle.render())))
        .route("/health", get(|| async { "OK" }));

    let listener = TcpListener::bind(addr).await?;
    info!("Metrics server listening on {}", addr);

    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Metrics server error: {}", e);
        }
    });

    Ok(server_handle)
}

// ============================================================================
// 便捷的指标记录函数
// ============================================================================

/// 记录 HTTP 请求
#[inline]
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let status_str = status.to_string();
    metrics::counter!(
        "http_requests_total",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status_str.clone()
    )
    .increment(1);

    metrics::histogram!(
        "http_request_duration_seconds",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status_str
    )
    .record(duration_secs);
}

/// 记录一次缓存命中
///
/// 不带请求维度标签，请求值由客户端决定，不能进入时间序列
#[inline]
pub fn record_cache_hit() {
    metrics::counter!(CACHE_HITS_TOTAL).increment(1);
}

/// 记录一次缓存未命中（回源查询）
#[inline]
pub fn record_cache_miss() {
    metrics::counter!(CACHE_MISSES_TOTAL).increment(1);
}

/// 记录投放请求耗时
///
/// `variant` 区分基础查询与多维度查询，`outcome` 为 hit/miss/error
#[inline]
pub fn record_delivery_request(variant: &str, outcome: &str, duration_secs: f64) {
    metrics::histogram!(
        DELIVERY_REQUEST_DURATION,
        "variant" => variant.to_string(),
        "outcome" => outcome.to_string()
    )
    .record(duration_secs);
}

/// 记录缓存加载结果
#[inline]
pub fn record_cache_load(trigger: &str, status: &str) {
    metrics::counter!(
        CACHE_LOADS_TOTAL,
        "trigger" => trigger.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}
