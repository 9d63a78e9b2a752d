//! 活动投放服务
//!
//! 启动顺序：加载配置 → 初始化可观测性 → 选择存储后端 → 预热缓存 → 对外服务。
//! 预热失败时不绑定端口，以独立退出码结束进程。

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use campaign_delivery::{
    AppState, CacheLoader, CacheRefreshWorker, CampaignCacheHandle, DeliveryService,
    DeliveryServiceConfig, DocumentStore, KnownDimensions, MemoryDocumentStore, PgDocumentStore,
    RuleCompiler, routes,
};
use delivery_shared::{
    config::{AppConfig, StoreBackend},
    database::Database,
    observability,
};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

const SERVICE_NAME: &str = "campaign-delivery";

/// 缓存预热失败的退出码
const EXIT_WARM_UP_FAILED: u8 = 2;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let config = AppConfig::load(SERVICE_NAME).context("加载配置失败")?;

    let obs_config = config
        .observability
        .clone()
        .with_service_name(&config.service_name);
    let _guard = observability::init(&obs_config).await?;

    config.validate()?;
    info!(
        environment = %config.environment,
        backend = ?config.store.backend,
        "Starting {} on {}",
        SERVICE_NAME,
        config.server_addr()
    );

    let store = build_store(&config).await?;

    let delivery = &config.delivery;
    let compiler = Arc::new(RuleCompiler::new(KnownDimensions::new(
        delivery.os.iter().cloned(),
        delivery.apps.iter().cloned(),
    )));
    let loader = Arc::new(CacheLoader::new(
        store.clone(),
        compiler,
        delivery.countries.clone(),
        delivery.campaigns_collection.clone(),
    ));
    let cache = Arc::new(CampaignCacheHandle::new());

    if let Err(e) = loader.warm_up(&cache).await {
        error!(unit = %e.unit(), code = e.error_code(), error = %e, "缓存预热失败，服务退出");
        return Ok(ExitCode::from(EXIT_WARM_UP_FAILED));
    }

    if let Some(seconds) = delivery.refresh_interval_seconds.filter(|s| *s > 0) {
        CacheRefreshWorker::new(loader.clone(), cache.clone(), Duration::from_secs(seconds))
            .spawn();
    }

    let service = Arc::new(DeliveryService::new(
        store,
        cache,
        DeliveryServiceConfig::from(delivery),
    ));
    let app = routes::build_router(
        AppState::new(service),
        Duration::from_secs(config.server.request_timeout_seconds),
    );

    let listener = TcpListener::bind(config.server_addr()).await?;
    info!("Listening on {}", config.server_addr());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");

    Ok(ExitCode::SUCCESS)
}

/// 按配置构建文档存储
async fn build_store(config: &AppConfig) -> anyhow::Result<Arc<dyn DocumentStore>> {
    let store: Arc<dyn DocumentStore> = match config.store.backend {
        StoreBackend::Postgres => {
            let db = Database::connect(&config.database).await?;
            Arc::new(PgDocumentStore::new(db))
        }
        StoreBackend::Memory => match &config.store.seed_path {
            Some(path) => Arc::new(
                MemoryDocumentStore::from_json_file(path)
                    .await
                    .with_context(|| format!("读取预置数据失败: {path}"))?,
            ),
            None => Arc::new(MemoryDocumentStore::new()),
        },
    };
    Ok(store)
}

/// 监听关闭信号
///
/// 收到 Ctrl+C 或 SIGTERM 后返回，触发 axum 的优雅关闭流程。
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "注册 Ctrl+C 处理器失败");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "注册 SIGTERM 处理器失败");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, initiating graceful shutdown..."),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown..."),
    }
}
