//! 缓存定时刷新 Worker
//!
//! 以固定间隔全量重新加载活动缓存，失败时保留旧缓存等待下一轮。

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use super::handle::CampaignCacheHandle;
use super::loader::CacheLoader;
use crate::store::DocumentStore;

pub struct CacheRefreshWorker<S: ?Sized> {
    loader: Arc<CacheLoader<S>>,
    handle: Arc<CampaignCacheHandle>,
    interval: Duration,
}

impl<S> CacheRefreshWorker<S>
where
    S: DocumentStore + ?Sized + 'static,
{
    pub fn new(
        loader: Arc<CacheLoader<S>>,
        handle: Arc<CampaignCacheHandle>,
        interval: Duration,
    ) -> Self {
        Self {
            loader,
            handle,
            interval,
        }
    }

    /// 主循环：启动时已完成预热，先等待一个间隔再刷新
    pub async fn run(&self) {
        info!(interval = ?self.interval, "CacheRefreshWorker 已启动");

        loop {
            tokio::time::sleep(self.interval).await;
            // 失败已在 reload 中记录
            let _ = self.loader.reload(&self.handle).await;
        }
    }

    /// 在后台任务中运行
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move { self.run().await })
    }
}
