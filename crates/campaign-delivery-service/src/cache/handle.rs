//! 缓存发布句柄
//!
//! 持有当前已发布的缓存引用。重新加载在旁路构建完整的新缓存后原子替换，
//! 读取方拿到的引用在其生命周期内不受替换影响。

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use tracing::info;

use super::error::CacheError;
use super::store::{CacheStats, CampaignCache};
use crate::models::Campaign;

#[derive(Default)]
pub struct CampaignCacheHandle {
    current: ArcSwapOption<CampaignCache>,
}

impl CampaignCacheHandle {
    /// 创建未发布任何缓存的句柄
    pub fn new() -> Self {
        Self::default()
    }

    /// 原子发布新的缓存
    pub fn publish(&self, cache: Arc<CampaignCache>) {
        let stats = cache.stats();
        self.current.store(Some(cache));
        info!(
            countries = stats.countries,
            campaigns = stats.campaigns,
            orphans = stats.orphans,
            "活动缓存已发布"
        );
    }

    /// 当前已发布的缓存
    pub fn current(&self) -> Result<Arc<CampaignCache>, CacheError> {
        self.current.load_full().ok_or(CacheError::NotReady)
    }

    pub fn is_ready(&self) -> bool {
        self.current.load().is_some()
    }

    /// 读取某个国家的活动
    ///
    /// 缓存未发布时返回错误；已发布时未知国家返回空列表。
    pub fn get_campaigns_by_country(&self, country: &str) -> Result<Vec<Arc<Campaign>>, CacheError> {
        Ok(self.current()?.campaigns_by_country(country))
    }

    pub fn stats(&self) -> Option<CacheStats> {
        self.current.load_full().map(|cache| cache.stats())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unpublished_handle_is_not_ready() {
        let handle = CampaignCacheHandle::new();
        assert!(!handle.is_ready());
        assert!(matches!(
            handle.get_campaigns_by_country("us"),
            Err(CacheError::NotReady)
        ));
        assert!(handle.stats().is_none());
    }

    #[test]
    fn test_publish_swaps_reference() {
        let handle = CampaignCacheHandle::new();

        let first = Arc::new(CampaignCache::new());
        first.set_country_campaigns("us", vec!["a".to_string()]);
        handle.publish(first);

        let held = handle.current().unwrap();

        let second = Arc::new(CampaignCache::new());
        handle.publish(second);

        // 旧引用仍然可读
        assert_eq!(held.country_campaign_ids("us").len(), 1);
        assert!(handle.current().unwrap().country_campaign_ids("us").is_empty());
        assert!(handle.get_campaigns_by_country("us").unwrap().is_empty());
    }
}
