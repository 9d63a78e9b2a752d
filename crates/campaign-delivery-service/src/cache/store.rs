//! 活动缓存
//!
//! 两张独立加锁的表：国家 → 有序活动 ID 列表，活动 ID → 编译后的活动。
//! 条目按键整体替换，没有删除或过期操作，内容只随全量重新加载更新。

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

use crate::models::Campaign;

/// 缓存统计
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub countries: usize,
    pub campaigns: usize,
    /// 出现在国家索引中但不在活动表中的 ID 数量
    pub orphans: usize,
    /// 最近一次全量加载完成的时间
    pub loaded_at: DateTime<Utc>,
}

/// 缓存内容的确定性快照，用于比较两次加载结果
#[derive(Debug, Clone, PartialEq)]
pub struct CacheSnapshot {
    pub countries: BTreeMap<String, Vec<String>>,
    pub campaigns: BTreeMap<String, Campaign>,
}

#[derive(Debug)]
pub struct CampaignCache {
    country_index: RwLock<HashMap<String, Arc<Vec<String>>>>,
    campaigns: RwLock<HashMap<String, Arc<Campaign>>>,
    loaded_at: RwLock<DateTime<Utc>>,
}

impl Default for CampaignCache {
    fn default() -> Self {
        Self::new()
    }
}

impl CampaignCache {
    pub fn new() -> Self {
        Self {
            country_index: RwLock::new(HashMap::new()),
            campaigns: RwLock::new(HashMap::new()),
            loaded_at: RwLock::new(Utc::now()),
        }
    }

    /// 替换某个国家的活动 ID 列表
    pub fn set_country_campaigns(&self, country: &str, ids: Vec<String>) {
        self.country_index
            .write()
            .insert(country.to_string(), Arc::new(ids));
    }

    /// 某个国家的活动 ID 列表，未知国家返回空列表
    pub fn country_campaign_ids(&self, country: &str) -> Arc<Vec<String>> {
        self.country_index
            .read()
            .get(country)
            .cloned()
            .unwrap_or_default()
    }

    /// 替换一个活动
    pub fn set_campaign(&self, campaign: Campaign) {
        self.campaigns
            .write()
            .insert(campaign.id.clone(), Arc::new(campaign));
    }

    /// 批量替换活动，只获取一次写锁
    pub fn set_campaigns(&self, campaigns: impl IntoIterator<Item = Campaign>) {
        let mut table = self.campaigns.write();
        for campaign in campaigns {
            table.insert(campaign.id.clone(), Arc::new(campaign));
        }
    }

    pub fn campaign(&self, id: &str) -> Option<Arc<Campaign>> {
        self.campaigns.read().get(id).cloned()
    }

    /// 按国家索引顺序取出活动，跳过孤儿 ID
    pub fn campaigns_by_country(&self, country: &str) -> Vec<Arc<Campaign>> {
        let ids = self.country_campaign_ids(country);
        if ids.is_empty() {
            return Vec::new();
        }

        let table = self.campaigns.read();
        ids.iter().filter_map(|id| table.get(id).cloned()).collect()
    }

    /// 国家索引中引用了不存在活动的 ID，按国家排序
    pub fn orphans(&self) -> BTreeMap<String, Vec<String>> {
        let index = self.country_index.read();
        let table = self.campaigns.read();
        index
            .iter()
            .filter_map(|(country, ids)| {
                let missing: Vec<String> = ids
                    .iter()
                    .filter(|id| !table.contains_key(*id))
                    .cloned()
                    .collect();
                (!missing.is_empty()).then(|| (country.clone(), missing))
            })
            .collect()
    }

    pub fn stats(&self) -> CacheStats {
        let index = self.country_index.read();
        let table = self.campaigns.read();
        let orphans = index
            .values()
            .flat_map(|ids| ids.iter())
            .filter(|id| !table.contains_key(*id))
            .count();

        CacheStats {
            countries: index.len(),
            campaigns: table.len(),
            orphans,
            loaded_at: self.loaded_at(),
        }
    }

    pub fn snapshot(&self) -> CacheSnapshot {
        let countries = self
            .country_index
            .read()
            .iter()
            .map(|(country, ids)| (country.clone(), ids.as_ref().clone()))
            .collect();
        let campaigns = self
            .campaigns
            .read()
            .iter()
            .map(|(id, campaign)| (id.clone(), campaign.as_ref().clone()))
            .collect();

        CacheSnapshot {
            countries,
            campaigns,
        }
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        *self.loaded_at.read()
    }

    /// 记录全量加载完成时间
    pub fn mark_loaded(&self) {
        *self.loaded_at.write() = Utc::now();
    }
}
