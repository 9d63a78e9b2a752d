//! 缓存加载器
//!
//! 在一个全新的缓存上并发执行加载单元：一个单元读取并编译全部活动详情，
//! 每个已知国家一个单元读取该国的活动 ID 列表。所有单元通过 `JoinSet` 汇合，
//! 任一单元失败即中止其余单元并返回错误；全部成功后才发布新缓存。

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use delivery_shared::observability::metrics;
use futures::FutureExt;
use serde_json::Value;
use tokio::task::JoinSet;
use tracing::{error, info, instrument, warn};

use super::error::CacheLoadError;
use super::handle::CampaignCacheHandle;
use super::store::CampaignCache;
use crate::models::{CampaignDocument, CampaignIdDocument};
use crate::store::DocumentStore;
use crate::targeting::RuleCompiler;

/// 加载单元
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadUnit {
    Campaigns,
    Country(String),
}

impl fmt::Display for LoadUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Campaigns => write!(f, "campaigns"),
            Self::Country(country) => write!(f, "country:{}", country),
        }
    }
}

/// 缓存加载器
pub struct CacheLoader<S: ?Sized> {
    store: Arc<S>,
    compiler: Arc<RuleCompiler>,
    countries: Vec<String>,
    campaigns_collection: String,
}

impl<S> CacheLoader<S>
where
    S: DocumentStore + ?Sized + 'static,
{
    pub fn new(
        store: Arc<S>,
        compiler: Arc<RuleCompiler>,
        countries: Vec<String>,
        campaigns_collection: impl Into<String>,
    ) -> Self {
        Self {
            store,
            compiler,
            countries,
            campaigns_collection: campaigns_collection.into(),
        }
    }

    /// 构建一份完整的新缓存，不发布
    #[instrument(skip(self), fields(countries = self.countries.len()))]
    pub async fn load(&self) -> Result<Arc<CampaignCache>, CacheLoadError> {
        let start = Instant::now();
        let cache = Arc::new(CampaignCache::new());
        let mut units = JoinSet::new();

        {
            let unit = LoadUnit::Campaigns;
            let store = self.store.clone();
            let compiler = self.compiler.clone();
            let cache = cache.clone();
            let collection = self.campaigns_collection.clone();
            units.spawn(guarded(
                unit.clone(),
                load_campaigns(unit, store, compiler, cache, collection),
            ));
        }

        for country in &self.countries {
            let unit = LoadUnit::Country(country.clone());
            let store = self.store.clone();
            let cache = cache.clone();
            let country = country.clone();
            units.spawn(guarded(
                unit.clone(),
                load_country(unit, store, cache, country),
            ));
        }

        while let Some(joined) = units.join_next().await {
            let outcome = match joined {
                Ok(outcome) => outcome,
                Err(e) => Err(CacheLoadError::UnitPanicked {
                    unit: "unknown".to_string(),
                    message: e.to_string(),
                }),
            };

            if let Err(e) = outcome {
                units.abort_all();
                error!(unit = %e.unit(), error = %e, "缓存加载失败");
                return Err(e);
            }
        }

        cache.mark_loaded();

        let orphans = cache.orphans();
        if !orphans.is_empty() {
            warn!(orphans = ?orphans, "国家索引引用了不存在的活动，查询时将跳过");
        }

        let stats = cache.stats();
        info!(
            countries = stats.countries,
            campaigns = stats.campaigns,
            orphans = stats.orphans,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "活动缓存加载完成"
        );

        Ok(cache)
    }

    /// 启动预热：加载成功后发布，失败时句柄保持未发布
    pub async fn warm_up(&self, handle: &CampaignCacheHandle) -> Result<(), CacheLoadError> {
        match self.load().await {
            Ok(cache) => {
                handle.publish(cache);
                metrics::record_cache_load("startup", "success");
                Ok(())
            }
            Err(e) => {
                metrics::record_cache_load("startup", "failed");
                Err(e)
            }
        }
    }

    /// 全量刷新：失败时保留已发布的旧缓存
    pub async fn reload(&self, handle: &CampaignCacheHandle) -> Result<(), CacheLoadError> {
        match self.load().await {
            Ok(cache) => {
                handle.publish(cache);
                metrics::record_cache_load("refresh", "success");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "缓存刷新失败，继续使用旧缓存");
                metrics::record_cache_load("refresh", "failed");
                Err(e)
            }
        }
    }
}

/// 将单元内的 panic 转换为带单元名的错误
async fn guarded<F>(unit: LoadUnit, fut: F) -> Result<(), CacheLoadError>
where
    F: std::future::Future<Output = Result<(), CacheLoadError>>,
{
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(CacheLoadError::UnitPanicked {
                unit: unit.to_string(),
                message,
            })
        }
    }
}

async fn fetch<S>(unit: &LoadUnit, store: &S, collection: &str) -> Result<Vec<Value>, CacheLoadError>
where
    S: DocumentStore + ?Sized,
{
    store
        .find_all(collection)
        .await
        .map_err(|source| CacheLoadError::Store {
            unit: unit.to_string(),
            source,
        })
}

async fn load_campaigns<S>(
    unit: LoadUnit,
    store: Arc<S>,
    compiler: Arc<RuleCompiler>,
    cache: Arc<CampaignCache>,
    collection: String,
) -> Result<(), CacheLoadError>
where
    S: DocumentStore + ?Sized,
{
    let docs = fetch(&unit, store.as_ref(), &collection).await?;

    let mut campaigns = Vec::with_capacity(docs.len());
    for doc in docs {
        let doc: CampaignDocument =
            serde_json::from_value(doc).map_err(|source| CacheLoadError::Decode {
                unit: unit.to_string(),
                source,
            })?;
        campaigns.push(compiler.compile(doc));
    }

    let count = campaigns.len();
    cache.set_campaigns(campaigns);
    info!(unit = %unit, count, "活动详情已加载");
    Ok(())
}

async fn load_country<S>(
    unit: LoadUnit,
    store: Arc<S>,
    cache: Arc<CampaignCache>,
    country: String,
) -> Result<(), CacheLoadError>
where
    S: DocumentStore + ?Sized,
{
    let docs = fetch(&unit, store.as_ref(), &country).await?;

    let ids = docs
        .into_iter()
        .map(|doc| serde_json::from_value::<CampaignIdDocument>(doc).map(|d| d.id))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| CacheLoadError::Decode {
            unit: unit.to_string(),
            source,
        })?;

    let count = ids.len();
    cache.set_country_campaigns(&country, ids);
    info!(unit = %unit, count, "国家活动列表已加载");
    Ok(())
}
