//! 活动投放服务
//!
//! 缓存优先：先读取已发布的活动缓存并在进程内判定资格；
//! 缓存无法回答时构建存储侧查询回源，回源结果直接返回，不再经过进程内判定。
//!
//! ## 多维度查询
//!
//! - 维度名必须出现在服务端维度白名单中（配置文档，首次读取成功后缓存）
//! - 只有维度恰好为 {app, country, os} 时缓存才能回答，命中后按国家索引顺序分页
//! - 其余维度组合直接回源

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use delivery_shared::config::DeliveryConfig;
use delivery_shared::observability::metrics;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument, warn};
use validator::Validate;

use crate::cache::CampaignCacheHandle;
use crate::error::{DeliveryError, Result};
use crate::models::{Campaign, CampaignSummary, DimensionQuery, PageRequest};
use crate::store::{CampaignQueryBuilder, DocumentStore, Filter, StoreError};
use crate::targeting::EligibilityEvaluator;

/// 请求是如何被回答的
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    /// 由缓存回答（包括国家下没有活动）
    Hit,
    /// 缓存不可用，回源
    Miss,
    /// 维度组合超出缓存能力，直接回源
    Bypass,
}

impl CacheOutcome {
    fn as_str(self) -> &'static str {
        match self {
            Self::Hit => "hit",
            Self::Miss => "miss",
            Self::Bypass => "bypass",
        }
    }
}

/// 投放服务配置
#[derive(Debug, Clone)]
pub struct DeliveryServiceConfig {
    pub campaigns_collection: String,
    pub config_collection: String,
    pub dimension_config_id: String,
    pub query_timeout: Duration,
}

impl From<&DeliveryConfig> for DeliveryServiceConfig {
    fn from(config: &DeliveryConfig) -> Self {
        Self {
            campaigns_collection: config.campaigns_collection.clone(),
            config_collection: config.config_collection.clone(),
            dimension_config_id: config.dimension_config_id.clone(),
            query_timeout: Duration::from_millis(config.query_timeout_ms),
        }
    }
}

impl Default for DeliveryServiceConfig {
    fn default() -> Self {
        Self::from(&DeliveryConfig::default())
    }
}

/// 维度白名单配置文档
#[derive(Debug, Deserialize)]
struct DimensionConfigDocument {
    #[serde(default)]
    rules: Vec<String>,
}

/// 活动投放服务
pub struct DeliveryService<S: ?Sized> {
    store: Arc<S>,
    cache: Arc<CampaignCacheHandle>,
    query_builder: CampaignQueryBuilder,
    config: DeliveryServiceConfig,
    dimensions: OnceCell<Arc<HashSet<String>>>,
}

impl<S> DeliveryService<S>
where
    S: DocumentStore + ?Sized,
{
    pub fn new(
        store: Arc<S>,
        cache: Arc<CampaignCacheHandle>,
        config: DeliveryServiceConfig,
    ) -> Self {
        Self {
            store,
            cache,
            query_builder: CampaignQueryBuilder::new(),
            config,
            dimensions: OnceCell::new(),
        }
    }

    pub fn cache(&self) -> &Arc<CampaignCacheHandle> {
        &self.cache
    }

    /// 存储连通性检查，受查询超时约束
    pub async fn store_health(&self) -> Result<()> {
        self.with_deadline(self.store.health_check()).await
    }

    /// 按 app、country、os 查询可投放活动
    pub async fn get_campaigns(
        &self,
        app: &str,
        country: &str,
        os: &str,
    ) -> Result<Vec<CampaignSummary>> {
        self.get_campaigns_with_outcome(app, country, os)
            .await
            .map(|(campaigns, _)| campaigns)
    }

    /// 同 `get_campaigns`，额外返回缓存命中情况
    #[instrument(skip(self))]
    pub async fn get_campaigns_with_outcome(
        &self,
        app: &str,
        country: &str,
        os: &str,
    ) -> Result<(Vec<CampaignSummary>, CacheOutcome)> {
        let start = Instant::now();

        let result = match self.cache.get_campaigns_by_country(country) {
            Ok(campaigns) => {
                metrics::record_cache_hit();
                Ok((evaluate(&campaigns, app, os), CacheOutcome::Hit))
            }
            Err(e) => {
                metrics::record_cache_miss();
                warn!(error = %e, "缓存未命中，回源查询");
                let dimensions = BTreeMap::from([
                    ("app".to_string(), app.to_string()),
                    ("country".to_string(), country.to_string()),
                    ("os".to_string(), os.to_string()),
                ]);
                self.query_store(&dimensions, None)
                    .await
                    .map(|campaigns| (campaigns, CacheOutcome::Miss))
            }
        };

        record_latency("base", &result, start);
        result
    }

    /// 按任意白名单维度查询可投放活动，带分页
    pub async fn get_campaigns_by_dimensions(
        &self,
        query: &DimensionQuery,
    ) -> Result<Vec<CampaignSummary>> {
        self.get_campaigns_by_dimensions_with_outcome(query)
            .await
            .map(|(campaigns, _)| campaigns)
    }

    /// 同 `get_campaigns_by_dimensions`，额外返回缓存命中情况
    #[instrument(skip(self, query), fields(dimensions = ?query.dimensions, limit = query.page.limit, page = query.page.page))]
    pub async fn get_campaigns_by_dimensions_with_outcome(
        &self,
        query: &DimensionQuery,
    ) -> Result<(Vec<CampaignSummary>, CacheOutcome)> {
        let start = Instant::now();
        let result = self.answer_dimension_query(query).await;
        record_latency("dimensions", &result, start);
        result
    }

    async fn answer_dimension_query(
        &self,
        query: &DimensionQuery,
    ) -> Result<(Vec<CampaignSummary>, CacheOutcome)> {
        query.validate()?;
        self.check_dimensions(query).await?;

        if !query.is_cacheable() {
            let campaigns = self.query_store(&query.dimensions, Some(&query.page)).await?;
            return Ok((campaigns, CacheOutcome::Bypass));
        }

        let (Some(app), Some(country), Some(os)) =
            (query.get("app"), query.get("country"), query.get("os"))
        else {
            return Err(DeliveryError::Internal("可缓存查询缺少维度".to_string()));
        };

        match self.cache.get_campaigns_by_country(country) {
            Ok(campaigns) => {
                metrics::record_cache_hit();
                let eligible = evaluate(&campaigns, app, os);
                Ok((query.page.paginate(eligible), CacheOutcome::Hit))
            }
            Err(e) => {
                metrics::record_cache_miss();
                warn!(error = %e, "缓存未命中，回源查询");
                let campaigns = self.query_store(&query.dimensions, Some(&query.page)).await?;
                Ok((campaigns, CacheOutcome::Miss))
            }
        }
    }

    /// 校验维度名均在白名单中
    async fn check_dimensions(&self, query: &DimensionQuery) -> Result<()> {
        let allowed = self.allowed_dimensions().await?;
        match query.dimensions.keys().find(|name| !allowed.contains(*name)) {
            Some(name) => Err(DeliveryError::UnknownDimension { name: name.clone() }),
            None => Ok(()),
        }
    }

    /// 维度白名单，首次读取成功后缓存
    async fn allowed_dimensions(&self) -> Result<Arc<HashSet<String>>> {
        self.dimensions
            .get_or_try_init(|| async {
                let filter = Filter::eq("_id", self.config.dimension_config_id.as_str());
                let doc = self
                    .with_deadline(self.store.find_one(&self.config.config_collection, &filter))
                    .await?
                    .ok_or(DeliveryError::DimensionConfigMissing)?;

                let config: DimensionConfigDocument =
                    serde_json::from_value(doc).map_err(StoreError::from)?;
                let allowed: HashSet<String> = config.rules.into_iter().collect();
                info!(dimensions = ?allowed, "维度白名单已加载");
                Ok::<_, DeliveryError>(Arc::new(allowed))
            })
            .await
            .cloned()
    }

    /// 回源查询
    async fn query_store(
        &self,
        dimensions: &BTreeMap<String, String>,
        page: Option<&PageRequest>,
    ) -> Result<Vec<CampaignSummary>> {
        let pipeline = self.query_builder.build(dimensions, page);
        debug!(
            collection = %self.config.campaigns_collection,
            pipeline = %serde_json::Value::Array(pipeline.to_documents()),
            "回源查询"
        );

        let docs = self
            .with_deadline(
                self.store
                    .aggregate(&self.config.campaigns_collection, &pipeline),
            )
            .await?;

        docs.into_iter()
            .map(|doc| {
                serde_json::from_value::<CampaignSummary>(doc)
                    .map_err(|e| DeliveryError::Store(StoreError::Decode(e)))
            })
            .collect()
    }

    /// 在查询超时内等待存储调用，超时即放弃（丢弃 future 会取消进行中的调用）
    async fn with_deadline<T, F>(&self, fut: F) -> Result<T>
    where
        F: std::future::Future<Output = std::result::Result<T, StoreError>>,
    {
        match tokio::time::timeout(self.config.query_timeout, fut).await {
            Ok(result) => result.map_err(DeliveryError::from),
            Err(_) => Err(DeliveryError::StoreTimeout {
                timeout_ms: self.config.query_timeout.as_millis() as u64,
            }),
        }
    }
}

/// 按国家索引顺序筛选可投放活动
fn evaluate(campaigns: &[Arc<Campaign>], app: &str, os: &str) -> Vec<CampaignSummary> {
    campaigns
        .iter()
        .filter(|campaign| EligibilityEvaluator::is_eligible(campaign, app, os))
        .map(|campaign| campaign.summary())
        .collect()
}

fn record_latency<T>(variant: &str, result: &Result<(T, CacheOutcome)>, start: Instant) {
    let outcome = match result {
        Ok((_, outcome)) => outcome.as_str(),
        Err(_) => "error",
    };
    metrics::record_delivery_request(variant, outcome, start.elapsed().as_secs_f64());
}
