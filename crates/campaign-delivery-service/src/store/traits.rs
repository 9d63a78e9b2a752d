//! 文档存储接口
//!
//! 缓存加载与回源查询只依赖这个窄接口，便于替换后端和 mock 测试

use async_trait::async_trait;
use serde_json::Value;

use super::error::StoreError;
use super::query::{Filter, Pipeline};

/// 文档存储
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// 按插入顺序返回集合中的全部文档
    async fn find_all(&self, collection: &str) -> Result<Vec<Value>, StoreError>;

    /// 执行聚合管道
    async fn aggregate(
        &self,
        collection: &str,
        pipeline: &Pipeline,
    ) -> Result<Vec<Value>, StoreError>;

    /// 返回第一个满足过滤器的文档
    async fn find_one(&self, collection: &str, filter: &Filter)
    -> Result<Option<Value>, StoreError>;

    /// 存储连通性检查
    async fn health_check(&self) -> Result<(), StoreError>;
}
