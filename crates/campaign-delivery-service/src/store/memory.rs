//! 内存文档存储
//!
//! 按集合保存 JSON 文档，直接在内存中执行类型化管道。用于本地运行和测试，
//! 可以从 `{collection: [document, ...]}` 格式的 JSON 文件预置数据。

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use tracing::info;

use super::error::StoreError;
use super::query::{Filter, Pipeline};
use super::traits::DocumentStore;

#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    collections: RwLock<HashMap<String, Vec<Value>>>,
    unavailable: AtomicBool,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从预置文档构造，顶层必须是以集合名为键、文档数组为值的对象
    pub fn from_seed(seed: Value) -> Result<Self, StoreError> {
        let Value::Object(collections) = seed else {
            return Err(StoreError::Seed {
                path: "<inline>".to_string(),
                message: "顶层必须是对象".to_string(),
            });
        };

        let store = Self::new();
        for (name, docs) in collections {
            let Value::Array(docs) = docs else {
                return Err(StoreError::Seed {
                    path: "<inline>".to_string(),
                    message: format!("集合 {} 必须是数组", name),
                });
            };
            store.replace_collection(&name, docs);
        }
        Ok(store)
    }

    /// 从 JSON 文件加载预置数据
    pub async fn from_json_file(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let display = path.display().to_string();

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| StoreError::Seed {
                path: display.clone(),
                message: e.to_string(),
            })?;
        let seed: Value = serde_json::from_str(&content)?;

        let store = Self::from_seed(seed).map_err(|e| match e {
            StoreError::Seed { message, .. } => StoreError::Seed {
                path: display.clone(),
                message,
            },
            other => other,
        })?;

        info!(
            path = %path.display(),
            collections = store.collections.read().len(),
            "内存存储已加载预置数据"
        );
        Ok(store)
    }

    /// 追加一个文档
    pub fn insert(&self, collection: &str, doc: Value) {
        self.collections
            .write()
            .entry(collection.to_string())
            .or_default()
            .push(doc);
    }

    /// 整体替换一个集合
    pub fn replace_collection(&self, collection: &str, docs: Vec<Value>) {
        self.collections
            .write()
            .insert(collection.to_string(), docs);
    }

    /// 切换可用状态，不可用时所有读取返回错误
    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    fn snapshot(&self, collection: &str) -> Result<Vec<Value>, StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("内存存储已被标记为不可用".to_string()));
        }
        Ok(self
            .collections
            .read()
            .get(collection)
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn find_all(&self, collection: &str) -> Result<Vec<Value>, StoreError> {
        self.snapshot(collection)
    }

    async fn aggregate(
        &self,
        collection: &str,
        pipeline: &Pipeline,
    ) -> Result<Vec<Value>, StoreError> {
        Ok(pipeline.apply(self.snapshot(collection)?))
    }

    async fn find_one(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Option<Value>, StoreError> {
        Ok(self
            .snapshot(collection)?
            .into_iter()
            .find(|doc| filter.matches(doc)))
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("内存存储已被标记为不可用".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::query::SortOrder;
    use serde_json::json;

    #[tokio::test]
    async fn test_find_all_keeps_insertion_order() {
        let store = MemoryDocumentStore::new();
        store.insert("us", json!({ "_id": "b" }));
        store.insert("us", json!({ "_id": "a" }));

        let docs = store.find_all("us").await.unwrap();
        assert_eq!(docs, vec![json!({ "_id": "b" }), json!({ "_id": "a" })]);
        assert!(store.find_all("unknown").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_aggregate_and_find_one() {
        let store = MemoryDocumentStore::from_seed(json!({
            "campaigns_details": [
                { "_id": "b", "isActive": true },
                { "_id": "a", "isActive": true },
                { "_id": "c", "isActive": false }
            ],
            "config": [{ "_id": "delivery_dimensions", "rules": ["app", "os"] }]
        }))
        .unwrap();

        let pipeline = Pipeline::new()
            .match_filter(Filter::eq("isActive", true))
            .sort("_id", SortOrder::Asc)
            .project(["_id"]);
        let docs = store.aggregate("campaigns_details", &pipeline).await.unwrap();
        assert_eq!(docs, vec![json!({ "_id": "a" }), json!({ "_id": "b" })]);

        let config = store
            .find_one("config", &Filter::eq("_id", "delivery_dimensions"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(config["rules"], json!(["app", "os"]));

        let missing = store
            .find_one("config", &Filter::eq("_id", "nope"))
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn test_invalid_seed_is_rejected() {
        assert!(MemoryDocumentStore::from_seed(json!([1, 2])).is_err());
        assert!(MemoryDocumentStore::from_seed(json!({ "us": { "_id": "x" } })).is_err());
    }

    #[tokio::test]
    async fn test_unavailable_store_fails_reads() {
        let store = MemoryDocumentStore::new();
        assert!(store.health_check().await.is_ok());
        store.set_available(false);
        assert!(store.health_check().await.is_err());
        let err = store.find_all("us").await.unwrap_err();
        assert_eq!(err.error_code(), "STORE_UNAVAILABLE");

        store.set_available(true);
        assert!(store.find_all("us").await.is_ok());
    }

    #[tokio::test]
    async fn test_missing_seed_file() {
        let err = MemoryDocumentStore::from_json_file("/nonexistent/seed.json")
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "SEED_ERROR");
        assert!(err.to_string().contains("/nonexistent/seed.json"));
    }
}
