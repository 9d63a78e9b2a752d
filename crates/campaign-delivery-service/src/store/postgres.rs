//! PostgreSQL 文档存储
//!
//! 文档以 JSONB 存放在单表 `documents(seq, collection, doc)` 中，`seq` 保留插入顺序。
//! 类型化管道被翻译为带绑定参数的 SQL：
//!
//! - 字段路径使用 `doc #> $path`
//! - 数组包含使用 `@>`，数组长度使用 `jsonb_array_length`
//! - `$sort`/`$skip`/`$limit` 对应 `ORDER BY`/`OFFSET`/`LIMIT`
//! - `$project` 对应 `jsonb_build_object`
//!
//! 只支持 `$match* → $sort? → $skip? → $limit? → $project?` 形态的管道。

use async_trait::async_trait;
use delivery_shared::database::Database;
use serde_json::{Value, json};
use sqlx::types::Json;
use sqlx::{Postgres, QueryBuilder};
use tracing::{debug, instrument};

use super::error::StoreError;
use super::query::{Filter, Pipeline, SortOrder, Stage, path_segments};
use super::traits::DocumentStore;

/// PostgreSQL JSONB 文档存储
#[derive(Clone)]
pub struct PgDocumentStore {
    db: Database,
}

impl PgDocumentStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// 追加一个文档
    pub async fn insert(&self, collection: &str, doc: &Value) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO documents (collection, doc) VALUES ($1, $2)")
            .bind(collection)
            .bind(Json(doc))
            .execute(self.db.pool())
            .await?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    #[instrument(skip(self))]
    async fn find_all(&self, collection: &str) -> Result<Vec<Value>, StoreError> {
        let docs = sqlx::query_scalar::<_, Value>(
            r#"
            SELECT doc
            FROM documents
            WHERE collection = $1
            ORDER BY seq ASC
            "#,
        )
        .bind(collection)
        .fetch_all(self.db.pool())
        .await?;

        Ok(docs)
    }

    #[instrument(skip(self, pipeline))]
    async fn aggregate(
        &self,
        collection: &str,
        pipeline: &Pipeline,
    ) -> Result<Vec<Value>, StoreError> {
        let mut query = build_aggregate_query(collection, pipeline)?;
        debug!(sql = %query.sql(), "执行聚合查询");

        let docs = query
            .build_query_scalar::<Value>()
            .fetch_all(self.db.pool())
            .await?;

        Ok(docs)
    }

    #[instrument(skip(self, filter))]
    async fn find_one(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Option<Value>, StoreError> {
        let mut query = build_find_one_query(collection, filter);

        let doc = query
            .build_query_scalar::<Value>()
            .fetch_optional(self.db.pool())
            .await?;

        Ok(doc)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        self.db
            .health_check()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }
}

/// 管道拆解后的 SQL 组成部分
#[derive(Default)]
struct SqlPlan<'p> {
    filters: Vec<&'p Filter>,
    sort: Option<(&'p str, SortOrder)>,
    skip: Option<u64>,
    limit: Option<u64>,
    project: Option<&'p [String]>,
}

fn stage_rank(stage: &Stage) -> u8 {
    match stage {
        Stage::Match(_) => 0,
        Stage::Sort { .. } => 1,
        Stage::Skip(_) => 2,
        Stage::Limit(_) => 3,
        Stage::Project(_) => 4,
    }
}

fn plan(pipeline: &Pipeline) -> Result<SqlPlan<'_>, StoreError> {
    let mut plan = SqlPlan::default();
    let mut last_rank = 0;

    for (index, stage) in pipeline.stages.iter().enumerate() {
        let rank = stage_rank(stage);
        // $match 可以连续出现，其他阶段最多一次且必须按顺序
        let out_of_order = rank < last_rank || (rank == last_rank && rank != 0 && index > 0);
        if out_of_order {
            return Err(StoreError::UnsupportedPipeline(format!(
                "第 {} 个阶段 {} 顺序不受支持",
                index,
                stage.to_document()
            )));
        }
        last_rank = rank;

        match stage {
            Stage::Match(filter) => plan.filters.push(filter),
            Stage::Sort { field, order } => plan.sort = Some((field.as_str(), *order)),
            Stage::Skip(n) => plan.skip = Some(*n),
            Stage::Limit(n) => plan.limit = Some(*n),
            Stage::Project(fields) => plan.project = Some(fields.as_slice()),
        }
    }

    Ok(plan)
}

fn to_i64(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

fn build_aggregate_query(
    collection: &str,
    pipeline: &Pipeline,
) -> Result<QueryBuilder<'static, Postgres>, StoreError> {
    let plan = plan(pipeline)?;

    let mut qb = QueryBuilder::new("SELECT ");
    match plan.project {
        Some(fields) => push_projection(&mut qb, fields),
        None => {
            qb.push("doc");
        }
    }

    qb.push(" FROM documents WHERE collection = ");
    qb.push_bind(collection.to_string());
    for filter in plan.filters {
        qb.push(" AND ");
        push_filter(&mut qb, filter);
    }

    qb.push(" ORDER BY ");
    if let Some((field, order)) = plan.sort {
        qb.push("doc #> ");
        qb.push_bind(path_segments(field));
        qb.push(match order {
            SortOrder::Asc => " ASC NULLS FIRST, ",
            SortOrder::Desc => " DESC NULLS LAST, ",
        });
    }
    qb.push("seq ASC");

    if let Some(skip) = plan.skip {
        qb.push(" OFFSET ");
        qb.push_bind(to_i64(skip));
    }
    if let Some(limit) = plan.limit {
        qb.push(" LIMIT ");
        qb.push_bind(to_i64(limit));
    }

    Ok(qb)
}

fn build_find_one_query(collection: &str, filter: &Filter) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new("SELECT doc FROM documents WHERE collection = ");
    qb.push_bind(collection.to_string());
    qb.push(" AND ");
    push_filter(&mut qb, filter);
    qb.push(" ORDER BY seq ASC LIMIT 1");
    qb
}

fn push_projection(qb: &mut QueryBuilder<'static, Postgres>, fields: &[String]) {
    qb.push("jsonb_strip_nulls(jsonb_build_object(");
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            qb.push(", ");
        }
        qb.push_bind(field.clone());
        qb.push("::text, doc #> ");
        qb.push_bind(path_segments(field));
    }
    qb.push(")) AS doc");
}

fn push_filter(qb: &mut QueryBuilder<'static, Postgres>, filter: &Filter) {
    match filter {
        Filter::And(filters) | Filter::Or(filters) if filters.is_empty() => {
            qb.push(if matches!(filter, Filter::And(_)) {
                "TRUE"
            } else {
                "FALSE"
            });
        }
        Filter::And(filters) | Filter::Or(filters) => {
            let joiner = if matches!(filter, Filter::And(_)) {
                " AND "
            } else {
                " OR "
            };
            qb.push("(");
            for (i, child) in filters.iter().enumerate() {
                if i > 0 {
                    qb.push(joiner);
                }
                push_filter(qb, child);
            }
            qb.push(")");
        }
        Filter::Eq { field, value } => {
            qb.push("COALESCE(doc #> ");
            qb.push_bind(path_segments(field));
            qb.push(" = ");
            qb.push_bind(Json(value.clone()));
            qb.push(", FALSE)");
        }
        Filter::Exists { field, exists } => {
            qb.push("(doc #> ");
            qb.push_bind(path_segments(field));
            qb.push(if *exists { " IS NOT NULL)" } else { " IS NULL)" });
        }
        Filter::Size { field, size } => {
            qb.push("(CASE WHEN jsonb_typeof(doc #> ");
            qb.push_bind(path_segments(field));
            qb.push(") = 'array' THEN jsonb_array_length(doc #> ");
            qb.push_bind(path_segments(field));
            qb.push(") = ");
            qb.push_bind(i32::try_from(*size).unwrap_or(i32::MAX));
            qb.push(" ELSE FALSE END)");
        }
        Filter::ArrayContains { field, value } => {
            push_contains(qb, field, value);
        }
        Filter::ArrayNotContains { field, value } => {
            qb.push("NOT ");
            push_contains(qb, field, value);
        }
    }
}

/// 数组包含该值，或标量字段等于该值；字段缺失时为假
fn push_contains(qb: &mut QueryBuilder<'static, Postgres>, field: &str, value: &Value) {
    qb.push("COALESCE(doc #> ");
    qb.push_bind(path_segments(field));
    qb.push(" @> ");
    qb.push_bind(Json(json!([value])));
    qb.push(" OR doc #> ");
    qb.push_bind(path_segments(field));
    qb.push(" = ");
    qb.push_bind(Json(value.clone()));
    qb.push(", FALSE)");
}
