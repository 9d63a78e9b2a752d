//! 类型化的查询过滤器与聚合管道
//!
//! 过滤器和管道以值的形式构建，可以渲染成 Mongo 风格的 JSON 文档用于日志，
//! 也可以由各存储后端直接翻译执行。字段路径使用点号分隔（如 `rules.includeOs`）。

use std::cmp::Ordering;

use serde_json::{Map, Value, json};

/// 查询过滤器
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// 全部子条件满足，空列表恒为真
    And(Vec<Filter>),
    /// 任一子条件满足，空列表恒为假
    Or(Vec<Filter>),
    /// 字段等于给定值
    Eq { field: String, value: Value },
    /// 字段存在或不存在
    Exists { field: String, exists: bool },
    /// 字段是长度为 size 的数组
    Size { field: String, size: usize },
    /// 数组字段包含该值（标量字段时按相等判断）
    ArrayContains { field: String, value: Value },
    /// 字段缺失，或数组字段不包含该值
    ArrayNotContains { field: String, value: Value },
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Eq {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn exists(field: impl Into<String>, exists: bool) -> Self {
        Self::Exists {
            field: field.into(),
            exists,
        }
    }

    pub fn size(field: impl Into<String>, size: usize) -> Self {
        Self::Size {
            field: field.into(),
            size,
        }
    }

    pub fn contains(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::ArrayContains {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn not_contains(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::ArrayNotContains {
            field: field.into(),
            value: value.into(),
        }
    }

    /// 渲染为 Mongo 风格的过滤文档
    pub fn to_document(&self) -> Value {
        match self {
            Self::And(filters) => {
                json!({ "$and": filters.iter().map(Filter::to_document).collect::<Vec<_>>() })
            }
            Self::Or(filters) => {
                json!({ "$or": filters.iter().map(Filter::to_document).collect::<Vec<_>>() })
            }
            Self::Eq { field, value } => single(field, value.clone()),
            Self::Exists { field, exists } => single(field, json!({ "$exists": exists })),
            Self::Size { field, size } => single(field, json!({ "$size": size })),
            Self::ArrayContains { field, value } => single(field, value.clone()),
            Self::ArrayNotContains { field, value } => single(field, json!({ "$ne": value })),
        }
    }

    /// 在内存中判断文档是否满足过滤器
    pub fn matches(&self, doc: &Value) -> bool {
        match self {
            Self::And(filters) => filters.iter().all(|f| f.matches(doc)),
            Self::Or(filters) => filters.iter().any(|f| f.matches(doc)),
            Self::Eq { field, value } => lookup(doc, field) == Some(value),
            Self::Exists { field, exists } => lookup(doc, field).is_some() == *exists,
            Self::Size { field, size } => {
                matches!(lookup(doc, field), Some(Value::Array(items)) if items.len() == *size)
            }
            Self::ArrayContains { field, value } => contains(lookup(doc, field), value),
            Self::ArrayNotContains { field, value } => !contains(lookup(doc, field), value),
        }
    }
}

fn single(field: &str, value: Value) -> Value {
    let mut map = Map::new();
    map.insert(field.to_string(), value);
    Value::Object(map)
}

fn contains(field_value: Option<&Value>, value: &Value) -> bool {
    match field_value {
        Some(Value::Array(items)) => items.contains(value),
        Some(other) => other == value,
        None => false,
    }
}

/// 按点号路径读取字段
pub fn lookup<'a>(doc: &'a Value, field: &str) -> Option<&'a Value> {
    field
        .split('.')
        .try_fold(doc, |current, segment| current.get(segment))
}

/// 拆分字段路径
pub fn path_segments(field: &str) -> Vec<String> {
    field.split('.').map(String::from).collect()
}

/// 排序方向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    fn as_i32(self) -> i32 {
        match self {
            Self::Asc => 1,
            Self::Desc => -1,
        }
    }
}

/// 管道阶段
#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    Match(Filter),
    Sort { field: String, order: SortOrder },
    Skip(u64),
    Limit(u64),
    Project(Vec<String>),
}

impl Stage {
    pub fn to_document(&self) -> Value {
        match self {
            Self::Match(filter) => json!({ "$match": filter.to_document() }),
            Self::Sort { field, order } => json!({ "$sort": single(field, json!(order.as_i32())) }),
            Self::Skip(n) => json!({ "$skip": n }),
            Self::Limit(n) => json!({ "$limit": n }),
            Self::Project(fields) => {
                let projection: Map<String, Value> =
                    fields.iter().map(|f| (f.clone(), json!(1))).collect();
                json!({ "$project": projection })
            }
        }
    }
}

/// 聚合管道
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Pipeline {
    pub stages: Vec<Stage>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn match_filter(mut self, filter: Filter) -> Self {
        self.stages.push(Stage::Match(filter));
        self
    }

    pub fn sort(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.stages.push(Stage::Sort {
            field: field.into(),
            order,
        });
        self
    }

    pub fn skip(mut self, n: u64) -> Self {
        self.stages.push(Stage::Skip(n));
        self
    }

    pub fn limit(mut self, n: u64) -> Self {
        self.stages.push(Stage::Limit(n));
        self
    }

    pub fn project<I, F>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Into<String>,
    {
        self.stages
            .push(Stage::Project(fields.into_iter().map(Into::into).collect()));
        self
    }

    /// 渲染为 Mongo 风格的管道文档
    pub fn to_documents(&self) -> Vec<Value> {
        self.stages.iter().map(Stage::to_document).collect()
    }

    /// 在内存中依次执行各阶段
    pub fn apply(&self, docs: Vec<Value>) -> Vec<Value> {
        self.stages.iter().fold(docs, |docs, stage| match stage {
            Stage::Match(filter) => docs.into_iter().filter(|d| filter.matches(d)).collect(),
            Stage::Sort { field, order } => {
                let mut docs = docs;
                // 稳定排序，相等时保持插入顺序
                docs.sort_by(|a, b| {
                    let ordering = compare_values(lookup(a, field), lookup(b, field));
                    match order {
                        SortOrder::Asc => ordering,
                        SortOrder::Desc => ordering.reverse(),
                    }
                });
                docs
            }
            Stage::Skip(n) => docs.into_iter().skip(to_usize(*n)).collect(),
            Stage::Limit(n) => docs.into_iter().take(to_usize(*n)).collect(),
            Stage::Project(fields) => docs.iter().map(|d| project(d, fields)).collect(),
        })
    }
}

fn to_usize(n: u64) -> usize {
    usize::try_from(n).unwrap_or(usize::MAX)
}

fn project(doc: &Value, fields: &[String]) -> Value {
    let mut out = Map::new();
    for field in fields {
        if let Some(value) = lookup(doc, field) {
            out.insert(field.clone(), value.clone());
        }
    }
    Value::Object(out)
}

/// 缺失 < null < bool < 数字 < 字符串 < 其他
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(v: Option<&Value>) -> u8 {
        match v {
            None => 0,
            Some(Value::Null) => 1,
            Some(Value::Bool(_)) => 2,
            Some(Value::Number(_)) => 3,
            Some(Value::String(_)) => 4,
            Some(_) => 5,
        }
    }

    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}
