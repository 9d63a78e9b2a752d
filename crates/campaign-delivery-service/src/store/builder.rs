//! 回源查询构建器
//!
//! 生成与缓存判定语义一致的存储侧查询。对每个维度 `dim` 和请求值 `v`：
//!
//! ```text
//! (includeDim 缺失或为空 OR includeDim 包含 v) AND (excludeDim 缺失或为空 OR excludeDim 不包含 v)
//! ```
//!
//! 所有维度按名称顺序合取，并要求 `isActive = true`。

use std::collections::BTreeMap;

use super::query::{Filter, Pipeline, SortOrder};
use crate::models::PageRequest;

/// 活动文档中定向列表所在的子文档
const RULES_FIELD: &str = "rules";

/// 回源查询投影的字段
pub const PROJECTED_FIELDS: [&str; 3] = ["_id", "image", "cta"];

/// 活动查询构建器
#[derive(Debug, Clone, Default)]
pub struct CampaignQueryBuilder;

impl CampaignQueryBuilder {
    pub fn new() -> Self {
        Self
    }

    /// `rules.include<Dim>`
    pub fn include_field(dimension: &str) -> String {
        format!("{}.include{}", RULES_FIELD, capitalize(dimension))
    }

    /// `rules.exclude<Dim>`
    pub fn exclude_field(dimension: &str) -> String {
        format!("{}.exclude{}", RULES_FIELD, capitalize(dimension))
    }

    /// 单个维度的定向谓词
    pub fn dimension_predicate(dimension: &str, value: &str) -> Filter {
        let include = Self::include_field(dimension);
        let exclude = Self::exclude_field(dimension);

        Filter::And(vec![
            Filter::Or(vec![
                Filter::exists(include.clone(), false),
                Filter::size(include.clone(), 0),
                Filter::contains(include, value),
            ]),
            Filter::Or(vec![
                Filter::exists(exclude.clone(), false),
                Filter::size(exclude.clone(), 0),
                Filter::not_contains(exclude, value),
            ]),
        ])
    }

    /// 活动状态与全部维度谓词的合取
    pub fn eligibility_filter(&self, dimensions: &BTreeMap<String, String>) -> Filter {
        let mut clauses = Vec::with_capacity(dimensions.len() + 1);
        clauses.push(Filter::eq("isActive", true));
        clauses.extend(
            dimensions
                .iter()
                .map(|(name, value)| Self::dimension_predicate(name, value)),
        );
        Filter::And(clauses)
    }

    /// 构建回源聚合管道
    ///
    /// `$match` → `$sort {_id: 1}` → `$skip` → `$limit` → `$project`，不分页时省略 skip/limit
    pub fn build(&self, dimensions: &BTreeMap<String, String>, page: Option<&PageRequest>) -> Pipeline {
        let mut pipeline = Pipeline::new()
            .match_filter(self.eligibility_filter(dimensions))
            .sort("_id", SortOrder::Asc);

        if let Some(page) = page {
            pipeline = pipeline.skip(page.skip()).limit(page.limit);
        }

        pipeline.project(PROJECTED_FIELDS)
    }
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
