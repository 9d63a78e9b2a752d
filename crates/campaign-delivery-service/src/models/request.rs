//! 投放请求模型

use std::collections::BTreeMap;

use serde::Deserialize;
use validator::Validate;

/// 分页参数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Validate)]
pub struct PageRequest {
    #[validate(range(min = 1, message = "limit 必须大于等于 1"))]
    pub limit: u64,
    pub page: u64,
}

impl PageRequest {
    pub fn new(limit: u64, page: u64) -> Self {
        Self { limit, page }
    }

    /// 跳过的条数 limit × page
    pub fn skip(&self) -> u64 {
        self.limit.saturating_mul(self.page)
    }

    /// 对有序列表分页
    pub fn paginate<T>(&self, items: Vec<T>) -> Vec<T> {
        let skip = usize::try_from(self.skip()).unwrap_or(usize::MAX);
        let limit = usize::try_from(self.limit).unwrap_or(usize::MAX);
        items.into_iter().skip(skip).take(limit).collect()
    }
}

/// 多维度投放查询
///
/// 维度按名称有序存放，保证生成的查询确定。
#[derive(Debug, Clone, PartialEq, Eq, Validate)]
pub struct DimensionQuery {
    pub dimensions: BTreeMap<String, String>,
    #[validate(nested)]
    pub page: PageRequest,
}

impl DimensionQuery {
    pub fn new(dimensions: BTreeMap<String, String>, page: PageRequest) -> Self {
        Self { dimensions, page }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.dimensions.get(name).map(String::as_str)
    }

    /// 维度集合是否恰好为 {app, country, os}，只有这种查询可以由缓存回答
    pub fn is_cacheable(&self) -> bool {
        self.dimensions.len() == 3
            && ["app", "country", "os"]
                .iter()
                .all(|name| self.dimensions.contains_key(*name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dims(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_skip_and_paginate() {
        let page = PageRequest::new(2, 1);
        assert_eq!(page.skip(), 2);
        assert_eq!(page.paginate(vec![1, 2, 3, 4, 5]), vec![3, 4]);
        assert_eq!(PageRequest::new(2, 5).paginate(vec![1, 2, 3]), Vec::<i32>::new());
    }

    #[test]
    fn test_skip_saturates() {
        let page = PageRequest::new(u64::MAX, 2);
        assert_eq!(page.skip(), u64::MAX);
        assert!(page.paginate(vec![1]).is_empty());
    }

    #[test]
    fn test_limit_must_be_positive() {
        assert!(PageRequest::new(0, 0).validate().is_err());
        assert!(PageRequest::new(1, 0).validate().is_ok());

        let query = DimensionQuery::new(dims(&[("app", "a")]), PageRequest::new(0, 0));
        assert!(query.validate().is_err());
    }

    #[test]
    fn test_is_cacheable() {
        let page = PageRequest::new(10, 0);
        let full = DimensionQuery::new(
            dims(&[("app", "a"), ("country", "us"), ("os", "ios")]),
            page,
        );
        assert!(full.is_cacheable());

        let extra = DimensionQuery::new(
            dims(&[("app", "a"), ("country", "us"), ("os", "ios"), ("state", "ca")]),
            page,
        );
        assert!(!extra.is_cacheable());

        let partial = DimensionQuery::new(dims(&[("app", "a"), ("country", "us")]), page);
        assert!(!partial.is_cacheable());
    }
}
