//! 单维度定向规则

use std::collections::{BTreeMap, BTreeSet};

/// 已知维度取值的闭集合
///
/// 稠密表只在这些取值上定义，来源于配置。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KnownDimensions {
    pub os: BTreeSet<String>,
    pub apps: BTreeSet<String>,
}

impl KnownDimensions {
    pub fn new<O, A>(os: O, apps: A) -> Self
    where
        O: IntoIterator,
        O::Item: Into<String>,
        A: IntoIterator,
        A::Item: Into<String>,
    {
        Self {
            os: os.into_iter().map(Into::into).collect(),
            apps: apps.into_iter().map(Into::into).collect(),
        }
    }
}

/// 单个维度的资格规则
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DimensionRule {
    /// 任意取值都满足
    #[default]
    Open,
    /// 白名单：只有列出的取值满足，未列出的取值（无论是否已知）都不满足
    ClosedAllow(BTreeSet<String>),
    /// 黑名单：列出的取值不满足，其余都满足
    SparseDeny(BTreeSet<String>),
}

impl DimensionRule {
    /// 判断某个取值是否满足该规则
    pub fn allows(&self, value: &str) -> bool {
        match self {
            Self::Open => true,
            Self::ClosedAllow(listed) => listed.contains(value),
            Self::SparseDeny(listed) => !listed.contains(value),
        }
    }

    /// 展开为覆盖全部已知取值的稠密表
    pub fn dense_table(&self, known: &BTreeSet<String>) -> BTreeMap<String, bool> {
        known
            .iter()
            .map(|value| (value.clone(), self.allows(value)))
            .collect()
    }

    /// 列出的取值
    pub fn listed(&self) -> Option<&BTreeSet<String>> {
        match self {
            Self::Open => None,
            Self::ClosedAllow(listed) | Self::SparseDeny(listed) => Some(listed),
        }
    }
}

/// 一个活动在各定向维度上的规则
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RuleSet {
    pub os: DimensionRule,
    pub app: DimensionRule,
}

impl RuleSet {
    /// 全部维度开放
    pub fn open() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        self.os == DimensionRule::Open && self.app == DimensionRule::Open
    }

    pub fn allows(&self, app: &str, os: &str) -> bool {
        self.os.allows(os) && self.app.allows(app)
    }
}
