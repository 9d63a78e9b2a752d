//! 活动领域模型
//!
//! 区分存储侧文档结构（`CampaignDocument`）与编译后的内存结构（`Campaign`），
//! 后者的定向规则已展开为 `RuleSet`，请求路径上不再解析原始列表。

use serde::{Deserialize, Deserializer, Serialize};

use crate::targeting::RuleSet;

/// 活动详情集合中的原始文档
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CampaignDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub image: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub cta: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_active: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub no_restrictions: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub rules: RawTargeting,
}

/// 存储侧的稀疏定向列表，任意列表都可能缺失
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RawTargeting {
    #[serde(default, deserialize_with = "null_as_default")]
    pub include_os: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub exclude_os: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub include_app: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub exclude_app: Vec<String>,
}

impl RawTargeting {
    /// 四个列表是否全部为空
    pub fn is_empty(&self) -> bool {
        self.include_os.is_empty()
            && self.exclude_os.is_empty()
            && self.include_app.is_empty()
            && self.exclude_app.is_empty()
    }
}

/// 缺失和显式 `null` 都按默认值处理
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// 国家集合中的文档，只携带活动 ID
#[derive(Debug, Clone, Deserialize)]
pub struct CampaignIdDocument {
    #[serde(rename = "_id")]
    pub id: String,
}

/// 编译后的活动
#[derive(Debug, Clone, PartialEq)]
pub struct Campaign {
    pub id: String,
    pub image: String,
    pub cta: String,
    pub is_active: bool,
    pub no_restrictions: bool,
    pub rules: RuleSet,
}

impl Campaign {
    /// 投影为对外返回的摘要
    pub fn summary(&self) -> CampaignSummary {
        CampaignSummary {
            id: self.id.clone(),
            image: self.image.clone(),
            cta: self.cta.clone(),
        }
    }
}

/// 对外返回的活动摘要
///
/// 序列化字段为 `cid`/`img`/`cta`，与 SDK 约定一致；
/// 反序列化同时接受回源查询投影出的 `_id`/`image`。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CampaignSummary {
    #[serde(rename = "cid", alias = "_id", alias = "id")]
    pub id: String,
    #[serde(
        rename = "img",
        alias = "image",
        default,
        deserialize_with = "null_as_default"
    )]
    pub image: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub cta: String,
}
