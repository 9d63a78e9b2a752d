//! 定向规则编译器
//!
//! 将活动文档中的稀疏 include/exclude 列表编译为按维度的资格规则。
//!
//! 每个维度的优先级：
//! - 活动标记 noRestrictions，或四个列表全部为空：所有维度开放
//! - include 非空：白名单，未列出的取值不满足
//! - 仅 exclude 非空：黑名单，列出的取值不满足
//! - 两者都为空：该维度开放

use std::collections::BTreeSet;

use tracing::debug;

use super::rule::{DimensionRule, KnownDimensions, RuleSet};
use crate::models::{Campaign, CampaignDocument, RawTargeting};

/// 规则编译器
#[derive(Debug, Clone)]
pub struct RuleCompiler {
    known: KnownDimensions,
}

impl RuleCompiler {
    pub fn new(known: KnownDimensions) -> Self {
        Self { known }
    }

    pub fn known(&self) -> &KnownDimensions {
        &self.known
    }

    /// 编译一个活动文档
    pub fn compile(&self, doc: CampaignDocument) -> Campaign {
        let rules = self.compile_rules(&doc.id, &doc.rules, doc.no_restrictions);
        Campaign {
            id: doc.id,
            image: doc.image,
            cta: doc.cta,
            is_active: doc.is_active,
            no_restrictions: doc.no_restrictions,
            rules,
        }
    }

    /// 编译定向列表
    pub fn compile_rules(
        &self,
        campaign_id: &str,
        raw: &RawTargeting,
        no_restrictions: bool,
    ) -> RuleSet {
        if no_restrictions || raw.is_empty() {
            return RuleSet::open();
        }

        let os = compile_dimension(&raw.include_os, &raw.exclude_os);
        let app = compile_dimension(&raw.include_app, &raw.exclude_app);

        self.report_unknown(campaign_id, "os", &os, &self.known.os);
        self.report_unknown(campaign_id, "app", &app, &self.known.apps);

        RuleSet { os, app }
    }

    fn report_unknown(
        &self,
        campaign_id: &str,
        dimension: &str,
        rule: &DimensionRule,
        known: &BTreeSet<String>,
    ) {
        let Some(listed) = rule.listed() else {
            return;
        };
        let unknown: Vec<&String> = listed.difference(known).collect();
        if !unknown.is_empty() {
            debug!(
                campaign_id = %campaign_id,
                dimension = %dimension,
                values = ?unknown,
                "定向列表包含未知取值"
            );
        }
    }
}

fn compile_dimension(include: &[String], exclude: &[String]) -> DimensionRule {
    if !include.is_empty() {
        DimensionRule::ClosedAllow(include.iter().cloned().collect())
    } else if !exclude.is_empty() {
        DimensionRule::SparseDeny(exclude.iter().cloned().collect())
    } else {
        DimensionRule::Open
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compiler() -> RuleCompiler {
        RuleCompiler::new(KnownDimensions::new(
            ["android", "ios"],
            [
                "com.abc.xyz",
                "com.gametion.ludokinggame",
                "com.apple.in",
                "com.google.in",
                "com.samsung.in",
            ],
        ))
    }

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    /// 直接按原始列表判断，作为编译结果的对照
    fn brute_force(include: &[String], exclude: &[String], value: &str) -> bool {
        if !include.is_empty() {
            include.iter().any(|v| v == value)
        } else {
            !exclude.iter().any(|v| v == value)
        }
    }

    #[test]
    fn test_no_restrictions_opens_every_dimension() {
        let raw = RawTargeting {
            include_os: strings(&["android"]),
            ..Default::default()
        };
        let rules = compiler().compile_rules("c1", &raw, true);
        assert!(rules.is_open());
    }

    #[test]
    fn test_empty_lists_open_every_dimension() {
        let rules = compiler().compile_rules("c1", &RawTargeting::default(), false);
        assert_eq!(rules, RuleSet::open());
    }

    #[test]
    fn test_include_os_is_closed_world() {
        let compiler = compiler();
        let raw = RawTargeting {
            include_os: strings(&["android"]),
            ..Default::default()
        };
        let rules = compiler.compile_rules("c1", &raw, false);

        let table = rules.os.dense_table(&compiler.known().os);
        assert_eq!(table["android"], true);
        assert_eq!(table["ios"], false);
        assert_eq!(rules.app, DimensionRule::Open);
    }

    #[test]
    fn test_exclude_os_is_open_world() {
        let compiler = compiler();
        let raw = RawTargeting {
            exclude_os: strings(&["ios"]),
            ..Default::default()
        };
        let rules = compiler.compile_rules("c1", &raw, false);

        let table = rules.os.dense_table(&compiler.known().os);
        assert_eq!(table["android"], true);
        assert_eq!(table["ios"], false);
    }

    #[test]
    fn test_include_takes_precedence_over_exclude() {
        let raw = RawTargeting {
            include_app: strings(&["com.abc.xyz"]),
            exclude_app: strings(&["com.abc.xyz", "com.apple.in"]),
            ..Default::default()
        };
        let rules = compiler().compile_rules("c1", &raw, false);
        assert!(matches!(rules.app, DimensionRule::ClosedAllow(_)));
        assert!(rules.app.allows("com.abc.xyz"));
        assert!(!rules.app.allows("com.google.in"));
    }

    #[test]
    fn test_unknown_listed_values_only_count_as_listed() {
        let compiler = compiler();
        let raw = RawTargeting {
            include_os: strings(&["android", "tizen"]),
            ..Default::default()
        };
        let rules = compiler.compile_rules("c1", &raw, false);

        let table = rules.os.dense_table(&compiler.known().os);
        assert_eq!(table.len(), 2);
        assert!(!table.contains_key("tizen"));
        assert!(rules.os.allows("tizen"));
    }

    #[test]
    fn test_compiled_rules_agree_with_raw_lists() {
        let compiler = compiler();
        let cases = [
            RawTargeting {
                include_os: strings(&["ios"]),
                exclude_app: strings(&["com.samsung.in", "com.google.in"]),
                ..Default::default()
            },
            RawTargeting {
                exclude_os: strings(&["android"]),
                include_app: strings(&["com.gametion.ludokinggame"]),
                ..Default::default()
            },
            RawTargeting {
                include_os: strings(&["android", "ios"]),
                exclude_os: strings(&["ios"]),
                include_app: strings(&["com.apple.in"]),
                exclude_app: strings(&["com.apple.in"]),
            },
        ];

        for raw in cases {
            let rules = compiler.compile_rules("c1", &raw, false);
            for os in &compiler.known().os {
                assert_eq!(
                    rules.os.allows(os),
                    brute_force(&raw.include_os, &raw.exclude_os, os),
                    "os={os} raw={raw:?}"
                );
            }
            for app in &compiler.known().apps {
                assert_eq!(
                    rules.app.allows(app),
                    brute_force(&raw.include_app, &raw.exclude_app, app),
                    "app={app} raw={raw:?}"
                );
            }
        }
    }

    #[test]
    fn test_compile_document() {
        let doc = CampaignDocument {
            id: "spotify".to_string(),
            name: "Spotify".to_string(),
            image: "img".to_string(),
            cta: "Download".to_string(),
            is_active: true,
            no_restrictions: false,
            rules: RawTargeting {
                exclude_os: strings(&["ios"]),
                ..Default::default()
            },
        };
        let campaign = compiler().compile(doc);
        assert_eq!(campaign.id, "spotify");
        assert!(campaign.is_active);
        assert!(!campaign.rules.os.allows("ios"));
    }
}
