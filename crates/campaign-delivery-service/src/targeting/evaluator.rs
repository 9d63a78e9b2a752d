//! 资格判定
//!
//! 国家维度已经在选择国家索引时生效，这里只检查 app 与 os。

use crate::models::Campaign;

/// 资格评估器
pub struct EligibilityEvaluator;

impl EligibilityEvaluator {
    /// 判断活动对某次请求是否可投放
    #[inline]
    pub fn is_eligible(campaign: &Campaign, app: &str, os: &str) -> bool {
        if !campaign.is_active {
            return false;
        }
        if campaign.no_restrictions {
            return true;
        }
        campaign.rules.allows(app, os)
    }
}
