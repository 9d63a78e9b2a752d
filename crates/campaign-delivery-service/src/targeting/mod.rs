//! 定向规则模块
//!
//! - `rule`: 维度规则与规则集
//! - `compiler`: 从原始列表编译规则
//! - `evaluator`: 请求路径上的资格判定

mod compiler;
mod evaluator;
mod rule;

pub use compiler::RuleCompiler;
pub use evaluator::EligibilityEvaluator;
pub use rule::{DimensionRule, KnownDimensions, RuleSet};
