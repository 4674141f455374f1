//! Errors raised while parsing and validating a rule configuration document.

use thiserror::Error;

use super::rule::RuleError;

/// A configuration document that cannot be accepted.
///
/// Any of these rejects the whole reload; the previously published
/// configuration stays authoritative.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("error parsing yaml: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("forKindsRules[{index}]: kind must not be empty")]
    MissingKind { index: usize },

    #[error("forKindsRules[{index}] ({kind}) rules[{rule}]: unknown rule type {value_type:?}")]
    UnknownRuleType {
        index: usize,
        kind: String,
        rule: usize,
        value_type: String,
    },

    #[error("forKindsRules[{index}] ({kind}) rules[{rule}]: unknown operator {op:?}")]
    UnknownOperator {
        index: usize,
        kind: String,
        rule: usize,
        op: String,
    },

    #[error("forKindsRules[{index}] ({kind}) rules[{rule}]: {source}")]
    InvalidRule {
        index: usize,
        kind: String,
        rule: usize,
        #[source]
        source: RuleError,
    },
}
