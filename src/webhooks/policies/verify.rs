//! Evaluation of a single rule against an object.

use serde_json::Value;
use thiserror::Error;

use super::field_path::{
    FieldError, nested_bool, nested_float64, nested_int64, nested_string, split_path,
};
use crate::config::{Comparison, Operator, Rule, RuleValue, ScalarKind, ValueType};

/// Why a rule could not be evaluated.
#[derive(Debug, Error)]
pub enum EvalError {
    #[error("field not found at {field} into {object}")]
    FieldNotFound { field: String, object: Box<Value> },

    #[error(transparent)]
    FieldType(#[from] FieldError),

    #[error("value (of type {found}) in rule is not of type {value_type} with operator {op}")]
    ValueTypeMismatch {
        value_type: ValueType,
        op: Operator,
        found: &'static str,
    },

    #[error("operator {op} is not supported for type {value_type}")]
    UnsupportedOperator { value_type: ValueType, op: Operator },
}

impl EvalError {
    /// Short machine-readable name of the failure.
    pub fn kind(&self) -> &'static str {
        match self {
            EvalError::FieldNotFound { .. } => "FieldNotFound",
            EvalError::FieldType(_) => "FieldTypeMismatch",
            EvalError::ValueTypeMismatch { .. } => "ValueTypeMismatch",
            EvalError::UnsupportedOperator { .. } => "UnsupportedOperator",
        }
    }
}

impl Comparison {
    /// Apply an ordering or equality comparison; `None` for set membership.
    fn apply<T: PartialOrd + ?Sized>(self, actual: &T, expected: &T) -> Option<bool> {
        match self {
            Comparison::Equal => Some(actual == expected),
            Comparison::NotEqual => Some(actual != expected),
            Comparison::Greater => Some(actual > expected),
            Comparison::Less => Some(actual < expected),
            Comparison::GreaterOrEqual => Some(actual >= expected),
            Comparison::LessOrEqual => Some(actual <= expected),
            Comparison::Member | Comparison::NotMember => None,
        }
    }
}

/// Evaluate `rule` against `object`.
///
/// `Ok(true)` means the rule is satisfied. A missing field, a field of the
/// wrong type and an inconsistent rule are all errors so that the caller
/// denies.
pub fn verify(object: &Value, rule: &Rule) -> Result<bool, EvalError> {
    let unsupported = || EvalError::UnsupportedOperator {
        value_type: rule.value_type,
        op: rule.op,
    };
    if !rule.op.supports(rule.value_type) {
        return Err(unsupported());
    }
    if !rule.value.matches(rule.value_type, rule.op) {
        return Err(EvalError::ValueTypeMismatch {
            value_type: rule.value_type,
            op: rule.op,
            found: rule.value.shape(),
        });
    }

    let path = split_path(&rule.field);
    let comparison = rule.op.comparison();

    match (rule.value_type.scalar_kind(), &rule.value) {
        (ScalarKind::String, RuleValue::StringSet(expected)) => {
            let actual = found(nested_string(object, &path)?, object, rule)?;
            let member = expected.iter().any(|candidate| candidate == actual);
            match comparison {
                Comparison::Member => Ok(member),
                Comparison::NotMember => Ok(!member),
                _ => Err(unsupported()),
            }
        }
        (ScalarKind::String, RuleValue::String(expected)) => {
            let actual = found(nested_string(object, &path)?, object, rule)?;
            comparison
                .apply(actual, expected.as_str())
                .ok_or_else(unsupported)
        }
        (ScalarKind::Bool, RuleValue::Bool(expected)) => {
            let actual = found(nested_bool(object, &path)?, object, rule)?;
            comparison.apply(&actual, expected).ok_or_else(unsupported)
        }
        (ScalarKind::Integer, RuleValue::Int(expected)) => {
            let actual = found(nested_int64(object, &path)?, object, rule)?;
            comparison.apply(&actual, expected).ok_or_else(unsupported)
        }
        (ScalarKind::Float, RuleValue::Float(expected)) => {
            let actual = found(nested_float64(object, &path)?, object, rule)?;
            comparison.apply(&actual, expected).ok_or_else(unsupported)
        }
        (_, value) => Err(EvalError::ValueTypeMismatch {
            value_type: rule.value_type,
            op: rule.op,
            found: value.shape(),
        }),
    }
}

fn found<T>(value: Option<T>, object: &Value, rule: &Rule) -> Result<T, EvalError> {
    value.ok_or_else(|| EvalError::FieldNotFound {
        field: rule.field.clone(),
        object: Box::new(object.clone()),
    })
}
