//! Rule model: a dotted field path, a declared scalar type, a comparison
//! operator and the expected value.
//!
//! Values are a closed tagged union checked against the declared type and
//! operator when the configuration is loaded, so a malformed rule is rejected
//! at reload instead of surfacing on every admission request.

use std::fmt;
use std::str::FromStr;

use serde_yaml::Value as YamlValue;
use thiserror::Error;

/// Declared scalar type of a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    String,
    Bool,
    Int,
    Int64,
    Float,
    Float64,
}

/// Scalar family a [`ValueType`] is extracted and compared as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    String,
    Bool,
    Integer,
    Float,
}

impl ValueType {
    pub fn as_str(self) -> &'static str {
        match self {
            ValueType::String => "string",
            ValueType::Bool => "bool",
            ValueType::Int => "int",
            ValueType::Int64 => "int64",
            ValueType::Float => "float",
            ValueType::Float64 => "float64",
        }
    }

    pub fn scalar_kind(self) -> ScalarKind {
        match self {
            ValueType::String => ScalarKind::String,
            ValueType::Bool => ScalarKind::Bool,
            ValueType::Int | ValueType::Int64 => ScalarKind::Integer,
            ValueType::Float | ValueType::Float64 => ScalarKind::Float,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValueType {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "string" => Ok(ValueType::String),
            "bool" => Ok(ValueType::Bool),
            "int" => Ok(ValueType::Int),
            "int64" => Ok(ValueType::Int64),
            "float" => Ok(ValueType::Float),
            "float64" => Ok(ValueType::Float64),
            _ => Err(()),
        }
    }
}

/// Comparison operator as written in the configuration.
///
/// Aliases (`MoreThan`/`GreaterThan`, ...) are kept distinct so a rule prints
/// back the way it was configured; [`Operator::comparison`] collapses them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Is,
    IsNot,
    In,
    NotIn,
    GreaterThan,
    MoreThan,
    SmallerThan,
    LessThan,
    EqualOrGreaterThan,
    EqualOrMoreThan,
    EqualOrSmallerThan,
    EqualOrLessThan,
}

/// The comparison an [`Operator`] performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Equal,
    NotEqual,
    Member,
    NotMember,
    Greater,
    Less,
    GreaterOrEqual,
    LessOrEqual,
}

impl Operator {
    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Is => "Is",
            Operator::IsNot => "IsNot",
            Operator::In => "In",
            Operator::NotIn => "NotIn",
            Operator::GreaterThan => "GreaterThan",
            Operator::MoreThan => "MoreThan",
            Operator::SmallerThan => "SmallerThan",
            Operator::LessThan => "LessThan",
            Operator::EqualOrGreaterThan => "EqualOrGreaterThan",
            Operator::EqualOrMoreThan => "EqualOrMoreThan",
            Operator::EqualOrSmallerThan => "EqualOrSmallerThan",
            Operator::EqualOrLessThan => "EqualOrLessThan",
        }
    }

    pub fn comparison(self) -> Comparison {
        match self {
            Operator::Is => Comparison::Equal,
            Operator::IsNot => Comparison::NotEqual,
            Operator::In => Comparison::Member,
            Operator::NotIn => Comparison::NotMember,
            Operator::GreaterThan | Operator::MoreThan => Comparison::Greater,
            Operator::SmallerThan | Operator::LessThan => Comparison::Less,
            Operator::EqualOrGreaterThan | Operator::EqualOrMoreThan => {
                Comparison::GreaterOrEqual
            }
            Operator::EqualOrSmallerThan | Operator::EqualOrLessThan => Comparison::LessOrEqual,
        }
    }

    /// Whether the operator tests set membership (`In`/`NotIn`).
    pub fn is_membership(self) -> bool {
        matches!(self.comparison(), Comparison::Member | Comparison::NotMember)
    }

    /// Whether the operator can be applied to values of `value_type`.
    pub fn supports(self, value_type: ValueType) -> bool {
        match self.comparison() {
            Comparison::Equal | Comparison::NotEqual => true,
            Comparison::Member | Comparison::NotMember => {
                value_type.scalar_kind() == ScalarKind::String
            }
            Comparison::Greater
            | Comparison::Less
            | Comparison::GreaterOrEqual
            | Comparison::LessOrEqual => matches!(
                value_type.scalar_kind(),
                ScalarKind::Integer | ScalarKind::Float
            ),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operator {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "Is" => Ok(Operator::Is),
            "IsNot" => Ok(Operator::IsNot),
            "In" => Ok(Operator::In),
            "NotIn" => Ok(Operator::NotIn),
            "GreaterThan" => Ok(Operator::GreaterThan),
            "MoreThan" => Ok(Operator::MoreThan),
            "SmallerThan" => Ok(Operator::SmallerThan),
            "LessThan" => Ok(Operator::LessThan),
            "EqualOrGreaterThan" => Ok(Operator::EqualOrGreaterThan),
            "EqualOrMoreThan" => Ok(Operator::EqualOrMoreThan),
            "EqualOrSmallerThan" => Ok(Operator::EqualOrSmallerThan),
            "EqualOrLessThan" => Ok(Operator::EqualOrLessThan),
            _ => Err(()),
        }
    }
}

/// Expected value of a rule.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleValue {
    String(String),
    StringSet(Vec<String>),
    Bool(bool),
    Int(i64),
    Float(f64),
}

impl RuleValue {
    /// Short name of the value's shape, used in diagnostics.
    pub fn shape(&self) -> &'static str {
        match self {
            RuleValue::String(_) => "string",
            RuleValue::StringSet(_) => "[]string",
            RuleValue::Bool(_) => "bool",
            RuleValue::Int(_) => "int",
            RuleValue::Float(_) => "float",
        }
    }

    /// Whether this value is the shape `value_type` combined with `op` expects.
    pub fn matches(&self, value_type: ValueType, op: Operator) -> bool {
        match (value_type.scalar_kind(), self) {
            (ScalarKind::String, RuleValue::StringSet(_)) => op.is_membership(),
            (ScalarKind::String, RuleValue::String(_)) => !op.is_membership(),
            (ScalarKind::Bool, RuleValue::Bool(_))
            | (ScalarKind::Integer, RuleValue::Int(_))
            | (ScalarKind::Float, RuleValue::Float(_)) => true,
            _ => false,
        }
    }

    /// Convert a YAML node into the value `value_type`/`op` expect.
    ///
    /// Integers widen to floats for the float types; nothing else is coerced.
    pub fn from_yaml(value_type: ValueType, op: Operator, node: &YamlValue) -> Result<Self, RuleError> {
        let mismatch = || RuleError::ValueTypeMismatch {
            value_type,
            op,
            found: yaml_shape(node),
        };

        let value = match value_type.scalar_kind() {
            ScalarKind::String if op.is_membership() => {
                let items = node.as_sequence().ok_or_else(mismatch)?;
                let set = items
                    .iter()
                    .map(|item| item.as_str().map(str::to_string))
                    .collect::<Option<Vec<_>>>()
                    .ok_or_else(mismatch)?;
                RuleValue::StringSet(set)
            }
            ScalarKind::String => RuleValue::String(node.as_str().ok_or_else(mismatch)?.to_string()),
            ScalarKind::Bool => RuleValue::Bool(node.as_bool().ok_or_else(mismatch)?),
            ScalarKind::Integer => RuleValue::Int(node.as_i64().ok_or_else(mismatch)?),
            ScalarKind::Float => RuleValue::Float(node.as_f64().ok_or_else(mismatch)?),
        };
        Ok(value)
    }
}

impl fmt::Display for RuleValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleValue::String(value) => write!(f, "{:?}", value),
            RuleValue::StringSet(values) => write!(f, "{:?}", values),
            RuleValue::Bool(value) => write!(f, "{}", value),
            RuleValue::Int(value) => write!(f, "{}", value),
            RuleValue::Float(value) => write!(f, "{}", value),
        }
    }
}

fn yaml_shape(node: &YamlValue) -> &'static str {
    match node {
        YamlValue::Null => "null",
        YamlValue::Bool(_) => "bool",
        YamlValue::Number(n) if n.is_f64() => "float",
        YamlValue::Number(_) => "int",
        YamlValue::String(_) => "string",
        YamlValue::Sequence(_) => "sequence",
        YamlValue::Mapping(_) => "mapping",
        YamlValue::Tagged(_) => "tagged value",
    }
}

/// A rule that is not internally consistent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleError {
    #[error("rule field path must not be empty")]
    EmptyField,

    #[error("rule field path {0:?} contains an empty segment")]
    EmptyPathSegment(String),

    #[error("operator {op} is not supported for type {value_type}")]
    UnsupportedOperator { value_type: ValueType, op: Operator },

    #[error("value (of type {found}) in rule is not of type {value_type} with operator {op}")]
    ValueTypeMismatch {
        value_type: ValueType,
        op: Operator,
        found: &'static str,
    },
}

/// A single field-path predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    /// Dot separated path into the object, e.g. `spec.replicas`.
    pub field: String,
    pub value_type: ValueType,
    pub op: Operator,
    pub value: RuleValue,
}

impl Rule {
    /// Build a rule, rejecting inconsistent combinations.
    pub fn new(
        field: impl Into<String>,
        value_type: ValueType,
        op: Operator,
        value: RuleValue,
    ) -> Result<Self, RuleError> {
        let rule = Self {
            field: field.into(),
            value_type,
            op,
            value,
        };
        rule.validate()?;
        Ok(rule)
    }

    /// Check path, operator and value shape against each other.
    pub fn validate(&self) -> Result<(), RuleError> {
        if self.field.is_empty() {
            return Err(RuleError::EmptyField);
        }
        if self.path().any(str::is_empty) {
            return Err(RuleError::EmptyPathSegment(self.field.clone()));
        }
        if !self.op.supports(self.value_type) {
            return Err(RuleError::UnsupportedOperator {
                value_type: self.value_type,
                op: self.op,
            });
        }
        if !self.value.matches(self.value_type, self.op) {
            return Err(RuleError::ValueTypeMismatch {
                value_type: self.value_type,
                op: self.op,
                found: self.value.shape(),
            });
        }
        Ok(())
    }

    /// Segments of the field path.
    pub fn path(&self) -> impl Iterator<Item = &str> {
        self.field.split('.')
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{field: {}, type: {}, op: {}, value: {}}}",
            self.field, self.value_type, self.op, self.value
        )
    }
}
