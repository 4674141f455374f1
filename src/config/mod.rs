//! Rule configuration: the rule model, the YAML document and the shared store.
//!
//! - `rule`: rules, scalar types, operators and expected values
//! - `document`: parsing and validation of the `forKindsRules` document
//! - `store`: the indexed configuration published to concurrent readers

pub mod document;
pub mod error;
pub mod rule;
pub mod store;

pub use document::{ConfigDocument, DEFAULT_ADMIN_GROUP, KindRuleSet};
pub use error::ConfigError;
pub use rule::{Comparison, Operator, Rule, RuleError, RuleValue, ScalarKind, ValueType};
pub use store::{Configuration, RuleStore};
