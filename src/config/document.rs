//! The YAML configuration document.
//!
//! ```yaml
//! forKindsRules:
//!   - apiVersion: apps/v1
//!     kind: Deployment
//!     rules:
//!       - field: spec.replicas
//!         type: int
//!         op: GreaterThan
//!         value: 1
//! adminGroups:
//!   - platform-admins
//! ```

use std::collections::BTreeSet;
use std::str::FromStr;

use serde::Deserialize;
use serde_yaml::Value as YamlValue;

use super::error::ConfigError;
use super::rule::{Operator, Rule, RuleError, RuleValue, ValueType};

/// Group granted to cluster administrators when `adminGroups` is left empty.
pub const DEFAULT_ADMIN_GROUP: &str = "system:masters";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawDocument {
    #[serde(default)]
    for_kinds_rules: Vec<RawKindRules>,
    #[serde(default)]
    admin_groups: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawKindRules {
    #[serde(default)]
    api_version: Option<String>,
    #[serde(default)]
    kind: String,
    #[serde(default)]
    rules: Vec<RawRule>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRule {
    #[serde(default)]
    field: String,
    #[serde(rename = "type", default)]
    value_type: String,
    #[serde(default)]
    op: String,
    #[serde(default)]
    value: YamlValue,
}

/// Rules declared for one kind in one `forKindsRules` entry.
#[derive(Debug, Clone, PartialEq)]
pub struct KindRuleSet {
    pub api_version: Option<String>,
    pub kind: String,
    pub rules: Vec<Rule>,
}

/// A parsed and fully validated configuration document.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigDocument {
    /// Entries in document order.
    pub kind_rule_sets: Vec<KindRuleSet>,
    pub admin_groups: BTreeSet<String>,
}

impl Default for ConfigDocument {
    fn default() -> Self {
        Self {
            kind_rule_sets: Vec::new(),
            admin_groups: default_admin_groups(),
        }
    }
}

fn default_admin_groups() -> BTreeSet<String> {
    BTreeSet::from([DEFAULT_ADMIN_GROUP.to_string()])
}

impl ConfigDocument {
    /// Parse and validate a YAML document.
    ///
    /// An empty document is valid and yields no rules and the default admin group.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let raw: Option<RawDocument> = serde_yaml::from_str(text)?;
        let raw = raw.unwrap_or_default();

        let kind_rule_sets = raw
            .for_kinds_rules
            .into_iter()
            .enumerate()
            .map(|(index, entry)| convert_kind_rules(index, entry))
            .collect::<Result<Vec<_>, _>>()?;

        let mut admin_groups: BTreeSet<String> = raw
            .admin_groups
            .into_iter()
            .filter(|group| !group.is_empty())
            .collect();
        if admin_groups.is_empty() {
            admin_groups = default_admin_groups();
        }

        Ok(Self {
            kind_rule_sets,
            admin_groups,
        })
    }
}

impl FromStr for ConfigDocument {
    type Err = ConfigError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        Self::parse(text)
    }
}

fn convert_kind_rules(index: usize, entry: RawKindRules) -> Result<KindRuleSet, ConfigError> {
    if entry.kind.is_empty() {
        return Err(ConfigError::MissingKind { index });
    }

    let rules = entry
        .rules
        .into_iter()
        .enumerate()
        .map(|(position, raw)| convert_rule(index, &entry.kind, position, raw))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(KindRuleSet {
        api_version: entry.api_version.filter(|v| !v.is_empty()),
        kind: entry.kind,
        rules,
    })
}

fn convert_rule(index: usize, kind: &str, position: usize, raw: RawRule) -> Result<Rule, ConfigError> {
    let value_type: ValueType = raw.value_type.parse().map_err(|()| ConfigError::UnknownRuleType {
        index,
        kind: kind.to_string(),
        rule: position,
        value_type: raw.value_type.clone(),
    })?;
    let op: Operator = raw.op.parse().map_err(|()| ConfigError::UnknownOperator {
        index,
        kind: kind.to_string(),
        rule: position,
        op: raw.op.clone(),
    })?;

    let invalid = |source| ConfigError::InvalidRule {
        index,
        kind: kind.to_string(),
        rule: position,
        source,
    };

    // Operator support is checked before the value so the error names the real defect.
    if !op.supports(value_type) {
        return Err(invalid(RuleError::UnsupportedOperator { value_type, op }));
    }
    let value = RuleValue::from_yaml(value_type, op, &raw.value).map_err(invalid)?;
    Rule::new(raw.field, value_type, op, value).map_err(invalid)
}
