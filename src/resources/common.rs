//! Common resource utilities.
//!
//! Provides the field manager, the standard labels applied to every object the
//! validator writes, and the `namespace/name` reference type used on the
//! command line.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Field manager name for server-side apply
pub const FIELD_MANAGER: &str = "generic-validator";

/// Standard labels applied to all managed resources
pub fn standard_labels(name: &str) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    labels.insert("app.kubernetes.io/name".to_string(), name.to_string());
    labels.insert(
        "app.kubernetes.io/managed-by".to_string(),
        FIELD_MANAGER.to_string(),
    );
    labels.insert(
        "app.kubernetes.io/component".to_string(),
        "admission-webhook".to_string(),
    );
    labels
}

/// Reference to a namespaced object, written `namespace/name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NamespacedName {
    pub namespace: String,
    pub name: String,
}

impl NamespacedName {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

/// A `namespace/name` reference that does not have exactly two non-empty parts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid reference '{0}': expected <namespace>/<name>")]
pub struct InvalidNamespacedName(pub String);

impl FromStr for NamespacedName {
    type Err = InvalidNamespacedName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((namespace, name))
                if !namespace.is_empty() && !name.is_empty() && !name.contains('/') =>
            {
                Ok(Self::new(namespace, name))
            }
            _ => Err(InvalidNamespacedName(s.to_string())),
        }
    }
}

impl fmt::Display for NamespacedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}
