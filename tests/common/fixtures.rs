//! Test fixtures and builder patterns for rule documents and admission requests.

use generic_validator::webhooks::DecisionRequest;
use serde_json::{Value, json};

/// A single rule entry as written in the rule document.
pub fn rule(field: &str, value_type: &str, op: &str, value: Value) -> Value {
    json!({
        "field": field,
        "type": value_type,
        "op": op,
        "value": value,
    })
}

/// Builder for creating rule documents.
///
/// # Example
/// ```
/// let document = ConfigDocumentBuilder::new()
///     .kind("Widget", vec![rule("spec.tier", "string", "Is", json!("gold"))])
///     .admin_group("ops")
///     .build();
/// ```
#[derive(Clone, Debug, Default)]
pub struct ConfigDocumentBuilder {
    kind_rule_sets: Vec<Value>,
    admin_groups: Vec<String>,
}

impl ConfigDocumentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a `forKindsRules` entry for `kind`.
    pub fn kind(mut self, kind: impl Into<String>, rules: Vec<Value>) -> Self {
        self.kind_rule_sets.push(json!({
            "kind": kind.into(),
            "rules": rules,
        }));
        self
    }

    /// Add a `forKindsRules` entry restricted to `api_version`.
    pub fn kind_with_api_version(
        mut self,
        api_version: impl Into<String>,
        kind: impl Into<String>,
        rules: Vec<Value>,
    ) -> Self {
        self.kind_rule_sets.push(json!({
            "apiVersion": api_version.into(),
            "kind": kind.into(),
            "rules": rules,
        }));
        self
    }

    /// Add an admin group.
    pub fn admin_group(mut self, group: impl Into<String>) -> Self {
        self.admin_groups.push(group.into());
        self
    }

    /// Render the document as YAML.
    pub fn build(self) -> String {
        let mut document = json!({ "forKindsRules": self.kind_rule_sets });
        if !self.admin_groups.is_empty() {
            document["adminGroups"] = json!(self.admin_groups);
        }
        serde_yaml::to_string(&document).unwrap_or_default()
    }
}

/// Create a decision request for `kind` made by a user in `groups`.
pub fn decision_request(kind: &str, groups: &[&str], object: Value) -> DecisionRequest {
    DecisionRequest {
        kind: kind.to_string(),
        api_version: "example.com/v1".to_string(),
        requester_groups: groups.iter().map(|g| g.to_string()).collect(),
        object,
    }
}

/// A `Widget` object with the given spec.
pub fn widget(spec: Value) -> Value {
    json!({
        "apiVersion": "example.com/v1",
        "kind": "Widget",
        "metadata": { "name": "w1", "namespace": "default" },
        "spec": spec,
    })
}

/// Builder for AdmissionReview request bodies.
#[derive(Clone, Debug)]
pub struct AdmissionReviewBuilder {
    uid: String,
    kind: String,
    groups: Vec<String>,
    object: Option<Value>,
}

impl AdmissionReviewBuilder {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            uid: "705ab4f5-6393-11e8-b7cc-42010a800002".to_string(),
            kind: kind.into(),
            groups: vec!["system:authenticated".to_string()],
            object: None,
        }
    }

    pub fn uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = uid.into();
        self
    }

    /// Set the requester groups.
    pub fn groups(mut self, groups: &[&str]) -> Self {
        self.groups = groups.iter().map(|g| g.to_string()).collect();
        self
    }

    pub fn object(mut self, object: Value) -> Self {
        self.object = Some(object);
        self
    }

    /// Build the AdmissionReview JSON.
    pub fn build(self) -> Value {
        let mut request = json!({
            "uid": self.uid,
            "kind": { "group": "example.com", "version": "v1", "kind": self.kind },
            "resource": { "group": "example.com", "version": "v1", "resource": "widgets" },
            "name": "w1",
            "namespace": "default",
            "operation": "CREATE",
            "userInfo": { "username": "alice", "groups": self.groups },
            "dryRun": false,
        });
        if let Some(object) = self.object {
            request["object"] = object;
        }
        json!({
            "apiVersion": "admission.k8s.io/v1",
            "kind": "AdmissionReview",
            "request": request,
        })
    }
}
