//! API discovery of the resources the cluster serves.
//!
//! Webhook rules name resources by group, version and plural, while the rule
//! document names kinds. Discovery bridges the two.

use std::collections::BTreeMap;

use kube::Client;
use kube::discovery::{Discovery, Scope};
use tracing::debug;

/// A resource the API server serves, in its recommended version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredResource {
    pub group: String,
    pub version: String,
    /// Plural resource name (`deployments`)
    pub plural: String,
    pub namespaced: bool,
}

impl DiscoveredResource {
    /// Scope as written in admission rules.
    pub fn scope(&self) -> &'static str {
        if self.namespaced {
            "Namespaced"
        } else {
            "Cluster"
        }
    }
}

/// Served resources indexed by kind.
///
/// A kind may be served by several groups (e.g. `Event` in the core and
/// `events.k8s.io` groups).
#[derive(Debug, Clone, Default)]
pub struct SupportedResources {
    by_kind: BTreeMap<String, Vec<DiscoveredResource>>,
}

impl SupportedResources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, kind: impl Into<String>, resource: DiscoveredResource) {
        self.by_kind.entry(kind.into()).or_default().push(resource);
    }

    /// Every resource serving `kind`.
    pub fn for_kind(&self, kind: &str) -> &[DiscoveredResource] {
        self.by_kind.get(kind).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.by_kind.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_kind.is_empty()
    }
}

/// Run API discovery and index every recommended resource by kind.
pub async fn discover_resources(client: Client) -> Result<SupportedResources, kube::Error> {
    let discovery = Discovery::new(client).run().await?;

    let mut supported = SupportedResources::new();
    for group in discovery.groups() {
        for (resource, capabilities) in group.recommended_resources() {
            supported.insert(
                resource.kind.clone(),
                DiscoveredResource {
                    group: resource.group.clone(),
                    version: resource.version.clone(),
                    plural: resource.plural.clone(),
                    namespaced: matches!(capabilities.scope, Scope::Namespaced),
                },
            );
        }
    }

    debug!(kinds = supported.len(), "Discovered served resources");
    Ok(supported)
}
