//! Resource generation module.
//!
//! Contains the Kubernetes objects the validator writes and the discovery
//! needed to build them.
//!
//! ## Resources Generated
//!
//! | Resource | Purpose |
//! |----------|---------|
//! | ValidatingWebhookConfiguration | Routes CREATE/UPDATE of configured kinds to `/validate` |

pub mod common;
pub mod discovery;
pub mod validating_webhook;

// Re-export commonly used items
pub use common::{FIELD_MANAGER, NamespacedName, standard_labels};
pub use discovery::{DiscoveredResource, SupportedResources, discover_resources};
pub use validating_webhook::{
    WebhookRegistration, generate_validating_webhook_configuration, webhook_rules,
};
