//! Shared context for the configuration controller.
//!
//! The Context struct holds shared state that is passed to the reconciler,
//! including the Kubernetes client, the rule store it feeds and the event
//! recorder.

use std::sync::Arc;

use k8s_openapi::api::core::v1::ConfigMap;
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use kube::{Client, Resource};
use tokio::sync::Mutex;

use crate::config::RuleStore;
use crate::health::HealthState;
use crate::resources::{FIELD_MANAGER, WebhookRegistration};

/// Shared context for the controller
pub struct Context {
    /// Kubernetes client
    pub client: Client,
    /// Store the watched document is loaded into
    pub store: Arc<RuleStore>,
    /// ConfigMap key holding the rule document
    pub config_key: String,
    /// Webhook registration, when the validator manages its own configuration
    pub registration: Option<WebhookRegistration>,
    /// Event reporter identity
    reporter: Reporter,
    /// Optional health state for metrics and readiness
    pub health_state: Option<Arc<HealthState>>,
    /// Kinds the webhook configuration was last applied with
    registered_kinds: Mutex<Option<Vec<String>>>,
}

impl Context {
    /// Create a new context
    pub fn new(
        client: Client,
        store: Arc<RuleStore>,
        config_key: impl Into<String>,
        registration: Option<WebhookRegistration>,
        health_state: Option<Arc<HealthState>>,
    ) -> Self {
        Self {
            client,
            store,
            config_key: config_key.into(),
            registration,
            reporter: Reporter {
                controller: FIELD_MANAGER.into(),
                instance: std::env::var("POD_NAME").ok(),
            },
            health_state,
            registered_kinds: Mutex::new(None),
        }
    }

    /// Whether the webhook configuration must be re-applied for `kinds`.
    pub async fn registration_outdated(&self, kinds: &[String]) -> bool {
        self.registered_kinds.lock().await.as_deref() != Some(kinds)
    }

    /// Remember the kinds the webhook configuration was applied with.
    pub async fn set_registered_kinds(&self, kinds: Vec<String>) {
        *self.registered_kinds.lock().await = Some(kinds);
    }

    /// Create an event recorder for publishing Kubernetes events
    fn recorder(&self) -> Recorder {
        Recorder::new(self.client.clone(), self.reporter.clone())
    }

    /// Publish a normal event for the ConfigMap
    pub async fn publish_normal_event(
        &self,
        configmap: &ConfigMap,
        reason: &str,
        action: &str,
        note: Option<String>,
    ) {
        self.publish_event(configmap, EventType::Normal, reason, action, note)
            .await;
    }

    /// Publish a warning event for the ConfigMap
    pub async fn publish_warning_event(
        &self,
        configmap: &ConfigMap,
        reason: &str,
        action: &str,
        note: Option<String>,
    ) {
        self.publish_event(configmap, EventType::Warning, reason, action, note)
            .await;
    }

    async fn publish_event(
        &self,
        configmap: &ConfigMap,
        type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    ) {
        let recorder = self.recorder();
        let object_ref = configmap.object_ref(&());
        if let Err(e) = recorder
            .publish(
                &Event {
                    type_,
                    reason: reason.into(),
                    note,
                    action: action.into(),
                    secondary: None,
                },
                &object_ref,
            )
            .await
        {
            tracing::warn!(reason = %reason, error = %e, "Failed to publish event");
        }
    }
}
