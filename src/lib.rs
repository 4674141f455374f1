//! generic-validator library crate
//!
//! A Kubernetes validating admission webhook whose policy is a YAML document of
//! per-kind field rules. This module exports the rule store, the decision
//! engine, the configuration controller and the resource generators.

pub mod cli;
pub mod config;
pub mod controller;
pub mod health;
pub mod resources;
pub mod webhooks;

pub use config::{ConfigError, RuleStore};
pub use health::HealthState;
pub use webhooks::{
    AdmissionPolicy, WEBHOOK_CERT_PATH, WEBHOOK_KEY_PATH, WEBHOOK_PORT, WebhookError,
    WebhookState, run_webhook_server,
};

use std::sync::Arc;

use futures::StreamExt;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::runtime::Controller;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::{Api, Client};
use tracing::{debug, error, info};

use controller::{context::Context, reconciler::reconcile};
use resources::NamespacedName;

/// Create the default watcher configuration for all controllers.
///
/// This ensures consistent behavior across all controllers:
/// - `any_semantic()`: More reliable resource discovery in test environments
fn default_watcher_config() -> WatcherConfig {
    WatcherConfig::default().any_semantic()
}

/// Watcher configuration restricted to the single rule ConfigMap.
pub fn configmap_watcher_config(configmap: &NamespacedName) -> WatcherConfig {
    default_watcher_config().fields(&format!("metadata.name={}", configmap.name))
}

/// Run the configuration controller.
///
/// Watches the rule ConfigMap and reloads the store on every change. It can
/// be called from main.rs or spawned as a background task during tests.
pub async fn run_config_controller(
    client: Client,
    configmap: NamespacedName,
    ctx: Arc<Context>,
) {
    info!(configmap = %configmap, "Starting configuration controller");

    let configmaps: Api<ConfigMap> = Api::namespaced(client, &configmap.namespace);

    Controller::new(configmaps, configmap_watcher_config(&configmap))
        .run(reconcile, controller::reconciler::error_policy, ctx)
        .for_each(|result| async move {
            match result {
                Ok((obj, _action)) => {
                    debug!("Reconciled: {}", obj.name);
                }
                Err(e) => {
                    // A deleted ConfigMap triggers a reconcile for an object that is
                    // gone; the last configuration stays live.
                    let is_not_found = match &e {
                        kube::runtime::controller::Error::ObjectNotFound(_) => true,
                        kube::runtime::controller::Error::ReconcilerFailed(err, _) => {
                            err.is_not_found()
                        }
                        _ => false,
                    };
                    if is_not_found {
                        debug!("ConfigMap no longer exists: {:?}", e);
                    } else {
                        error!("Reconciliation error: {:?}", e);
                    }
                }
            }
        })
        .await;

    // This should never complete in normal operation
    error!("Controller stream ended unexpectedly");
}
