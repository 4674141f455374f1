//! Reconciliation loop for the rule ConfigMap.
//!
//! Every observed change of the watched ConfigMap reloads the rule document
//! into the store. A rejected document leaves the previous configuration
//! live; a deleted ConfigMap is ignored for the same reason.

use std::sync::Arc;
use std::time::Instant;

use k8s_openapi::api::core::v1::ConfigMap;
use kube::ResourceExt;
use kube::runtime::controller::Action;
use tracing::{debug, error, info, warn};

use crate::controller::configuration::configmap_document;
use crate::controller::context::Context;
use crate::controller::error::Error;
use crate::controller::registration::ensure_webhook_configuration;

/// Reconcile the rule ConfigMap
///
/// This is the function called by the controller for every change of the
/// watched ConfigMap.
pub async fn reconcile(configmap: Arc<ConfigMap>, ctx: Arc<Context>) -> Result<Action, Error> {
    let start_time = Instant::now();
    let name = configmap.name_any();
    let namespace = configmap.namespace().unwrap_or_default();

    debug!(name = %name, namespace = %namespace, "Reconciling rule ConfigMap");

    if configmap.metadata.deletion_timestamp.is_some() {
        warn!(name = %name, "ConfigMap is being deleted, keeping the last configuration");
        return Ok(Action::await_change());
    }

    let loaded = configmap_document(&configmap, &ctx.config_key)
        .and_then(|document| ctx.store.load(document).map_err(Error::from));

    let generation = match loaded {
        Ok(generation) => generation,
        Err(e) => {
            error!(name = %name, error = %e, "Rule configuration rejected, keeping the previous one");
            if let Some(ref health_state) = ctx.health_state {
                health_state.metrics.record_reload_error();
            }
            ctx.publish_warning_event(
                &configmap,
                "ConfigurationRejected",
                "Reloading",
                Some(e.to_string()),
            )
            .await;
            return Err(e);
        }
    };

    let configuration = ctx.store.snapshot();
    if let Some(ref health_state) = ctx.health_state {
        let rules_per_kind: Vec<(String, usize)> = configuration
            .kinds()
            .iter()
            .map(|kind| (kind.clone(), configuration.rules_for_kind(kind).len()))
            .collect();
        health_state
            .metrics
            .record_reload(configuration.generation(), &rules_per_kind);
    }
    ctx.publish_normal_event(
        &configmap,
        "ConfigurationLoaded",
        "Reloading",
        Some(format!(
            "Loaded generation {} with {} rules for {} kinds",
            generation,
            configuration.rule_count(),
            configuration.kinds().len()
        )),
    )
    .await;

    if let Some(ref registration) = ctx.registration {
        let kinds = configuration.kinds().to_vec();
        if ctx.registration_outdated(&kinds).await {
            info!(kinds = ?kinds, "Configured kinds changed, updating webhook configuration");
            ensure_webhook_configuration(
                ctx.client.clone(),
                registration,
                configuration.kind_rule_sets(),
            )
            .await?;
            ctx.set_registered_kinds(kinds).await;
        }
    }

    info!(
        name = %name,
        generation,
        duration_ms = start_time.elapsed().as_millis() as u64,
        "Rule configuration reloaded"
    );
    Ok(Action::await_change())
}

/// Error policy for the controller
///
/// Rejected documents wait for the next change of the ConfigMap; API errors
/// are retried.
pub fn error_policy(configmap: Arc<ConfigMap>, error: &Error, _ctx: Arc<Context>) -> Action {
    let name = configmap.name_any();

    if error.is_configuration_error() {
        debug!(name = %name, "Waiting for the ConfigMap to change");
        return Action::await_change();
    }

    if error.is_retryable() {
        warn!(name = %name, error = %error, "Retryable error, will retry");
    } else {
        error!(name = %name, error = %error, "Non-retryable error");
    }
    Action::requeue(error.requeue_after())
}
