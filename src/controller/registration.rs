//! Applying the ValidatingWebhookConfiguration.

use k8s_openapi::api::admissionregistration::v1::ValidatingWebhookConfiguration;
use kube::api::{Patch, PatchParams};
use kube::{Api, Client};
use tracing::info;

use crate::config::KindRuleSet;
use crate::controller::error::Result;
use crate::resources::{
    FIELD_MANAGER, WebhookRegistration, discover_resources,
    generate_validating_webhook_configuration, webhook_rules,
};

/// Discover the served resources and server-side apply the webhook
/// configuration covering `rule_sets`.
pub async fn ensure_webhook_configuration(
    client: Client,
    registration: &WebhookRegistration,
    rule_sets: &[KindRuleSet],
) -> Result<()> {
    let discovered = discover_resources(client.clone()).await?;
    let rules = webhook_rules(rule_sets, &discovered);
    let rule_count = rules.len();
    let configuration = generate_validating_webhook_configuration(registration, rules);

    let api: Api<ValidatingWebhookConfiguration> = Api::all(client);
    api.patch(
        &registration.configuration_name,
        &PatchParams::apply(FIELD_MANAGER).force(),
        &Patch::Apply(&configuration),
    )
    .await?;

    info!(
        name = %registration.configuration_name,
        rules = rule_count,
        "Applied validating webhook configuration"
    );
    Ok(())
}
