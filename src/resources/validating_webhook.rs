//! ValidatingWebhookConfiguration generation.
//!
//! The webhook intercepts CREATE and UPDATE of every configured kind the
//! cluster serves and routes them to the validator Service on `/validate`.
//! The CA bundle is injected by cert-manager's CA injector when a certificate
//! is named.

use std::collections::BTreeMap;

use k8s_openapi::api::admissionregistration::v1::{
    RuleWithOperations, ServiceReference, ValidatingWebhook, ValidatingWebhookConfiguration,
    WebhookClientConfig,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use tracing::warn;

use crate::config::KindRuleSet;
use crate::resources::common::{NamespacedName, standard_labels};
use crate::resources::discovery::SupportedResources;
use crate::webhooks::VALIDATE_PATH;

/// Port of the validator Service the API server calls
pub const SERVICE_PORT: i32 = 443;
/// Annotation read by the cert-manager CA injector
pub const INJECT_CA_FROM_ANNOTATION: &str = "cert-manager.io/inject-ca-from";
/// Default `timeoutSeconds` of the webhook
pub const DEFAULT_TIMEOUT_SECONDS: i32 = 10;

/// Where and how the webhook is registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookRegistration {
    /// Name of the ValidatingWebhookConfiguration
    pub configuration_name: String,
    /// Service fronting the validator pods
    pub service: NamespacedName,
    /// cert-manager Certificate whose CA is injected, if any
    pub certificate: Option<NamespacedName>,
    pub timeout_seconds: i32,
}

impl WebhookRegistration {
    /// Fully qualified webhook name.
    pub fn webhook_name(&self) -> String {
        format!("validate.{}.generic-validator.io", self.configuration_name)
    }
}

/// Split an `apiVersion` into group and version.
fn group_version(api_version: &str) -> (&str, &str) {
    match api_version.split_once('/') {
        Some((group, version)) => (group, version),
        None => ("", api_version),
    }
}

/// Build one CREATE/UPDATE rule per served resource of every configured kind.
///
/// Rule sets naming an `apiVersion` only match that group and version. Kinds the
/// cluster does not serve are skipped.
pub fn webhook_rules(
    rule_sets: &[KindRuleSet],
    discovered: &SupportedResources,
) -> Vec<RuleWithOperations> {
    // (group, version, plural) -> scope
    let mut targets: BTreeMap<(String, String, String), &'static str> = BTreeMap::new();

    for rule_set in rule_sets {
        let served = discovered.for_kind(&rule_set.kind);
        let matched: Vec<(String, String, String, &'static str)> = match &rule_set.api_version {
            Some(api_version) => {
                let (group, version) = group_version(api_version);
                served
                    .iter()
                    .filter(|resource| resource.group == group)
                    .map(|resource| {
                        (
                            group.to_string(),
                            version.to_string(),
                            resource.plural.clone(),
                            resource.scope(),
                        )
                    })
                    .collect()
            }
            None => served
                .iter()
                .map(|resource| {
                    (
                        resource.group.clone(),
                        resource.version.clone(),
                        resource.plural.clone(),
                        resource.scope(),
                    )
                })
                .collect(),
        };

        if matched.is_empty() {
            warn!(
                kind = %rule_set.kind,
                api_version = ?rule_set.api_version,
                "Configured kind is not served by the cluster, not registering it"
            );
        }
        for (group, version, plural, scope) in matched {
            targets.insert((group, version, plural), scope);
        }
    }

    targets
        .into_iter()
        .map(|((group, version, plural), scope)| RuleWithOperations {
            operations: Some(vec!["CREATE".to_string(), "UPDATE".to_string()]),
            api_groups: Some(vec![group]),
            api_versions: Some(vec![version]),
            resources: Some(vec![plural]),
            scope: Some(scope.to_string()),
        })
        .collect()
}

/// Generate the ValidatingWebhookConfiguration for `registration`.
pub fn generate_validating_webhook_configuration(
    registration: &WebhookRegistration,
    rules: Vec<RuleWithOperations>,
) -> ValidatingWebhookConfiguration {
    let annotations = registration.certificate.as_ref().map(|certificate| {
        BTreeMap::from([(
            INJECT_CA_FROM_ANNOTATION.to_string(),
            certificate.to_string(),
        )])
    });

    ValidatingWebhookConfiguration {
        metadata: ObjectMeta {
            name: Some(registration.configuration_name.clone()),
            labels: Some(standard_labels(&registration.configuration_name)),
            annotations,
            ..Default::default()
        },
        webhooks: Some(vec![ValidatingWebhook {
            name: registration.webhook_name(),
            admission_review_versions: vec!["v1".to_string()],
            client_config: WebhookClientConfig {
                service: Some(ServiceReference {
                    namespace: registration.service.namespace.clone(),
                    name: registration.service.name.clone(),
                    path: Some(VALIDATE_PATH.to_string()),
                    port: Some(SERVICE_PORT),
                }),
                ..Default::default()
            },
            rules: Some(rules),
            failure_policy: Some("Fail".to_string()),
            match_policy: Some("Equivalent".to_string()),
            side_effects: "None".to_string(),
            timeout_seconds: Some(registration.timeout_seconds),
            ..Default::default()
        }]),
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::get_unwrap
)]
mod tests {
    use super::*;
    use crate::resources::discovery::DiscoveredResource;

    fn discovered() -> SupportedResources {
        let mut supported = SupportedResources::new();
        supported.insert(
            "Deployment",
            DiscoveredResource {
                group: "apps".to_string(),
                version: "v1".to_string(),
                plural: "deployments".to_string(),
                namespaced: true,
            },
        );
        supported.insert(
            "Namespace",
            DiscoveredResource {
                group: String::new(),
                version: "v1".to_string(),
                plural: "namespaces".to_string(),
                namespaced: false,
            },
        );
        supported.insert(
            "Event",
            DiscoveredResource {
                group: String::new(),
                version: "v1".to_string(),
                plural: "events".to_string(),
                namespaced: true,
            },
        );
        supported.insert(
            "Event",
            DiscoveredResource {
                group: "events.k8s.io".to_string(),
                version: "v1".to_string(),
                plural: "events".to_string(),
                namespaced: true,
            },
        );
        supported
    }

    fn rule_set(api_version: Option<&str>, kind: &str) -> KindRuleSet {
        KindRuleSet {
            api_version: api_version.map(str::to_string),
            kind: kind.to_string(),
            rules: Vec::new(),
        }
    }

    fn registration(certificate: Option<NamespacedName>) -> WebhookRegistration {
        WebhookRegistration {
            configuration_name: "generic-validator".to_string(),
            service: NamespacedName::new("kube-system", "generic-validator"),
            certificate,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
        }
    }

    #[test]
    fn test_rules_for_served_kinds() {
        let rules = webhook_rules(
            &[rule_set(None, "Deployment"), rule_set(None, "Namespace")],
            &discovered(),
        );
        assert_eq!(rules.len(), 2);

        let deployments = rules
            .iter()
            .find(|r| r.resources == Some(vec!["deployments".to_string()]))
            .unwrap();
        assert_eq!(deployments.api_groups, Some(vec!["apps".to_string()]));
        assert_eq!(deployments.scope, Some("Namespaced".to_string()));
        assert_eq!(
            deployments.operations,
            Some(vec!["CREATE".to_string(), "UPDATE".to_string()])
        );

        let namespaces = rules
            .iter()
            .find(|r| r.resources == Some(vec!["namespaces".to_string()]))
            .unwrap();
        assert_eq!(namespaces.api_groups, Some(vec![String::new()]));
        assert_eq!(namespaces.scope, Some("Cluster".to_string()));
    }

    #[test]
    fn test_unknown_kind_skipped() {
        let rules = webhook_rules(&[rule_set(None, "Widget")], &discovered());
        assert!(rules.is_empty());
    }

    #[test]
    fn test_api_version_restricts_group() {
        let rules = webhook_rules(&[rule_set(Some("events.k8s.io/v1"), "Event")], &discovered());
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].api_groups, Some(vec!["events.k8s.io".to_string()]));

        let all = webhook_rules(&[rule_set(None, "Event")], &discovered());
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_duplicate_kinds_registered_once() {
        let rules = webhook_rules(
            &[rule_set(None, "Deployment"), rule_set(Some("apps/v1"), "Deployment")],
            &discovered(),
        );
        assert_eq!(rules.len(), 1);
    }

    #[test]
    fn test_generate_configuration() {
        let rules = webhook_rules(&[rule_set(None, "Deployment")], &discovered());
        let config = generate_validating_webhook_configuration(
            &registration(Some(NamespacedName::new("kube-system", "validator-cert"))),
            rules,
        );

        assert_eq!(config.metadata.name, Some("generic-validator".to_string()));
        assert_eq!(
            config
                .metadata
                .annotations
                .as_ref()
                .unwrap()
                .get(INJECT_CA_FROM_ANNOTATION),
            Some(&"kube-system/validator-cert".to_string())
        );

        let webhooks = config.webhooks.unwrap();
        assert_eq!(webhooks.len(), 1);
        let webhook = &webhooks[0];
        assert_eq!(webhook.name, "validate.generic-validator.generic-validator.io");
        assert_eq!(webhook.side_effects, "None");
        assert_eq!(webhook.failure_policy, Some("Fail".to_string()));
        assert_eq!(webhook.match_policy, Some("Equivalent".to_string()));
        assert_eq!(webhook.admission_review_versions, vec!["v1".to_string()]);
        assert_eq!(webhook.timeout_seconds, Some(10));

        let service = webhook.client_config.service.as_ref().unwrap();
        assert_eq!(service.namespace, "kube-system");
        assert_eq!(service.path, Some("/validate".to_string()));
        assert_eq!(service.port, Some(443));
        assert_eq!(webhook.rules.as_ref().unwrap().len(), 1);
    }

    #[test]
    fn test_no_annotation_without_certificate() {
        let config = generate_validating_webhook_configuration(&registration(None), Vec::new());
        assert!(config.metadata.annotations.is_none());
    }
}
