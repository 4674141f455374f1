//! Command line of the generic-validator binary.

use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Parser};

use crate::health::HEALTH_PORT;
use crate::resources::NamespacedName;
use crate::resources::validating_webhook::{DEFAULT_TIMEOUT_SECONDS, WebhookRegistration};
use crate::webhooks::{WEBHOOK_CERT_PATH, WEBHOOK_KEY_PATH, WEBHOOK_PORT};

/// Kubernetes validating admission webhook driven by per-kind field rules.
#[derive(Debug, Clone, Parser)]
#[command(name = "generic-validator")]
#[command(version)]
#[command(about = "Kubernetes validating admission webhook driven by per-kind field rules")]
pub struct Args {
    /// ConfigMap holding the rule document (<namespace>/<name>)
    #[arg(long, env = "GV_CONFIG_MAP", default_value = "kube-system/generic-validator")]
    pub config_map: NamespacedName,

    /// Key of the rule document inside the ConfigMap
    #[arg(long, env = "GV_CONFIG_KEY", default_value = "config.yml")]
    pub config_key: String,

    /// Service fronting the webhook (<namespace>/<name>)
    #[arg(long, env = "GV_SERVICE_NAME", default_value = "kube-system/generic-validator")]
    pub service_name: NamespacedName,

    /// cert-manager Certificate whose CA is injected into the webhook configuration
    #[arg(long, env = "GV_WEBHOOK_CERTIFICATE")]
    pub webhook_certificate: Option<NamespacedName>,

    /// Name of the ValidatingWebhookConfiguration to manage; unset disables registration
    #[arg(long, env = "GV_VALIDATING_WEBHOOK_CONFIGURATION")]
    pub validating_webhook_configuration: Option<String>,

    /// Serve and register the validating webhook
    #[arg(
        long,
        env = "GV_ENABLE_VALIDATING_WEBHOOK",
        default_value_t = true,
        action = ArgAction::Set
    )]
    pub enable_validating_webhook: bool,

    /// Port of the admission endpoint
    #[arg(long, env = "GV_WEBHOOK_PORT", default_value_t = WEBHOOK_PORT)]
    pub webhook_port: u16,

    /// Port of the health and metrics endpoints
    #[arg(long, env = "GV_HEALTH_PORT", default_value_t = HEALTH_PORT)]
    pub health_port: u16,

    /// TLS certificate of the admission endpoint (PEM)
    #[arg(long, env = "GV_TLS_CERT", default_value = WEBHOOK_CERT_PATH)]
    pub tls_cert: PathBuf,

    /// TLS private key of the admission endpoint (PEM)
    #[arg(long, env = "GV_TLS_KEY", default_value = WEBHOOK_KEY_PATH)]
    pub tls_key: PathBuf,

    /// Time budget of a single admission decision, in seconds (1-30, the range
    /// the API server accepts for `timeoutSeconds`)
    #[arg(
        long,
        env = "GV_DECISION_TIMEOUT",
        default_value_t = DEFAULT_TIMEOUT_SECONDS as u64,
        value_parser = clap::value_parser!(u64).range(1..=30)
    )]
    pub decision_timeout: u64,
}

impl Args {
    pub fn decision_timeout(&self) -> Duration {
        Duration::from_secs(self.decision_timeout)
    }

    /// Webhook registration to manage, if enabled.
    pub fn registration(&self) -> Option<WebhookRegistration> {
        if !self.enable_validating_webhook {
            return None;
        }
        let configuration_name = self
            .validating_webhook_configuration
            .as_ref()
            .filter(|name| !name.is_empty())?;
        Some(WebhookRegistration {
            configuration_name: configuration_name.clone(),
            service: self.service_name.clone(),
            certificate: self.webhook_certificate.clone(),
            timeout_seconds: i32::try_from(self.decision_timeout)
                .unwrap_or(DEFAULT_TIMEOUT_SECONDS),
        })
    }
}
