//! Admission webhook server.
//!
//! Provides the HTTP endpoint Kubernetes calls for validating admission.
//!
//! To enable the webhook:
//! 1. Provision a TLS certificate for the webhook Service (e.g. cert-manager)
//! 2. Mount the certificate secret to the pod at /etc/webhook/certs/
//! 3. Create a ValidatingWebhookConfiguration, or let the process register
//!    one with `--validating-webhook-configuration`
//!
//! The webhook server starts automatically when certificates are present.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::post};
use kube::core::DynamicObject;
use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::health::HealthState;
use crate::webhooks::policies::{AdmissionPolicy, DecisionBudget, ValidationResult, reason};
use crate::webhooks::request::decode;

/// Default path to webhook TLS certificate
pub const WEBHOOK_CERT_PATH: &str = "/etc/webhook/certs/tls.crt";
/// Default path to webhook TLS private key
pub const WEBHOOK_KEY_PATH: &str = "/etc/webhook/certs/tls.key";
/// Default webhook server port
pub const WEBHOOK_PORT: u16 = 9443;
/// Path the validating webhook is served on
pub const VALIDATE_PATH: &str = "/validate";
/// Default time budget of a single decision
pub const DEFAULT_DECISION_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared state for webhook handlers
pub struct WebhookState {
    pub policy: AdmissionPolicy,
    /// Optional health state for decision metrics
    pub health_state: Option<Arc<HealthState>>,
    /// Deadline applied to every decision
    pub decision_timeout: Duration,
}

impl WebhookState {
    pub fn new(policy: AdmissionPolicy, health_state: Option<Arc<HealthState>>) -> Self {
        Self {
            policy,
            health_state,
            decision_timeout: DEFAULT_DECISION_TIMEOUT,
        }
    }

    pub fn with_decision_timeout(mut self, timeout: Duration) -> Self {
        self.decision_timeout = timeout;
        self
    }
}

/// Create a denial response with reason embedded in message.
/// kube-rs deny() only sets status.message, so we format as "[reason] message"
fn deny_with_reason(
    request: &AdmissionRequest<DynamicObject>,
    message: &str,
    reason: &str,
) -> AdmissionReview<DynamicObject> {
    let full_message = format!("[{}] {}", reason, message);
    AdmissionResponse::from(request)
        .deny(full_message)
        .into_review()
}

/// Create the webhook router
pub fn create_webhook_router(state: Arc<WebhookState>) -> Router {
    Router::new()
        .route(VALIDATE_PATH, post(validate))
        .with_state(state)
}

/// Validating admission handler
async fn validate(
    State(state): State<Arc<WebhookState>>,
    Json(review): Json<AdmissionReview<DynamicObject>>,
) -> impl IntoResponse {
    let request: AdmissionRequest<DynamicObject> = match review.try_into() {
        Ok(req) => req,
        Err(e) => {
            error!(error = %e, "Failed to extract admission request");
            return (
                StatusCode::BAD_REQUEST,
                Json(
                    AdmissionResponse::invalid(format!("Invalid AdmissionReview: {}", e))
                        .into_review(),
                ),
            );
        }
    };

    let uid = &request.uid;
    debug!(
        uid = %uid,
        operation = ?request.operation,
        namespace = ?request.namespace,
        name = %request.name,
        "Processing admission request"
    );

    let decision_request = match decode(&request) {
        Ok(decoded) => decoded,
        Err(e) => {
            warn!(uid = %uid, error = %e, "Admission request could not be decoded");
            record_decision(&state, &request.kind.kind, reason::INVALID_REQUEST, None);
            return (
                StatusCode::OK,
                Json(deny_with_reason(
                    &request,
                    &e.to_string(),
                    reason::INVALID_REQUEST,
                )),
            );
        }
    };

    let started = Instant::now();
    let budget = DecisionBudget::starting_at(started, state.decision_timeout);
    let result = state.policy.decide(&decision_request, &budget);
    record_decision(
        &state,
        &decision_request.kind,
        result.reason(),
        Some(started.elapsed().as_secs_f64()),
    );

    respond(&request, &decision_request.kind, result)
}

fn respond(
    request: &AdmissionRequest<DynamicObject>,
    kind: &str,
    result: ValidationResult,
) -> (StatusCode, Json<AdmissionReview<DynamicObject>>) {
    let uid = &request.uid;
    if !result.allowed {
        let reason = result
            .reason
            .unwrap_or_else(|| reason::RULE_VIOLATED.to_string());
        let message = result
            .message
            .unwrap_or_else(|| "Validation failed".to_string());
        warn!(uid = %uid, kind = %kind, reason = %reason, message = %message, "Admission request denied");
        return (
            StatusCode::OK,
            Json(deny_with_reason(request, &message, &reason)),
        );
    }

    info!(uid = %uid, kind = %kind, reason = ?result.reason, "Admission request allowed");
    (
        StatusCode::OK,
        Json(AdmissionResponse::from(request).into_review()),
    )
}

fn record_decision(state: &WebhookState, kind: &str, reason: &str, duration_secs: Option<f64>) {
    if let Some(ref health_state) = state.health_state {
        health_state.metrics.record_decision(kind, reason, duration_secs);
    }
}

/// Errors that can occur when running the webhook server
#[derive(Debug, Error)]
pub enum WebhookError {
    /// TLS configuration error
    #[error("TLS configuration error: {0}")]
    TlsConfig(String),
    /// Server error
    #[error("Webhook server error: {0}")]
    Server(String),
}

/// Run the webhook server with TLS
///
/// Binds to 0.0.0.0:`port` and serves the /validate endpoint.
/// TLS certificates are loaded from the paths specified.
///
/// # Arguments
/// * `state` - Shared webhook state (decision engine and metrics)
/// * `cert_path` - Path to TLS certificate file (PEM format)
/// * `key_path` - Path to TLS private key file (PEM format)
/// * `port` - Port to listen on
pub async fn run_webhook_server(
    state: Arc<WebhookState>,
    cert_path: &str,
    key_path: &str,
    port: u16,
) -> Result<(), WebhookError> {
    use axum_server::tls_rustls::RustlsConfig;
    use std::net::SocketAddr;
    use std::path::PathBuf;

    let app = create_webhook_router(state);

    let config = RustlsConfig::from_pem_file(PathBuf::from(cert_path), PathBuf::from(key_path))
        .await
        .map_err(|e| WebhookError::TlsConfig(e.to_string()))?;

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(port, "Webhook server listening with TLS");

    axum_server::bind_rustls(addr, config)
        .serve(app.into_make_service())
        .await
        .map_err(|e| WebhookError::Server(e.to_string()))?;

    Ok(())
}
