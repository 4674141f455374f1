//! Webhook module for validating admission requests.
//!
//! - `request`: decoding of AdmissionReview requests into decision requests
//! - `policies`: the rule-driven decision engine (field resolution, rule
//!   evaluation, admin bypass)
//! - `server`: the HTTPS endpoint the API server calls

pub mod policies;
pub mod request;
mod server;

pub use policies::{
    AdmissionPolicy, DecisionBudget, DecisionRequest, EvalError, ValidationResult, verify,
};
pub use request::{DecodeError, decode};
pub use server::{
    DEFAULT_DECISION_TIMEOUT, VALIDATE_PATH, WEBHOOK_CERT_PATH, WEBHOOK_KEY_PATH, WEBHOOK_PORT,
    WebhookError, WebhookState, create_webhook_router, run_webhook_server,
};

// Re-export kube-rs admission types for contract testing
pub use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, Operation};
