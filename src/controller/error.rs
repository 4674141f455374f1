//! Error types for the configuration controller.
//!
//! Defines custom error types with classification for retry behavior.

use std::time::Duration;
use thiserror::Error;

use crate::config::ConfigError;

/// Error type for controller operations
#[derive(Error, Debug)]
pub enum Error {
    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    /// The watched ConfigMap does not carry the configuration key
    #[error("ConfigMap {configmap} is missing required key: {key}")]
    MissingKey { configmap: String, key: String },

    /// The configuration document was rejected
    #[error("ConfigMap is not well formatted: {0}")]
    Config(#[from] ConfigError),
}

impl Error {
    /// Check if this error indicates a not-found condition
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Kube(kube::Error::Api(e)) if e.code == 404)
    }

    /// Check if the error comes from the configuration document itself.
    ///
    /// Such errors only go away when the ConfigMap changes.
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, Error::MissingKey { .. } | Error::Config(_))
    }

    /// Check if this error should be retried
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Kube(e) => {
                // Retry on network errors, rate limiting, and server errors
                matches!(
                    e,
                    kube::Error::Api(api_err) if api_err.code >= 500 || api_err.code == 429
                ) || matches!(e, kube::Error::Service(_))
            }
            Error::MissingKey { .. } | Error::Config(_) => false,
        }
    }

    /// Get the recommended requeue duration for this error
    pub fn requeue_after(&self) -> Duration {
        if self.is_retryable() {
            Duration::from_secs(30)
        } else {
            Duration::from_secs(300)
        }
    }
}

/// Result type alias for controller operations
pub type Result<T> = std::result::Result<T, Error>;
