//! Health server for Kubernetes probes and Prometheus metrics.
//!
//! Provides:
//! - `/healthz` - Liveness probe (always returns 200 if server is running)
//! - `/readyz` - Readiness probe (returns 200 once the initial configuration is loaded)
//! - `/metrics` - Prometheus metrics endpoint

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use prometheus_client::encoding::text::encode;
use prometheus_client::encoding::{EncodeLabel, EncodeLabelSet, LabelSetEncoder};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::{Histogram, exponential_buckets};
use prometheus_client::registry::Registry;
use tokio::sync::RwLock;
use tracing::info;

/// Default health server port
pub const HEALTH_PORT: u16 = 8080;

/// Labels for admission decision metrics (kind + reason)
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct DecisionLabels {
    pub kind: String,
    pub reason: String,
}

impl EncodeLabelSet for DecisionLabels {
    fn encode(&self, mut encoder: LabelSetEncoder<'_>) -> Result<(), std::fmt::Error> {
        ("kind", self.kind.as_str()).encode(encoder.encode_label())?;
        ("reason", self.reason.as_str()).encode(encoder.encode_label())?;
        Ok(())
    }
}

/// Labels for per-kind metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct KindLabels {
    pub kind: String,
}

impl EncodeLabelSet for KindLabels {
    fn encode(&self, mut encoder: LabelSetEncoder<'_>) -> Result<(), std::fmt::Error> {
        ("kind", self.kind.as_str()).encode(encoder.encode_label())?;
        Ok(())
    }
}

/// Labels for configuration reload metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct ReloadLabels {
    pub result: String,
}

impl EncodeLabelSet for ReloadLabels {
    fn encode(&self, mut encoder: LabelSetEncoder<'_>) -> Result<(), std::fmt::Error> {
        ("result", self.result.as_str()).encode(encoder.encode_label())?;
        Ok(())
    }
}

/// Shared metrics for the validator
pub struct Metrics {
    /// Admission decisions by kind and reason
    pub admission_decisions_total: Family<DecisionLabels, Counter>,
    /// Time spent deciding, per kind
    pub admission_decision_duration_seconds: Family<KindLabels, Histogram>,
    /// Configuration reloads by result
    pub config_reloads_total: Family<ReloadLabels, Counter>,
    /// Generation of the published configuration
    pub config_generation: Gauge,
    /// Configured rules per kind
    pub configured_rules: Family<KindLabels, Gauge>,
    /// Unix time of the last successful reload
    pub config_last_reload_timestamp_seconds: Gauge,
    /// Prometheus registry
    registry: Registry,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    /// Create a new metrics instance with registered metrics
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let admission_decisions_total = Family::<DecisionLabels, Counter>::default();
        registry.register(
            "genericvalidator_admission_decisions",
            "Total number of admission decisions",
            admission_decisions_total.clone(),
        );

        let admission_decision_duration_seconds =
            Family::<KindLabels, Histogram>::new_with_constructor(|| {
                Histogram::new(exponential_buckets(0.00001, 2.0, 15))
            });
        registry.register(
            "genericvalidator_admission_decision_duration_seconds",
            "Duration of admission decisions in seconds",
            admission_decision_duration_seconds.clone(),
        );

        let config_reloads_total = Family::<ReloadLabels, Counter>::default();
        registry.register(
            "genericvalidator_config_reloads",
            "Total number of configuration reloads",
            config_reloads_total.clone(),
        );

        let config_generation = Gauge::default();
        registry.register(
            "genericvalidator_config_generation",
            "Generation of the published rule configuration",
            config_generation.clone(),
        );

        let configured_rules = Family::<KindLabels, Gauge>::default();
        registry.register(
            "genericvalidator_configured_rules",
            "Number of configured rules for each kind",
            configured_rules.clone(),
        );

        let config_last_reload_timestamp_seconds = Gauge::default();
        registry.register(
            "genericvalidator_config_last_reload_timestamp_seconds",
            "Unix time of the last successful configuration reload",
            config_last_reload_timestamp_seconds.clone(),
        );

        Self {
            admission_decisions_total,
            admission_decision_duration_seconds,
            config_reloads_total,
            config_generation,
            configured_rules,
            config_last_reload_timestamp_seconds,
            registry,
        }
    }

    /// Record an admission decision
    pub fn record_decision(&self, kind: &str, reason: &str, duration_secs: Option<f64>) {
        let labels = DecisionLabels {
            kind: kind.to_string(),
            reason: reason.to_string(),
        };
        self.admission_decisions_total.get_or_create(&labels).inc();
        if let Some(duration) = duration_secs {
            self.admission_decision_duration_seconds
                .get_or_create(&KindLabels {
                    kind: kind.to_string(),
                })
                .observe(duration);
        }
    }

    /// Record a successful configuration reload
    pub fn record_reload(&self, generation: u64, rules_per_kind: &[(String, usize)]) {
        self.config_reloads_total
            .get_or_create(&ReloadLabels {
                result: "success".to_string(),
            })
            .inc();
        self.config_generation
            .set(i64::try_from(generation).unwrap_or(i64::MAX));
        // Kinds dropped from the configuration must not keep their old count.
        self.configured_rules.clear();
        for (kind, count) in rules_per_kind {
            self.configured_rules
                .get_or_create(&KindLabels { kind: kind.clone() })
                .set(i64::try_from(*count).unwrap_or(i64::MAX));
        }
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        self.config_last_reload_timestamp_seconds
            .set(i64::try_from(now).unwrap_or(i64::MAX));
    }

    /// Record a rejected configuration reload
    pub fn record_reload_error(&self) {
        self.config_reloads_total
            .get_or_create(&ReloadLabels {
                result: "failure".to_string(),
            })
            .inc();
    }

    /// Encode metrics to Prometheus text format
    pub fn encode(&self) -> String {
        let mut buffer = String::new();
        if encode(&mut buffer, &self.registry).is_err() {
            tracing::error!("Failed to encode metrics");
            return "# Error encoding metrics".to_string();
        }
        buffer
    }
}

/// Shared state for the health server
pub struct HealthState {
    /// Whether the validator is ready (initial configuration loaded)
    ready: RwLock<bool>,
    /// Metrics registry
    pub metrics: Metrics,
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthState {
    /// Create a new health state (starts as not ready)
    pub fn new() -> Self {
        Self {
            ready: RwLock::new(false),
            metrics: Metrics::new(),
        }
    }

    /// Mark the validator as ready or not ready
    pub async fn set_ready(&self, ready: bool) {
        *self.ready.write().await = ready;
    }

    /// Check if the validator is ready
    pub async fn is_ready(&self) -> bool {
        *self.ready.read().await
    }
}

/// Liveness probe handler
///
/// Returns 200 OK if the process is alive.
async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// Readiness probe handler
///
/// Returns 200 OK if the validator is ready to serve.
/// Returns 503 Service Unavailable if not ready.
async fn readyz(State(state): State<Arc<HealthState>>) -> Response {
    if state.is_ready().await {
        (StatusCode::OK, "ready").into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not ready").into_response()
    }
}

/// Metrics handler
async fn metrics_handler(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    let body = state.metrics.encode();
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}

/// Create the health server router
pub fn create_router(state: Arc<HealthState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

/// Run the health server
///
/// Binds to 0.0.0.0:`port` and serves health/metrics endpoints.
pub async fn run_health_server(state: Arc<HealthState>, port: u16) -> Result<(), std::io::Error> {
    let app = create_router(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    info!(port, "Starting health server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
