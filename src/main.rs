//! generic-validator - A Kubernetes validating admission webhook driven by
//! per-kind field rules.
//!
//! This is the main entry point that:
//! - Initializes structured logging
//! - Creates the Kubernetes client
//! - Loads the initial rule configuration (fatal if absent or invalid)
//! - Starts the configuration controller, health server, and optionally the
//!   webhook server
//!
//! Every replica serves admission requests from its own rule store, so no
//! leader election is needed.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use kube::Client;
use tokio::signal;
use tracing::{error, info};

use generic_validator::cli::Args;
use generic_validator::controller::configuration::ensure_initial_configuration;
use generic_validator::controller::context::Context;
use generic_validator::health::{HealthState, run_health_server};
use generic_validator::{
    AdmissionPolicy, RuleStore, WebhookState, run_config_controller, run_webhook_server,
};

/// Grace period for in-flight admission requests to complete during shutdown
const SHUTDOWN_GRACE_PERIOD_SECS: u64 = 5;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("generic_validator=info".parse()?)
                .add_directive("kube=info".parse()?),
        )
        .json()
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "Starting generic-validator");

    // Create Kubernetes client
    let client = Client::try_default().await?;
    info!("Connected to Kubernetes cluster");

    // Create shared state
    let health_state = Arc::new(HealthState::new());
    let store = Arc::new(RuleStore::new());

    // Start health server immediately so liveness probes work during startup
    let health_handle = {
        let health_state = health_state.clone();
        let port = args.health_port;
        tokio::spawn(async move {
            if let Err(e) = run_health_server(health_state, port).await {
                error!("Health server error: {}", e);
            }
        })
    };

    // Without a valid configuration every decision would be taken against an
    // empty rule set, so refuse to start.
    if let Err(e) =
        ensure_initial_configuration(client.clone(), &args.config_map, &args.config_key, &store)
            .await
    {
        error!(configmap = %args.config_map, error = %e, "Initial rule configuration could not be loaded");
        return Err(e.into());
    }
    health_state.set_ready(true).await;

    // Start configuration controller
    let controller_handle = {
        let ctx = Arc::new(Context::new(
            client.clone(),
            store.clone(),
            args.config_key.clone(),
            args.registration(),
            Some(health_state.clone()),
        ));
        let configmap = args.config_map.clone();
        tokio::spawn(run_config_controller(client.clone(), configmap, ctx))
    };

    // Optionally start webhook server if certificates are available
    let webhook_handle = if args.enable_validating_webhook
        && args.tls_cert.exists()
        && args.tls_key.exists()
    {
        info!("TLS certificates found, starting webhook server");
        let state = Arc::new(
            WebhookState::new(AdmissionPolicy::new(store.clone()), Some(health_state.clone()))
                .with_decision_timeout(args.decision_timeout()),
        );
        let cert = args.tls_cert.to_string_lossy().into_owned();
        let key = args.tls_key.to_string_lossy().into_owned();
        let port = args.webhook_port;
        Some(tokio::spawn(async move {
            if let Err(e) = run_webhook_server(state, &cert, &key, port).await {
                error!("Webhook server error: {}", e);
            }
        }))
    } else {
        info!("Webhook disabled or certificates not found, webhook server disabled");
        None
    };

    // Wait for any task to complete (or fail), or shutdown signal
    tokio::select! {
        result = controller_handle => {
            if let Err(e) = result {
                error!("Controller task panicked: {}", e);
            }
        }
        result = health_handle => {
            if let Err(e) = result {
                error!("Health server task panicked: {}", e);
            }
        }
        result = async {
            match webhook_handle {
                Some(handle) => handle.await,
                None => std::future::pending().await,
            }
        } => {
            if let Err(e) = result {
                error!("Webhook server task panicked: {}", e);
            }
        }
        // Handle graceful shutdown on SIGTERM or SIGINT
        _ = shutdown_signal() => {
            info!("Received shutdown signal, initiating graceful shutdown...");

            // Mark as not ready so the Service stops routing admission requests
            health_state.set_ready(false).await;
            info!("Marked validator as not ready");

            info!(
                "Waiting {}s for in-flight admission requests to complete...",
                SHUTDOWN_GRACE_PERIOD_SECS
            );
            tokio::time::sleep(Duration::from_secs(SHUTDOWN_GRACE_PERIOD_SECS)).await;

            info!("Grace period complete, shutting down");
        }
    }

    info!("Validator stopped");
    Ok(())
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
///
/// Note: Signal handler setup failures are fatal - the validator cannot shut down
/// gracefully without them. Using expect() here is intentional.
#[allow(clippy::expect_used)]
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
