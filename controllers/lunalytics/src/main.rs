//! Lunalytics Controller
//!
//! Keeps Lunalytics uptime monitors in sync with the cluster:
//! - Ingress and Service resources annotated with `lunalytics.io/enabled: "true"`
//! - Monitor custom resources (`lunalytics.io/v1alpha1`)
//!
//! Monitors are created, updated and deleted as those resources change, and
//! each resource is bound to its monitor through an annotation or its status.

mod annotations;
mod arbiter;
mod binding;
mod cluster;
mod config;
mod controller;
mod desired;
mod dispatch;
mod error;
mod metrics;
mod namespace_filter;
mod reconcile_helpers;
mod reconciler;
mod resource;
mod server;
mod url_builder;
mod watcher;

#[cfg(test)]
mod test_utils;

use crate::config::OperatorConfig;
use crate::error::ControllerError;
use controller::Controller;
use server::{start_server, ServerState};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for SIGINT: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = interrupt => {}
        () = terminate => {}
    }
    info!("Received shutdown signal");
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), ControllerError> {
    // Must run before any TLS client is built.
    let provider_installed = rustls::crypto::ring::default_provider()
        .install_default()
        .is_ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    if !provider_installed {
        warn!("A rustls crypto provider was already installed");
    }

    info!("Starting Lunalytics Controller");

    let config = OperatorConfig::load()?;
    info!("Configuration:");
    info!("  Lunalytics URL: {}", config.api_url);
    info!("  Namespace: {}", config.watch_namespace.as_deref().unwrap_or("all namespaces"));
    info!("  Duplicate handling: {:?}", config.policy.duplicate_handling);
    info!("  Namespace filter: {:?}", config.policy.namespace_filter);
    info!(
        "  Retry: {} attempts, backoff factor {}, max delay {:?}",
        config.retry.max_attempts, config.retry.backoff_factor, config.retry.max_delay
    );

    metrics::register_metrics().map_err(|e| ControllerError::Server(e.to_string()))?;

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        shutdown.cancel();
    });

    let server_state = Arc::new(ServerState::default());
    let server = {
        let state = server_state.clone();
        let cancel = cancel.clone();
        let port = config.metrics_port;
        tokio::spawn(async move {
            if let Err(e) = start_server(port, state, cancel).await {
                error!("HTTP server error: {}", e);
            }
        })
    };

    let controller = Controller::new(config, server_state, cancel.clone()).await?;
    let result = controller.run().await;

    cancel.cancel();
    if let Err(e) = server.await {
        warn!("HTTP server task failed: {}", e);
    }

    info!("Lunalytics Controller stopped");
    result
}
