// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::Result;
use axum::{http::StatusCode, routing::get, Router};
use clap::Parser;
use hub_operator::{
    config::OperatorConfig,
    constants::{METRICS_SERVER_PATH, TOKIO_WORKER_THREADS},
    context::Context,
    controller::run_hub_controller,
    metrics::gather_metrics,
};
use kube::Client;
use std::sync::Arc;
use tracing::{debug, error, info};

fn main() -> Result<()> {
    let config = OperatorConfig::parse();

    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(TOKIO_WORKER_THREADS)
        .thread_name("hub-operator")
        .enable_all()
        .build()?;

    runtime.block_on(async_main(config))
}

async fn async_main(config: OperatorConfig) -> Result<()> {
    // Respects RUST_LOG (defaults to info) and RUST_LOG_FORMAT (json or text)
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }

    info!(
        version = %config.operator_version,
        "Starting MultiClusterHub operator"
    );
    debug!(config = ?config, "Operator configuration loaded");

    debug!("Initializing Kubernetes client");
    let client = Client::try_default().await?;
    debug!("Kubernetes client initialized successfully");

    let metrics_address = config.metrics_bind_address.clone();
    let context = Arc::new(Context::from_client(client.clone(), config));

    // Neither task should ever exit
    tokio::select! {
        result = run_hub_controller(client, context) => {
            error!("CRITICAL: MultiClusterHub controller exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("MultiClusterHub controller exited unexpectedly without error")
        }
        result = run_metrics_server(&metrics_address) => {
            error!("CRITICAL: metrics server exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("metrics server exited unexpectedly without error")
        }
    }
}

/// Serve the Prometheus registry on [`METRICS_SERVER_PATH`].
async fn run_metrics_server(address: &str) -> Result<()> {
    let app = Router::new().route(METRICS_SERVER_PATH, get(metrics_handler));
    let listener = tokio::net::TcpListener::bind(address).await?;
    info!("Serving metrics on {}{}", address, METRICS_SERVER_PATH);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn metrics_handler() -> Result<String, (StatusCode, String)> {
    gather_metrics().map_err(|e| {
        error!("Failed to gather metrics: {}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })
}
