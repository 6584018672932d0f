//! Costlens Server - Main entry point.

mod config;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use costlens_api::AppState;
use costlens_auth::{EntraIdBackend, KeySet};
use costlens_azure::{ArmCredential, AzureClient};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    tracing::info!("Starting Costlens server...");
    tracing::info!("Bind address: {}", cli.bind);

    let http = reqwest::Client::new();

    let entra_id = cli.entra_id();
    let jwks_url = entra_id.jwks_url();
    let keys = KeySet::fetch(&http, &jwks_url)
        .await
        .with_context(|| format!("failed to load signing keys from {}", jwks_url))?;
    tracing::info!(keys_count = keys.len(), issuer = %entra_id.issuer(), "Signing keys loaded");

    let auth = Arc::new(EntraIdBackend::new(&entra_id, keys));
    if let Some(interval) = cli.jwks_refresh() {
        tracing::info!(interval_secs = interval.as_secs(), "Signing key refresh enabled");
        Arc::clone(&auth).spawn_key_refresh(http.clone(), jwks_url, interval);
    }

    let credential = Arc::new(
        ArmCredential::from_env().context("failed to configure Azure credentials")?,
    );
    let azure = Arc::new(AzureClient::with_client(cli.azure(), credential, http));

    let cors = costlens_api::cors_layer(&cli.frontend_url)
        .with_context(|| format!("invalid frontend URL: {}", cli.frontend_url))?;
    let app = costlens_api::router(AppState::new(auth, azure)).layer(cors);

    let listener = tokio::net::TcpListener::bind(&cli.bind)
        .await
        .with_context(|| format!("failed to bind {}", cli.bind))?;

    tracing::info!("Costlens server started successfully");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutting down...");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}
