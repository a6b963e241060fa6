//! fpm-matcher - Fingerprint Matching Service
//!
//! Startup sequence:
//! 1. Parse CLI/ENV arguments, load the TOML config (missing file = defaults)
//! 2. Initialize tracing, log build identification
//! 3. Open the artifact root, resolve the NBIS toolkit once
//! 4. Serve HTTP until Ctrl+C / SIGTERM

use anyhow::{Context, Result};
use clap::Parser;
use fpm_common::config::{load_toml_config, locate_config_file, write_toml_config};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fpm_matcher::config::{Args, ServiceConfig};
use fpm_matcher::{build_identity, build_router, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = locate_config_file(args.config.as_deref());
    let file_config = load_toml_config(config_path.as_deref())
        .context("Failed to load configuration")?;
    let config = ServiceConfig::resolve(&args, file_config);

    if let Some(path) = &args.write_default_config {
        write_toml_config(&config.to_toml(), path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("Wrote configuration to {}", path.display());
        return Ok(());
    }

    // RUST_LOG wins over the configured level
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting fpm-matcher {}", build_identity());
    match &config_path {
        Some(path) => info!("Config file: {}", path.display()),
        None => info!("Config file: none (compiled defaults)"),
    }
    info!("Artifact root: {}", config.artifact_root.display());

    let state = AppState::from_config(&config).with_context(|| {
        format!(
            "Artifact root {} is not writable",
            config.artifact_root.display()
        )
    })?;
    if state.toolkit.available() {
        info!("✓ NBIS toolkit ready");
    } else {
        warn!("NBIS toolkit unavailable - /extract, /compare and /batch-compare will answer 503");
    }
    info!("Batch failure policy: {:?}", config.batch_policy);

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_address())
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_address()))?;
    info!("Listening on http://{}", config.bind_address());
    info!("Health check: http://{}/health", config.bind_address());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
