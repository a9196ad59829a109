//! # Posture Server
//!
//! Cloud security posture scanner. Collects resource-group inventories,
//! evaluates rules over them, and notifies the people responsible for each
//! finding.

use std::{net::SocketAddr, path::PathBuf};

use anyhow::Context;
use clap::{Args as ClapArgs, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use posture_server::{
    infra::{
        config::{ConfigLoad, ConfigLoader, ConfigWarnings},
        startup::{build_state, spawn_scheduler},
    },
    routes,
};

/// CLI entry point
#[derive(Parser, Debug)]
#[command(name = "posture-server")]
#[command(about = "Cloud security posture scanner with contact notifications")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    serve: ServeArgs,
}

#[derive(ClapArgs, Debug, Clone)]
struct ServeArgs {
    /// Path to a TOML configuration file
    #[arg(long, env = "POSTURE_CONFIG")]
    config: Option<PathBuf>,

    /// Path to a .env file (defaults to ./.env when present)
    #[arg(long, env = "POSTURE_ENV_FILE")]
    env_file: Option<PathBuf>,

    /// Listen address (overrides config)
    #[arg(long)]
    bind: Option<SocketAddr>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP server and the scheduled runner (default)
    Serve(ServeArgs),
    /// Load and validate the configuration, print the result and exit
    CheckConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                // Override via RUST_LOG.
                "info,posture_core=debug,posture_server=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Some(Command::CheckConfig) => check_config(&cli.serve),
        Some(Command::Serve(args)) => run_server(args).await,
        None => run_server(cli.serve).await,
    }
}

fn load_config(args: &ServeArgs) -> anyhow::Result<ConfigLoad> {
    let mut loader = ConfigLoader::new();
    if let Some(path) = &args.config {
        loader = loader.with_config_path(path);
    }
    if let Some(path) = &args.env_file {
        loader = loader.with_env_file(path);
    }
    let mut load = loader.load().context("failed to load configuration")?;
    if let Some(bind) = args.bind {
        load.config.server.bind = bind;
    }
    Ok(load)
}

fn log_warnings(warnings: &ConfigWarnings) {
    for warning in warnings.iter() {
        match &warning.hint {
            Some(hint) => {
                warn!(message = %warning.message, hint = %hint, "configuration warning")
            }
            None => warn!(message = %warning.message, "configuration warning"),
        }
    }
}

fn check_config(args: &ServeArgs) -> anyhow::Result<()> {
    let ConfigLoad { config, warnings } = load_config(args)?;
    log_warnings(&warnings);
    match &config.metadata.config_path {
        Some(path) => info!(path = %path.display(), "configuration file"),
        None => info!("no configuration file"),
    }
    info!(
        bind = %config.server.bind,
        org_suffix = %config.posture.notifications.org_suffix,
        collect_and_scan_interval = %humantime::format_duration(
            config.posture.pipeline.collect_and_scan_interval
        ),
        notification_interval = %humantime::format_duration(
            config.posture.notifications.notification_interval
        ),
        run_automated_scans = config.posture.pipeline.run_automated_scans,
        "configuration is valid"
    );
    Ok(())
}

async fn run_server(args: ServeArgs) -> anyhow::Result<()> {
    let ConfigLoad { config, warnings } = load_config(&args)?;
    if config.metadata.env_file_loaded {
        info!("loaded .env file");
    }
    log_warnings(&warnings);

    let addr = config.server.bind;
    let state = build_state(config)?;
    let orchestrator = state.service.orchestrator().clone();

    let cancel = CancellationToken::new();
    let scheduler = spawn_scheduler(&state, cancel.clone());

    let shutdown = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("shutdown signal received"),
            Err(err) => error!(error = %err, "failed to listen for shutdown signal"),
        }
        shutdown.cancel();
    });

    let router = routes::create_app(state);
    info!("Starting Posture Server (HTTP) on {addr}");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    let server_cancel = cancel.clone();
    axum::serve(listener, router)
        .with_graceful_shutdown(async move { server_cancel.cancelled().await })
        .await?;

    cancel.cancel();
    if let Some(handle) = scheduler
        && let Err(err) = handle.await
    {
        error!(error = %err, "scheduled runner panicked");
    }
    info!("waiting for in-flight pipelines");
    orchestrator.shutdown().await;
    info!("server stopped");
    Ok(())
}
