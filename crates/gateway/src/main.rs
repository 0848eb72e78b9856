//! Shellgate Gateway
//!
//! Bridges browser terminals to remote shells over SSH.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use gateway::api::{self, AppState};
use gateway::config::Config;
use gateway::relay::ShellConnector;
use gateway::session::SessionRegistry;
use gateway::ssh::SshConnector;

/// Shellgate - expose remote SSH shells to browser clients.
#[derive(Parser, Debug)]
#[command(name = "shellgate")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for the gateway.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run the gateway server
    Serve {
        /// Listen address, overriding the configuration file
        #[arg(long, value_name = "ADDR")]
        listen: Option<String>,
    },

    /// Validate the configuration and print the effective values
    CheckConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = if let Some(config_path) = &cli.config {
        Config::load(config_path)?
    } else {
        Config::load_default()?
    };

    // Apply environment variable overrides, then CLI overrides on top
    config.apply_env_overrides();
    if let Commands::Serve {
        listen: Some(listen),
    } = &cli.command
    {
        config.server.listen = listen.clone();
    }

    // Initialize tracing
    let filter = if cli.verbose {
        "debug".to_string()
    } else {
        config.server.log_level.clone()
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Validate configuration
    config.validate()?;

    match cli.command {
        Commands::Serve { .. } => serve(config).await,
        Commands::CheckConfig => {
            println!("{}", config.to_toml()?);
            Ok(())
        }
    }
}

/// Runs the HTTP server until a shutdown signal arrives.
async fn serve(config: Config) -> anyhow::Result<()> {
    tracing::info!("Shellgate gateway starting...");

    let config = Arc::new(config);
    let registry = Arc::new(SessionRegistry::new());
    let connector: Arc<dyn ShellConnector> = Arc::new(SshConnector::new(&config.ssh));

    let state = AppState {
        registry,
        connector,
        config: Arc::clone(&config),
    };
    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind(&config.server.listen)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.listen))?;
    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("shutdown complete");
    Ok(())
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).expect("Failed to register SIGTERM handler");
    let mut sigint = signal(SignalKind::interrupt()).expect("Failed to register SIGINT handler");

    tokio::select! {
        _ = sigterm.recv() => {
            tracing::info!("Received SIGTERM");
        }
        _ = sigint.recv() => {
            tracing::info!("Received SIGINT");
        }
    }
}
