//! Rider BFF
//!
//! Backend-for-frontend server built with Tokio and Axum.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────────┐
//!                        │                 RIDER BFF                    │
//!                        │                                              │
//!   Client Request       │  ┌─────────┐    ┌──────────────────┐         │
//!   ─────────────────────┼─▶│  http   │───▶│ FrontController  │         │
//!                        │  │ server  │    │    (routing)     │         │
//!                        │  └─────────┘    └───┬─────┬─────┬──┘         │
//!                        │                     │     │     │            │
//!                        │          /api/*     │     │     │ otherwise  │
//!                        │      ┌──────────────┘     │     └──────┐     │
//!                        │      ▼                    ▼            ▼     │
//!                        │ ┌─────────┐       ┌────────────┐ ┌─────────┐ │
//!                        │ │  proxy  │       │   assets   │ │ render  │ │
//!                        │ │ forward │       │ (prod only)│ │ loader  │ │
//!                        │ └────┬────┘       └────────────┘ └─────────┘ │
//!                        └──────┼───────────────────────────────────────┘
//!                               ▼
//!                         Upstream API
//! ```
//!
//! # Commands
//! - `rider-bff [serve]`: run the server (default)
//! - `rider-bff build`: compile `app/` into the production bundle

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use rider_bff::config::{loader, BffConfig, Mode};
use rider_bff::lifecycle::{self, signals, Shutdown};
use rider_bff::observability::{logging, metrics};
use rider_bff::render::build_bundle;

#[derive(Debug, Parser)]
#[command(name = "rider-bff", version, about = "Backend-for-frontend server")]
struct Cli {
    /// TOML configuration file.
    #[arg(long, env = "BFF_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Runtime mode (overrides APP_ENV / NODE_ENV).
    #[arg(long, global = true)]
    mode: Option<Mode>,

    /// Listen port (overrides PORT).
    #[arg(long, global = true)]
    port: Option<u16>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the server.
    Serve,
    /// Compile the page sources into the production bundle.
    Build {
        /// Source directory (default: render.source_dir).
        #[arg(long)]
        source: Option<PathBuf>,
        /// Bundle output path (default: render.bundle_path).
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

fn load(cli: &Cli) -> Result<BffConfig, loader::ConfigError> {
    let mut config = loader::load_config(cli.config.as_deref(), |key| std::env::var(key).ok())?;
    if let Some(mode) = cli.mode {
        config.mode = mode;
    }
    if let Some(port) = cli.port {
        config.listener.port = port;
    }
    loader::finish(config)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("rider-bff: configuration error: {e}");
            return ExitCode::FAILURE;
        }
    };
    logging::init(&config.observability);

    match cli.command {
        Some(Command::Build { source, out }) => {
            let source = source.unwrap_or_else(|| config.render.source_dir.clone());
            let out = out.unwrap_or_else(|| config.render.bundle_path.clone());
            build(source, out)
        }
        Some(Command::Serve) | None => serve(config).await,
    }
}

fn build(source: PathBuf, out: PathBuf) -> ExitCode {
    match build_bundle(&source, &out) {
        Ok(bundle) => {
            tracing::info!(
                source = %source.display(),
                out = %out.display(),
                routes = bundle.routes.len(),
                "Server bundle written"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(source = %source.display(), error = %e, "Build failed");
            ExitCode::FAILURE
        }
    }
}

async fn serve(config: BffConfig) -> ExitCode {
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        mode = %config.mode,
        port = config.listener.port,
        upstream = %config.upstream.base_url,
        "rider-bff starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    // Everything that can fail is prepared before the port is bound.
    let server = match lifecycle::prepare(config.clone()) {
        Ok(server) => server,
        Err(e) => {
            tracing::error!(error = %e, "Startup failed");
            return ExitCode::FAILURE;
        }
    };
    let listener = match lifecycle::bind(&config).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, "Startup failed");
            return ExitCode::FAILURE;
        }
    };

    let shutdown = Shutdown::new();
    signals::spawn_signal_listener(shutdown.clone());

    match server.run(listener, shutdown).await {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Server error");
            ExitCode::FAILURE
        }
    }
}
