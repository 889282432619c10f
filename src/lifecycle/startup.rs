//! Startup orchestration.
//!
//! # Responsibilities
//! - Build every subsystem from validated configuration
//! - Load the production bundle before any socket is bound
//! - Bind the listener last (traffic only when ready)
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal and nothing is left listening
//! - Subsystems initialize in order, not concurrently

use tokio::net::TcpListener;

use crate::config::BffConfig;
use crate::http::HttpServer;
use crate::render::loader::{self, LoadError};
use crate::resilience::UpstreamError;
use crate::routing::FrontController;

/// Fatal startup failure.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("failed to load server modules: {0}")]
    Modules(#[from] LoadError),
    #[error("invalid upstream: {0}")]
    Upstream(#[from] UpstreamError),
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },
}

/// Build the server without binding.
pub fn prepare(config: BffConfig) -> Result<HttpServer, StartupError> {
    let loader = loader::from_config(&config.render, config.mode)?;
    let controller = FrontController::new(&config, loader)?;

    tracing::info!(
        mode = %config.mode,
        upstream = %config.upstream.base_url,
        api_prefix = %config.upstream.api_prefix,
        "Subsystems initialized"
    );
    Ok(HttpServer::new(config, controller))
}

/// Bind the configured listener address.
pub async fn bind(config: &BffConfig) -> Result<TcpListener, StartupError> {
    let address = config.listener.bind_address();
    TcpListener::bind(&address)
        .await
        .map_err(|source| StartupError::Bind { address, source })
}
