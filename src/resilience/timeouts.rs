//! Timeout enforcement for upstream calls.
//!
//! # Responsibilities
//! - Wrap upstream calls with a deadline
//! - Classify failures as gateway timeout vs. bad gateway
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities; the inner future is dropped on expiry
//! - Timeout errors are distinct from other errors
//! - Timed-out requests return 504 Gateway Timeout, everything else 502

use std::future::Future;
use std::time::Duration;

use axum::http::StatusCode;

/// Why an upstream exchange failed.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("upstream did not respond within {0:?}")]
    Timeout(Duration),
    #[error("could not connect to upstream: {0}")]
    Connect(String),
    #[error("upstream exchange failed: {0}")]
    Protocol(String),
    #[error("could not build upstream request: {0}")]
    InvalidRequest(String),
}

impl UpstreamError {
    /// Status returned to the client for this failure.
    pub fn status(&self) -> StatusCode {
        match self {
            UpstreamError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            UpstreamError::Connect(_) | UpstreamError::Protocol(_) => StatusCode::BAD_GATEWAY,
            UpstreamError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            UpstreamError::Timeout(_) => "timeout",
            UpstreamError::Connect(_) => "connect",
            UpstreamError::Protocol(_) => "protocol",
            UpstreamError::InvalidRequest(_) => "invalid_request",
        }
    }
}

impl From<hyper_util::client::legacy::Error> for UpstreamError {
    fn from(e: hyper_util::client::legacy::Error) -> Self {
        if e.is_connect() {
            UpstreamError::Connect(e.to_string())
        } else {
            UpstreamError::Protocol(e.to_string())
        }
    }
}

/// Run `fut` under `deadline`, mapping expiry to [`UpstreamError::Timeout`].
pub async fn with_deadline<F, T, E>(deadline: Duration, fut: F) -> Result<T, UpstreamError>
where
    F: Future<Output = Result<T, E>>,
    E: Into<UpstreamError>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result.map_err(Into::into),
        Err(_) => Err(UpstreamError::Timeout(deadline)),
    }
}
