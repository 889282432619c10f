//! Upstream forwarding.
//!
//! # Responsibilities
//! - Build the upstream URI from base URL, path and query
//! - Forward method, headers and the streamed body
//! - Stream the upstream response back unmodified (minus hop-by-hop headers)
//! - Turn failures into 502/504 responses
//!
//! # Design Decisions
//! - One pooled client shared by all requests
//! - The deadline covers the wait for response headers; the body streams
//!   for as long as the client keeps reading
//! - Dropping the handler future (client went away) drops the upstream call

use std::net::IpAddr;
use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, Uri, Version},
    response::Response,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::{TokioExecutor, TokioTimer},
};
use url::Url;

use crate::config::UpstreamConfig;
use crate::http::response::error_response;
use crate::observability::metrics;
use crate::resilience::{with_deadline, UpstreamError};
use crate::routing::matcher::PathPrefixMatcher;
use crate::security::headers::{prepare_upstream_headers, strip_hop_by_hop};

/// Reverse proxy to the single upstream API service.
#[derive(Clone)]
pub struct ReverseProxy {
    client: Client<HttpConnector, Body>,
    base: Url,
    authority: String,
    prefix: PathPrefixMatcher,
    strip_prefix: bool,
    timeout: Duration,
}

impl std::fmt::Debug for ReverseProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReverseProxy")
            .field("base", &self.base.as_str())
            .field("strip_prefix", &self.strip_prefix)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ReverseProxy {
    /// Create a proxy from validated upstream settings.
    pub fn new(config: &UpstreamConfig) -> Result<Self, UpstreamError> {
        let base = Url::parse(&config.base_url)
            .map_err(|e| UpstreamError::InvalidRequest(format!("{}: {e}", config.base_url)))?;
        let host = base
            .host_str()
            .ok_or_else(|| UpstreamError::InvalidRequest(format!("{}: missing host", base)))?;
        let authority = match base.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };

        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_secs(config.connect_timeout_secs)));
        connector.set_nodelay(true);

        let client = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(Duration::from_secs(config.pool_idle_secs))
            .pool_timer(TokioTimer::new())
            .build(connector);

        Ok(Self {
            client,
            base,
            authority,
            prefix: PathPrefixMatcher::new(config.api_prefix.clone()),
            strip_prefix: config.strip_prefix,
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }

    /// Whether `path` belongs to the upstream API.
    pub fn handles(&self, path: &str) -> bool {
        self.prefix.matches(path)
    }

    /// Map an incoming URI onto the upstream.
    pub fn upstream_uri(&self, incoming: &Uri) -> Result<Uri, UpstreamError> {
        let mut path = incoming.path().to_string();
        if self.strip_prefix {
            path = self.prefix.strip(&path).to_string();
            if !path.starts_with('/') {
                path.insert(0, '/');
            }
        }

        let base_path = self.base.path().trim_end_matches('/');
        let mut target = format!("{}://{}{}{}", self.base.scheme(), self.authority, base_path, path);
        if let Some(query) = incoming.query() {
            target.push('?');
            target.push_str(query);
        }

        target
            .parse::<Uri>()
            .map_err(|e| UpstreamError::InvalidRequest(format!("{target}: {e}")))
    }

    /// Forward `request` and relay the upstream response.
    ///
    /// Always produces a response; failures become 502/504.
    pub async fn forward(&self, request: Request<Body>, client_ip: Option<IpAddr>) -> Response {
        let path = request.uri().path().to_string();
        match self.exchange(request, client_ip).await {
            Ok(response) => response,
            Err(e) => {
                metrics::record_upstream_failure(e.kind());
                tracing::error!(
                    path = %path,
                    upstream = %self.base,
                    error = %e,
                    "Upstream request failed"
                );
                let status = e.status();
                let message = match e {
                    UpstreamError::Timeout(_) => "Upstream request timed out",
                    UpstreamError::InvalidRequest(_) => "Request cannot be forwarded",
                    _ => "Upstream request failed",
                };
                error_response(status, message)
            }
        }
    }

    async fn exchange(
        &self,
        request: Request<Body>,
        client_ip: Option<IpAddr>,
    ) -> Result<Response, UpstreamError> {
        let (mut parts, body) = request.into_parts();

        parts.uri = self.upstream_uri(&parts.uri)?;
        parts.version = Version::HTTP_11;
        prepare_upstream_headers(&mut parts.headers, &self.authority, client_ip);

        tracing::debug!(method = %parts.method, uri = %parts.uri, "Forwarding to upstream");

        let upstream_request = Request::from_parts(parts, body);
        let response = with_deadline(self.timeout, self.client.request(upstream_request)).await?;

        let (mut parts, body): (_, hyper::body::Incoming) = response.into_parts();
        strip_hop_by_hop(&mut parts.headers);
        Ok(Response::from_parts(parts, Body::new(body)))
    }
}
