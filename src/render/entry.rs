//! The render entry interface shared by both loader strategies.

use axum::http::{request::Parts, HeaderMap, Method, StatusCode};

use crate::http::request::request_id;

/// Request data visible to a render entry.
#[derive(Debug, Clone)]
pub struct RenderContext {
    pub method: Method,
    /// Raw (percent-encoded) request path.
    pub path: String,
    /// Raw query string without the leading `?`.
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub request_id: Option<String>,
}

impl RenderContext {
    /// Capture the parts of a request a page may depend on.
    pub fn from_parts(parts: &Parts) -> Self {
        Self {
            method: parts.method.clone(),
            path: parts.uri.path().to_string(),
            query: parts.uri.query().map(str::to_string),
            headers: parts.headers.clone(),
            request_id: request_id(&parts.headers).map(str::to_string),
        }
    }

    /// First value of query parameter `key`, decoded.
    pub fn query_param(&self, key: &str) -> Option<String> {
        let query = self.query.as_deref()?;
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }
}

/// What a render entry produced.
#[derive(Debug, Clone)]
pub struct RenderOutput {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub html: String,
}

/// Failure while rendering a page.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("template '{template}' references unknown variable '{name}'")]
    UnknownVariable { template: String, name: String },
    #[error("route '{route}' declares invalid status {status}")]
    InvalidStatus { route: String, status: u16 },
    #[error("route '{route}' declares invalid redirect target '{target}'")]
    InvalidRedirect { route: String, target: String },
}

/// A resolved server-side rendering entry point.
pub trait RenderEntry: Send + Sync {
    fn render(&self, ctx: &RenderContext) -> Result<RenderOutput, RenderError>;
}
