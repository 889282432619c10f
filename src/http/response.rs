//! Locally generated responses.
//!
//! Upstream and asset responses stream through untouched; these helpers
//! cover the error pages the front controller produces itself.

use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::Response,
};

use crate::render::template::escape;

/// Plain-text error response.
pub fn error_response(status: StatusCode, message: &str) -> Response {
    let mut response = Response::new(Body::from(message.to_string()));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

/// HTML response with the given status.
pub fn html_response(status: StatusCode, html: String) -> Response {
    let mut response = Response::new(Body::from(html));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/html; charset=utf-8"),
    );
    response
}

/// Development error page showing `detail`.
pub fn diagnostic_page(status: StatusCode, detail: &str) -> Response {
    let html = format!(
        "<!DOCTYPE html><html><head><title>{status}</title></head>\
         <body><h1>{status}</h1><pre>{}</pre></body></html>",
        escape(detail)
    );
    html_response(status, html)
}
