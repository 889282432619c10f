//! Header manipulation for proxied exchanges.
//!
//! # Responsibilities
//! - Strip hop-by-hop headers in both directions
//! - Add X-Forwarded-For, X-Forwarded-Proto, X-Forwarded-Host
//! - Replace Host with the upstream authority
//!
//! # Design Decisions
//! - Headers listed in `Connection` are hop-by-hop as well (RFC 9110 §7.6.1)
//! - An existing X-Forwarded-For chain is extended, not replaced

use std::net::IpAddr;

use axum::http::{header, HeaderMap, HeaderName, HeaderValue};

/// Headers meaningful only for a single connection leg.
pub const HOP_BY_HOP: [HeaderName; 9] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    HeaderName::from_static("proxy-connection"),
    header::TRANSFER_ENCODING,
    header::UPGRADE,
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
];

pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
pub const X_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");
pub const X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");

/// Remove hop-by-hop headers, including any named by `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let named: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|token| HeaderName::from_bytes(token.trim().as_bytes()).ok())
        .collect();

    for name in named {
        headers.remove(&name);
    }
    for name in &HOP_BY_HOP {
        headers.remove(name);
    }
}

/// Prepare request headers for the upstream leg.
///
/// `upstream_authority` becomes the new `Host`; the original one is kept in
/// `X-Forwarded-Host`.
pub fn prepare_upstream_headers(
    headers: &mut HeaderMap,
    upstream_authority: &str,
    client_ip: Option<IpAddr>,
) {
    strip_hop_by_hop(headers);

    if let Some(original_host) = headers.remove(header::HOST) {
        headers.insert(X_FORWARDED_HOST, original_host);
    }
    if let Ok(host) = HeaderValue::from_str(upstream_authority) {
        headers.insert(header::HOST, host);
    }

    if let Some(ip) = client_ip {
        let chain = match headers.get(&X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
            Some(existing) if !existing.trim().is_empty() => format!("{existing}, {ip}"),
            _ => ip.to_string(),
        };
        if let Ok(value) = HeaderValue::from_str(&chain) {
            headers.insert(X_FORWARDED_FOR, value);
        }
    }

    headers.insert(X_FORWARDED_PROTO, HeaderValue::from_static("http"));
}
