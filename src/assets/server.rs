//! Static file responses.

use std::path::PathBuf;

use axum::{
    body::Body,
    http::{header, HeaderValue, Request, StatusCode},
    response::Response,
};
use tower::ServiceExt;
use tower_http::services::ServeFile;

use crate::assets::resolve::{resolve, AssetLookup, ResolvedFile};
use crate::config::AssetConfig;
use crate::http::response::error_response;
use crate::observability::metrics;

/// Serves the client build directory.
#[derive(Debug, Clone)]
pub struct StaticAssetServer {
    /// Canonical asset root; `None` when the directory does not exist.
    root: Option<PathBuf>,
    immutable_prefix: String,
    immutable_cache: HeaderValue,
    default_cache: HeaderValue,
}

impl StaticAssetServer {
    /// Create a server for `config.root`.
    ///
    /// A missing root is not fatal: every lookup then reports `NotFound`
    /// and pages are rendered instead.
    pub fn new(config: &AssetConfig) -> Self {
        let root = match config.root.canonicalize() {
            Ok(root) => Some(root),
            Err(e) => {
                tracing::warn!(
                    root = %config.root.display(),
                    error = %e,
                    "Asset root unavailable; static assets disabled"
                );
                None
            }
        };

        Self {
            root,
            immutable_prefix: config.immutable_prefix.clone(),
            immutable_cache: cache_header(config.immutable_max_age_secs, true),
            default_cache: cache_header(config.max_age_secs, false),
        }
    }

    /// Look up a request path. `NotFound` is a routing signal, not an error.
    pub async fn lookup(&self, url_path: &str) -> AssetLookup {
        let Some(root) = &self.root else {
            return AssetLookup::NotFound;
        };

        let lookup = resolve(url_path, root).await;
        if lookup == AssetLookup::Forbidden {
            metrics::record_asset_rejection();
            tracing::warn!(
                security = true,
                path = %url_path,
                "Rejected static asset path escaping the asset root"
            );
        }
        lookup
    }

    /// Stream `file` with content type, validators and caching headers.
    pub async fn serve(&self, file: &ResolvedFile, request: Request<Body>) -> Response {
        let mut response = match ServeFile::new(&file.path).oneshot(request).await {
            Ok(response) => response.map(Body::new),
            Err(never) => match never {},
        };

        let status = response.status();
        if status.is_success() || status == StatusCode::NOT_MODIFIED {
            let cache = if file.url_path.starts_with(&self.immutable_prefix) {
                self.immutable_cache.clone()
            } else {
                self.default_cache.clone()
            };
            response.headers_mut().insert(header::CACHE_CONTROL, cache);
        }
        response
    }

    /// Response for a rejected traversal attempt.
    pub fn forbidden(&self) -> Response {
        error_response(StatusCode::FORBIDDEN, "Forbidden")
    }
}

fn cache_header(max_age_secs: u64, immutable: bool) -> HeaderValue {
    let value = if immutable {
        format!("public, max-age={max_age_secs}, immutable")
    } else {
        format!("public, max-age={max_age_secs}")
    };
    HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static("no-cache"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> (tempfile::TempDir, StaticAssetServer) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("assets")).unwrap();
        std::fs::write(dir.path().join("assets/entry-4f2a.js"), b"export {}").unwrap();
        std::fs::write(dir.path().join("favicon.ico"), [0u8, 1, 2, 3]).unwrap();
        std::fs::write(dir.path().join("styles.css"), "body{}").unwrap();

        let config = AssetConfig {
            root: dir.path().to_path_buf(),
            ..AssetConfig::default()
        };
        let server = StaticAssetServer::new(&config);
        (dir, server)
    }

    async fn fetch(server: &StaticAssetServer, path: &str) -> Response {
        let file = match server.lookup(path).await {
            AssetLookup::Found(file) => file,
            other => panic!("expected {path} to exist, got {other:?}"),
        };
        let request = Request::get(path).body(Body::empty()).unwrap();
        server.serve(&file, request).await
    }

    #[tokio::test]
    async fn serves_with_content_type_and_immutable_cache() {
        let (_dir, server) = fixture();
        let response = fetch(&server, "/assets/entry-4f2a.js").await;

        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap();
        assert!(content_type.contains("javascript"), "{content_type}");
        assert_eq!(
            response.headers()[header::CACHE_CONTROL],
            "public, max-age=31536000, immutable"
        );
        assert!(response.headers().contains_key(header::LAST_MODIFIED));
    }

    #[tokio::test]
    async fn other_files_get_short_cache() {
        let (_dir, server) = fixture();
        let response = fetch(&server, "/styles.css").await;

        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/css");
        assert_eq!(response.headers()[header::CACHE_CONTROL], "public, max-age=3600");
    }

    #[tokio::test]
    async fn body_is_byte_exact() {
        let (_dir, server) = fixture();
        let response = fetch(&server, "/favicon.ico").await;
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], &[0u8, 1, 2, 3]);
    }

    #[tokio::test]
    async fn missing_root_disables_lookup() {
        let config = AssetConfig {
            root: PathBuf::from("/nonexistent/build/client"),
            ..AssetConfig::default()
        };
        let server = StaticAssetServer::new(&config);
        assert_eq!(server.lookup("/favicon.ico").await, AssetLookup::NotFound);
    }

    #[tokio::test]
    async fn traversal_is_forbidden() {
        let (_dir, server) = fixture();
        assert_eq!(server.lookup("/../../etc/passwd").await, AssetLookup::Forbidden);
        assert_eq!(server.forbidden().status(), StatusCode::FORBIDDEN);
    }
}
