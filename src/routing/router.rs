//! Front controller: one decision per request.
//!
//! # Responsibilities
//! - Classify each request as proxy, static asset or render
//! - Dispatch to the handler for that decision
//!
//! # Design Decisions
//! - Decisions are checked in a fixed order: API prefix, then (production
//!   only) static files, then rendering
//! - Deciding never fails; a missing file is a routing signal, a traversal
//!   attempt is its own decision
//! - Immutable after construction, shared across connections

use std::net::IpAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    response::Response,
};

use crate::assets::{AssetLookup, ResolvedFile, StaticAssetServer};
use crate::config::BffConfig;
use crate::http::response::error_response;
use crate::proxy::ReverseProxy;
use crate::render::{ModuleLoader, SsrRenderer};
use crate::resilience::UpstreamError;
use crate::routing::matcher::is_read_method;

/// Outcome of the static asset check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Asset {
    File(ResolvedFile),
    Forbidden,
}

/// What the front controller does with a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutingDecision {
    Proxy,
    StaticAsset(Asset),
    Render,
}

impl RoutingDecision {
    /// Metric / log label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Proxy => "proxy",
            Self::StaticAsset(Asset::File(_)) => "asset",
            Self::StaticAsset(Asset::Forbidden) => "forbidden",
            Self::Render => "render",
        }
    }
}

/// Routes every request to exactly one handler.
#[derive(Debug, Clone)]
pub struct FrontController {
    proxy: ReverseProxy,
    assets: Option<StaticAssetServer>,
    renderer: SsrRenderer,
}

impl FrontController {
    /// Build the controller. Static assets are only served in production.
    pub fn new(config: &BffConfig, loader: Arc<dyn ModuleLoader>) -> Result<Self, UpstreamError> {
        let proxy = ReverseProxy::new(&config.upstream)?;
        let assets = config
            .mode
            .is_production()
            .then(|| StaticAssetServer::new(&config.assets));

        Ok(Self {
            proxy,
            assets,
            renderer: SsrRenderer::new(loader),
        })
    }

    /// Decide how to handle `method path`.
    pub async fn decide(&self, method: &Method, path: &str) -> RoutingDecision {
        if self.proxy.handles(path) {
            return RoutingDecision::Proxy;
        }

        if let Some(assets) = &self.assets {
            if is_read_method(method) {
                match assets.lookup(path).await {
                    AssetLookup::Found(file) => {
                        return RoutingDecision::StaticAsset(Asset::File(file))
                    }
                    AssetLookup::Forbidden => return RoutingDecision::StaticAsset(Asset::Forbidden),
                    AssetLookup::NotFound => {}
                }
            }
        }

        RoutingDecision::Render
    }

    /// Decide and dispatch.
    pub async fn route(
        &self,
        request: Request<Body>,
        client_ip: Option<IpAddr>,
    ) -> (RoutingDecision, Response) {
        let decision = self.decide(request.method(), request.uri().path()).await;

        let response = match (&decision, &self.assets) {
            (RoutingDecision::Proxy, _) => self.proxy.forward(request, client_ip).await,
            (RoutingDecision::StaticAsset(Asset::File(file)), Some(assets)) => {
                assets.serve(file, request).await
            }
            (RoutingDecision::StaticAsset(Asset::Forbidden), Some(assets)) => assets.forbidden(),
            (RoutingDecision::StaticAsset(_), None) => {
                tracing::error!(decision = decision.label(), "Asset decision without an asset root");
                error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
            }
            (RoutingDecision::Render, _) => self.renderer.render(request).await,
        };
        (decision, response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AssetConfig, Mode};
    use crate::render::entry::{RenderContext, RenderEntry, RenderError, RenderOutput};
    use crate::render::loader::LoadError;
    use async_trait::async_trait;
    use axum::http::HeaderMap;

    struct Page;

    impl RenderEntry for Page {
        fn render(&self, ctx: &RenderContext) -> Result<RenderOutput, RenderError> {
            Ok(RenderOutput {
                status: StatusCode::OK,
                headers: HeaderMap::new(),
                html: format!("page {}", ctx.path),
            })
        }
    }

    struct PageLoader(Mode);

    #[async_trait]
    impl ModuleLoader for PageLoader {
        fn mode(&self) -> Mode {
            self.0
        }

        async fn resolve(&self) -> Result<Arc<dyn RenderEntry>, LoadError> {
            Ok(Arc::new(Page))
        }
    }

    fn controller(mode: Mode) -> (tempfile::TempDir, FrontController) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("assets")).unwrap();
        std::fs::write(dir.path().join("assets/app.js"), "console.log(1)").unwrap();
        std::fs::write(dir.path().join("favicon.ico"), [1u8, 2]).unwrap();

        let config = BffConfig {
            mode,
            assets: AssetConfig {
                root: dir.path().to_path_buf(),
                ..AssetConfig::default()
            },
            ..BffConfig::default()
        };
        let controller = FrontController::new(&config, Arc::new(PageLoader(mode))).unwrap();
        (dir, controller)
    }

    #[tokio::test]
    async fn api_prefix_always_proxies() {
        let (_dir, c) = controller(Mode::Production);
        assert_eq!(c.decide(&Method::GET, "/api/me").await, RoutingDecision::Proxy);
        assert_eq!(c.decide(&Method::POST, "/api").await, RoutingDecision::Proxy);
        assert_eq!(c.decide(&Method::DELETE, "/api/bands/1").await, RoutingDecision::Proxy);
        assert_eq!(c.decide(&Method::GET, "/apiary").await, RoutingDecision::Proxy);
    }

    #[tokio::test]
    async fn production_serves_existing_files() {
        let (_dir, c) = controller(Mode::Production);
        let decision = c.decide(&Method::GET, "/assets/app.js").await;
        assert_eq!(decision.label(), "asset");

        let decision = c.decide(&Method::HEAD, "/favicon.ico").await;
        assert_eq!(decision.label(), "asset");
    }

    #[tokio::test]
    async fn missing_files_and_directories_render() {
        let (_dir, c) = controller(Mode::Production);
        assert_eq!(c.decide(&Method::GET, "/dashboard").await, RoutingDecision::Render);
        assert_eq!(c.decide(&Method::GET, "/assets").await, RoutingDecision::Render);
        assert_eq!(c.decide(&Method::GET, "/").await, RoutingDecision::Render);
    }

    #[tokio::test]
    async fn non_read_methods_skip_assets() {
        let (_dir, c) = controller(Mode::Production);
        assert_eq!(c.decide(&Method::POST, "/favicon.ico").await, RoutingDecision::Render);
    }

    #[tokio::test]
    async fn traversal_is_forbidden() {
        let (_dir, c) = controller(Mode::Production);
        let decision = c.decide(&Method::GET, "/../../etc/passwd").await;
        assert_eq!(decision, RoutingDecision::StaticAsset(Asset::Forbidden));
        assert_eq!(decision.label(), "forbidden");

        let request = Request::get("/%2e%2e/%2e%2e/etc/passwd").body(Body::empty()).unwrap();
        let (decision, response) = c.route(request, None).await;
        assert_eq!(decision, RoutingDecision::StaticAsset(Asset::Forbidden));
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn development_never_serves_files() {
        let (_dir, c) = controller(Mode::Development);
        assert_eq!(c.decide(&Method::GET, "/favicon.ico").await, RoutingDecision::Render);
        assert_eq!(c.decide(&Method::GET, "/../etc/passwd").await, RoutingDecision::Render);
        assert_eq!(c.decide(&Method::GET, "/api/x").await, RoutingDecision::Proxy);
    }

    #[tokio::test]
    async fn route_dispatches_to_renderer() {
        let (_dir, c) = controller(Mode::Production);
        let request = Request::get("/about").body(Body::empty()).unwrap();
        let (decision, response) = c.route(request, None).await;
        assert_eq!(decision, RoutingDecision::Render);
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"page /about");
    }

    #[tokio::test]
    async fn development_never_dispatches_to_assets() {
        let (_dir, c) = controller(Mode::Development);
        let request = Request::get("/favicon.ico").body(Body::empty()).unwrap();
        let (decision, response) = c.route(request, None).await;
        assert_eq!(decision, RoutingDecision::Render);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"page /favicon.ico");
    }

    #[tokio::test]
    async fn route_serves_asset_bytes() {
        let (_dir, c) = controller(Mode::Production);
        let request = Request::get("/assets/app.js").body(Body::empty()).unwrap();
        let (decision, response) = c.route(request, None).await;
        assert_eq!(decision.label(), "asset");
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"console.log(1)");
    }
}
