//! HTTP server setup.
//!
//! # Responsibilities
//! - Create the Axum router with the single front controller handler
//! - Wire up middleware (request id, tracing)
//! - Serve on an already bound listener
//! - Drain in-flight requests on shutdown, bounded by a grace period

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    response::Response,
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::config::BffConfig;
use crate::http::request::{propagate_request_id_layer, request_id, set_request_id_layer};
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::routing::FrontController;

/// HTTP server for the front controller.
pub struct HttpServer {
    router: Router,
    config: BffConfig,
}

impl HttpServer {
    pub fn new(config: BffConfig, controller: FrontController) -> Self {
        let router = Self::build_router(Arc::new(controller));
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(controller: Arc<FrontController>) -> Router {
        let trace = TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
            tracing::info_span!(
                "request",
                method = %request.method(),
                uri = %request.uri(),
                request_id = request_id(request.headers()).unwrap_or("-"),
            )
        });

        Router::new()
            .route("/", any(front_controller_handler))
            .route("/{*path}", any(front_controller_handler))
            .with_state(controller)
            .layer(
                ServiceBuilder::new()
                    .layer(set_request_id_layer())
                    .layer(trace)
                    .layer(propagate_request_id_layer()),
            )
    }

    /// The router, for driving requests without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve until `shutdown` fires, then drain for at most the grace period.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        let grace = Duration::from_secs(self.config.shutdown.grace_secs);
        tracing::info!(
            address = %addr,
            mode = %self.config.mode,
            "HTTP server starting"
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        let stop_accepting = shutdown.signalled();
        let grace_started = shutdown.signalled();

        let serve = axum::serve(listener, app)
            .with_graceful_shutdown(stop_accepting)
            .into_future();
        let deadline = async move {
            grace_started.await;
            tokio::time::sleep(grace).await;
        };

        tokio::select! {
            result = serve => result?,
            _ = deadline => {
                tracing::warn!(
                    grace_secs = grace.as_secs(),
                    "Grace period elapsed, dropping remaining connections"
                );
            }
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Every request lands here; the front controller picks the handler.
async fn front_controller_handler(
    State(controller): State<Arc<FrontController>>,
    request: Request<Body>,
) -> Response {
    let start = Instant::now();
    let client_ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let (decision, response) = controller.route(request, client_ip).await;

    let status = response.status();
    metrics::record_request(decision.label(), method.as_str(), status.as_u16(), start);
    tracing::debug!(
        decision = decision.label(),
        method = %method,
        path = %path,
        status = status.as_u16(),
        "Request handled"
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Mode;
    use crate::render::{RenderContext, RenderEntry, RenderError, RenderOutput};
    use crate::render::{LoadError, ModuleLoader};
    use async_trait::async_trait;
    use axum::http::{HeaderMap, StatusCode};
    use tower::ServiceExt;

    struct Hello;

    impl RenderEntry for Hello {
        fn render(&self, ctx: &RenderContext) -> Result<RenderOutput, RenderError> {
            Ok(RenderOutput {
                status: StatusCode::OK,
                headers: HeaderMap::new(),
                html: format!("hello {}", ctx.request_id.as_deref().unwrap_or("?")),
            })
        }
    }

    struct HelloLoader;

    #[async_trait]
    impl ModuleLoader for HelloLoader {
        fn mode(&self) -> Mode {
            Mode::Development
        }

        async fn resolve(&self) -> Result<Arc<dyn RenderEntry>, LoadError> {
            Ok(Arc::new(Hello))
        }
    }

    fn server() -> HttpServer {
        let config = BffConfig::default();
        let controller = FrontController::new(&config, Arc::new(HelloLoader)).unwrap();
        HttpServer::new(config, controller)
    }

    #[tokio::test]
    async fn render_sees_request_id_and_response_echoes_it() {
        let response = server()
            .router()
            .oneshot(
                Request::get("/some/page")
                    .header("x-request-id", "abc-123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-request-id"], "abc-123");
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"hello abc-123");
    }

    #[tokio::test]
    async fn root_path_is_handled() {
        let response = server()
            .router()
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
    }
}
