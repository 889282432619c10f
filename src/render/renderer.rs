//! Page rendering for requests no other decision claimed.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    response::Response,
};

use crate::http::response::{diagnostic_page, html_response};
use crate::render::entry::RenderContext;
use crate::render::loader::ModuleLoader;

/// Renders pages through the configured loader.
#[derive(Clone)]
pub struct SsrRenderer {
    loader: Arc<dyn ModuleLoader>,
    /// Show failure details in the response body (development only).
    expose_errors: bool,
}

impl SsrRenderer {
    pub fn new(loader: Arc<dyn ModuleLoader>) -> Self {
        let expose_errors = !loader.mode().is_production();
        Self {
            loader,
            expose_errors,
        }
    }

    /// Render `request`. Failures become a 500 page.
    pub async fn render(&self, request: Request<Body>) -> Response {
        let (parts, _body) = request.into_parts();
        let ctx = RenderContext::from_parts(&parts);

        let result = match self.loader.resolve().await {
            Ok(entry) => entry.render(&ctx).map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };

        match result {
            Ok(output) => {
                let mut response = html_response(output.status, output.html);
                response.headers_mut().extend(output.headers);
                response
            }
            Err(detail) => {
                tracing::error!(
                    path = %ctx.path,
                    request_id = ctx.request_id.as_deref().unwrap_or("-"),
                    error = %detail,
                    "Render failed"
                );
                if self.expose_errors {
                    diagnostic_page(StatusCode::INTERNAL_SERVER_ERROR, &detail)
                } else {
                    html_response(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "<!DOCTYPE html><html><body><h1>Internal Server Error</h1></body></html>"
                            .to_string(),
                    )
                }
            }
        }
    }
}

impl std::fmt::Debug for SsrRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SsrRenderer")
            .field("mode", &self.loader.mode())
            .field("expose_errors", &self.expose_errors)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Mode;
    use crate::render::entry::{RenderEntry, RenderError, RenderOutput};
    use crate::render::loader::LoadError;
    use crate::render::compile::CompileError;
    use async_trait::async_trait;
    use axum::http::{header, HeaderMap, HeaderValue};

    struct Echo;

    impl RenderEntry for Echo {
        fn render(&self, ctx: &RenderContext) -> Result<RenderOutput, RenderError> {
            let mut headers = HeaderMap::new();
            headers.insert("x-rendered-by", HeaderValue::from_static("echo"));
            Ok(RenderOutput {
                status: StatusCode::CREATED,
                headers,
                html: format!("<p>{} {}</p>", ctx.method, ctx.path),
            })
        }
    }

    struct Stub {
        mode: Mode,
        fail: bool,
    }

    #[async_trait]
    impl ModuleLoader for Stub {
        fn mode(&self) -> Mode {
            self.mode
        }

        async fn resolve(&self) -> Result<Arc<dyn RenderEntry>, LoadError> {
            if self.fail {
                Err(LoadError::Compile(CompileError::MissingDocument {
                    path: "app/<root>.html".to_string(),
                }))
            } else {
                Ok(Arc::new(Echo))
            }
        }
    }

    fn renderer(mode: Mode, fail: bool) -> SsrRenderer {
        SsrRenderer::new(Arc::new(Stub { mode, fail }))
    }

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn uses_entry_status_and_headers() {
        let request = Request::post("/signup").body(Body::from("ignored")).unwrap();
        let response = renderer(Mode::Production, false).render(request).await;

        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()["x-rendered-by"], "echo");
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/html; charset=utf-8");
        assert_eq!(body_string(response).await, "<p>POST /signup</p>");
    }

    #[tokio::test]
    async fn development_failure_shows_escaped_diagnostic() {
        let request = Request::get("/").body(Body::empty()).unwrap();
        let response = renderer(Mode::Development, true).render(request).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_string(response).await;
        assert!(body.contains("app/&lt;root&gt;.html"), "{body}");
    }

    #[tokio::test]
    async fn production_failure_hides_detail() {
        let request = Request::get("/").body(Body::empty()).unwrap();
        let response = renderer(Mode::Production, true).render(request).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_string(response).await;
        assert!(!body.contains("root"), "{body}");
    }
}
