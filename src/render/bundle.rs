//! The compiled server build.
//!
//! A [`ServerBuild`] is what the transform produces and what production
//! loads from `bundle.json`: the document shell plus a ranked route table.

use std::cmp::Ordering;

use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};

use crate::render::entry::{RenderContext, RenderEntry, RenderError, RenderOutput};
use crate::render::template::{escape, Template, UnknownVariable};

/// Bumped whenever the serialized layout changes.
pub const FORMAT_VERSION: u32 = 1;

/// Title and body used when no route matches.
const NOT_FOUND_TITLE: &str = "Not Found";
const NOT_FOUND_BODY: &str = "<main><h1>404</h1><p>This page could not be found.</p></main>";

/// One segment of a route pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "name", rename_all = "snake_case")]
pub enum PatternSegment {
    Static(String),
    Param(String),
    Splat,
}

impl PatternSegment {
    fn specificity(&self) -> u8 {
        match self {
            PatternSegment::Static(_) => 3,
            PatternSegment::Param(_) => 2,
            PatternSegment::Splat => 1,
        }
    }
}

/// A route compiled from one source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledRoute {
    /// Source file, relative to the routes directory.
    pub id: String,
    pub pattern: Vec<PatternSegment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect: Option<String>,
    pub body: Template,
}

/// Captured route params, in pattern order. The splat is stored as `*`.
pub type Params = Vec<(String, String)>;

impl CompiledRoute {
    /// Human-readable pattern, e.g. `/bands/:band_id`.
    pub fn pattern_string(&self) -> String {
        if self.pattern.is_empty() {
            return "/".to_string();
        }
        self.pattern
            .iter()
            .map(|segment| match segment {
                PatternSegment::Static(s) => format!("/{s}"),
                PatternSegment::Param(p) => format!("/:{p}"),
                PatternSegment::Splat => "/*".to_string(),
            })
            .collect()
    }

    /// Names of the params this route captures.
    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.pattern.iter().filter_map(|segment| match segment {
            PatternSegment::Param(p) => Some(p.as_str()),
            PatternSegment::Splat => Some("*"),
            PatternSegment::Static(_) => None,
        })
    }

    /// Match decoded path segments.
    pub fn matches(&self, segments: &[String]) -> Option<Params> {
        let mut params = Params::new();
        for (i, pattern) in self.pattern.iter().enumerate() {
            match pattern {
                PatternSegment::Splat => {
                    params.push(("*".to_string(), segments.get(i..).unwrap_or(&[]).join("/")));
                    return Some(params);
                }
                PatternSegment::Static(expected) => {
                    if segments.get(i) != Some(expected) {
                        return None;
                    }
                }
                PatternSegment::Param(name) => {
                    params.push((name.clone(), segments.get(i)?.clone()));
                }
            }
        }
        (segments.len() == self.pattern.len()).then_some(params)
    }
}

/// Order routes most specific first.
///
/// Segment by segment, static beats param beats splat; when one pattern is
/// a prefix of the other, the shorter one wins (`/docs` before `/docs/*`).
pub fn rank(a: &CompiledRoute, b: &CompiledRoute) -> Ordering {
    for (x, y) in a.pattern.iter().zip(&b.pattern) {
        match y.specificity().cmp(&x.specificity()) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    a.pattern.len().cmp(&b.pattern.len())
}

/// Split a raw request path into decoded, non-empty segments.
pub fn path_segments(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(|s| percent_decode_str(s).decode_utf8_lossy().into_owned())
        .collect()
}

/// Compiled document shell plus ranked routes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerBuild {
    pub format_version: u32,
    pub document: Template,
    pub routes: Vec<CompiledRoute>,
}

impl ServerBuild {
    /// First route matching `path`.
    pub fn match_route(&self, path: &str) -> Option<(&CompiledRoute, Params)> {
        let segments = path_segments(path);
        self.routes
            .iter()
            .find_map(|route| route.matches(&segments).map(|params| (route, params)))
    }

    fn render_document(
        &self,
        ctx: &RenderContext,
        title: &str,
        outlet: &str,
    ) -> Result<String, RenderError> {
        self.document
            .render(|name| match name {
                "outlet" => Some(outlet.to_string()),
                "title" => Some(title.to_string()),
                other => request_variable(ctx, other),
            })
            .map_err(|UnknownVariable(name)| RenderError::UnknownVariable {
                template: "root.html".to_string(),
                name,
            })
    }
}

/// Variables every template can reference.
fn request_variable(ctx: &RenderContext, name: &str) -> Option<String> {
    match name {
        "path" => Some(ctx.path.clone()),
        "method" => Some(ctx.method.to_string()),
        "query" => Some(ctx.query.clone().unwrap_or_default()),
        "request_id" => Some(ctx.request_id.clone().unwrap_or_default()),
        other => other
            .strip_prefix("query.")
            .map(|key| ctx.query_param(key).unwrap_or_default()),
    }
}

fn html_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/html; charset=utf-8"),
    );
    headers
}

impl RenderEntry for ServerBuild {
    fn render(&self, ctx: &RenderContext) -> Result<RenderOutput, RenderError> {
        let Some((route, params)) = self.match_route(&ctx.path) else {
            let html = self.render_document(ctx, NOT_FOUND_TITLE, NOT_FOUND_BODY)?;
            return Ok(RenderOutput {
                status: StatusCode::NOT_FOUND,
                headers: html_headers(),
                html,
            });
        };

        let status = match route.status {
            Some(code) => StatusCode::from_u16(code).map_err(|_| RenderError::InvalidStatus {
                route: route.id.clone(),
                status: code,
            })?,
            None if route.redirect.is_some() => StatusCode::FOUND,
            None => StatusCode::OK,
        };

        if let Some(target) = &route.redirect {
            let location =
                HeaderValue::from_str(target).map_err(|_| RenderError::InvalidRedirect {
                    route: route.id.clone(),
                    target: target.clone(),
                })?;
            let mut headers = html_headers();
            headers.insert(header::LOCATION, location);
            let html = format!(
                "<!DOCTYPE html><html><body><a href=\"{0}\">{0}</a></body></html>",
                escape(target)
            );
            return Ok(RenderOutput { status, headers, html });
        }

        let title = route.title.clone().unwrap_or_default();
        let body = route
            .body
            .render(|name| match name {
                "title" => Some(title.clone()),
                other => match other.strip_prefix("params.") {
                    Some(param) => params
                        .iter()
                        .find(|(k, _)| k == param)
                        .map(|(_, v)| v.clone()),
                    None => request_variable(ctx, other),
                },
            })
            .map_err(|UnknownVariable(name)| RenderError::UnknownVariable {
                template: route.id.clone(),
                name,
            })?;

        let html = self.render_document(ctx, &title, &body)?;
        Ok(RenderOutput {
            status,
            headers: html_headers(),
            html,
        })
    }
}
