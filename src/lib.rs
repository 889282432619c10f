//! Rider BFF Library
//!
//! Single-port front controller for a web application: API calls are
//! reverse-proxied to one upstream service, production static assets are
//! served from disk, and every other request is rendered server-side.

pub mod assets;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod proxy;
pub mod render;
pub mod resilience;
pub mod routing;
pub mod security;

pub use config::schema::BffConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use routing::{FrontController, RoutingDecision};
