//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! defaults (schema.rs)
//!     → optional TOML file (loader.rs)
//!     → environment overlay: PORT, PROXY_URL, APP_ENV, ... (loader.rs)
//!     → command-line overrides (main.rs)
//!     → validation.rs (semantic checks)
//!     → BffConfig (validated, immutable)
//!     → shared by value / Arc with all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; there is no hot reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::ConfigError;
pub use schema::{
    AssetConfig, BffConfig, ListenerConfig, LogFormat, Mode, ObservabilityConfig, RenderConfig,
    ShutdownConfig, UpstreamConfig,
};
