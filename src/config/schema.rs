//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the front
//! door. All types derive Serde traits for deserialization from config files.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Runtime mode, selected once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Sources are transformed on every page request; no static assets.
    #[default]
    Development,
    /// Prebuilt bundle loaded once; client assets served from disk.
    Production,
}

impl Mode {
    /// Map an environment indicator to a mode.
    ///
    /// Only the literal `production` (case-insensitive) selects production.
    pub fn from_env_value(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("production") {
            Mode::Production
        } else {
            Mode::Development
        }
    }

    pub fn is_production(self) -> bool {
        self == Mode::Production
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Development => f.write_str("development"),
            Mode::Production => f.write_str("production"),
        }
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Mode::Production),
            "development" | "dev" => Ok(Mode::Development),
            other => Err(format!("unknown mode '{other}' (expected development or production)")),
        }
    }
}

/// Root configuration for the front door.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct BffConfig {
    /// Development or production.
    pub mode: Mode,

    /// Listener configuration (host, port).
    pub listener: ListenerConfig,

    /// Upstream API service.
    pub upstream: UpstreamConfig,

    /// Client asset directory.
    pub assets: AssetConfig,

    /// Server-side rendering entry locations.
    pub render: RenderConfig,

    /// Graceful shutdown settings.
    pub shutdown: ShutdownConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Interface to bind.
    pub host: String,

    /// TCP port to bind.
    pub port: u16,
}

impl ListenerConfig {
    /// `host:port`, suitable for `TcpListener::bind`.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

/// Upstream API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL requests are forwarded to (e.g., "http://127.0.0.1:8000").
    pub base_url: String,

    /// Requests whose path starts with this prefix are proxied.
    pub api_prefix: String,

    /// Remove the prefix before forwarding.
    pub strip_prefix: bool,

    /// Deadline for upstream response headers, in seconds.
    pub timeout_secs: u64,

    /// TCP connect timeout, in seconds.
    pub connect_timeout_secs: u64,

    /// Idle pooled connections are closed after this many seconds.
    pub pool_idle_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            api_prefix: "/api".to_string(),
            strip_prefix: false,
            timeout_secs: 30,
            connect_timeout_secs: 5,
            pool_idle_secs: 90,
        }
    }
}

/// Static asset configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AssetConfig {
    /// Directory holding the client build output.
    pub root: PathBuf,

    /// URL prefix of content-hashed files that may be cached forever.
    pub immutable_prefix: String,

    /// `max-age` for immutable files, in seconds.
    pub immutable_max_age_secs: u64,

    /// `max-age` for everything else, in seconds.
    pub max_age_secs: u64,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("build/client"),
            immutable_prefix: "/assets/".to_string(),
            immutable_max_age_secs: 365 * 24 * 60 * 60,
            max_age_secs: 60 * 60,
        }
    }
}

/// Render entry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Compiled bundle loaded once in production.
    pub bundle_path: PathBuf,

    /// Source tree transformed per request in development.
    pub source_dir: PathBuf,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            bundle_path: PathBuf::from("build/server/bundle.json"),
            source_dir: PathBuf::from("app"),
        }
    }
}

/// Graceful shutdown configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// How long in-flight requests may drain after a shutdown signal.
    pub grace_secs: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self { grace_secs: 10 }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins if set.
    pub log_level: String,

    /// Human-readable or JSON log lines.
    pub log_format: LogFormat,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
