//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use crate::config::schema::{BffConfig, Mode};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid value for {var}: {message}")]
    Env { var: &'static str, message: String },
    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse a TOML configuration file without validating it.
pub fn read_config_file(path: &Path) -> Result<BffConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    Ok(toml::from_str(&content)?)
}

/// Overlay process-environment settings onto `config`.
///
/// `lookup` abstracts `std::env::var` so tests do not touch the real
/// environment. Recognized variables: `PORT`, `PROXY_URL`, `APP_ENV`
/// (falling back to `NODE_ENV`), `UPSTREAM_TIMEOUT_SECS`, `LOG_FORMAT`.
pub fn apply_env<F>(config: &mut BffConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(port) = lookup("PORT") {
        config.listener.port = port.trim().parse().map_err(|_| ConfigError::Env {
            var: "PORT",
            message: format!("'{port}' is not a valid port"),
        })?;
    }

    if let Some(url) = lookup("PROXY_URL") {
        config.upstream.base_url = url.trim().to_string();
    }

    if let Some(mode) = lookup("APP_ENV").or_else(|| lookup("NODE_ENV")) {
        config.mode = Mode::from_env_value(&mode);
    }

    if let Some(secs) = lookup("UPSTREAM_TIMEOUT_SECS") {
        config.upstream.timeout_secs = secs.trim().parse().map_err(|_| ConfigError::Env {
            var: "UPSTREAM_TIMEOUT_SECS",
            message: format!("'{secs}' is not a number of seconds"),
        })?;
    }

    if let Some(format) = lookup("LOG_FORMAT") {
        config.observability.log_format = format
            .parse()
            .map_err(|message| ConfigError::Env { var: "LOG_FORMAT", message })?;
    }

    Ok(())
}

/// Load configuration: defaults, then the optional file, then the
/// environment. The result is not validated yet so callers can apply
/// command-line overrides first; see [`finish`].
pub fn load_config<F>(path: Option<&Path>, lookup: F) -> Result<BffConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match path {
        Some(path) => read_config_file(path)?,
        None => BffConfig::default(),
    };
    apply_env(&mut config, lookup)?;
    Ok(config)
}

/// Validate a fully assembled configuration.
pub fn finish(config: BffConfig) -> Result<BffConfig, ConfigError> {
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}
