//! Configuration loading from disk and environment.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::schema::{ApiConfig, CorsMode, Environment};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidVar(&'static str, String),
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

/// Build the runtime configuration: optional file, then `.env` and process
/// environment overrides, then validation.
pub fn load(path: Option<&Path>) -> Result<ApiConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_with(path, |key| std::env::var(key).ok())
}

/// [`load`] with an explicit variable lookup in place of the process
/// environment.
pub fn load_with<F>(path: Option<&Path>, lookup: F) -> Result<ApiConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match path {
        Some(path) => toml::from_str(&fs::read_to_string(path)?)?,
        None => ApiConfig::default(),
    };

    apply_env_overrides(&mut config, lookup)?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Apply environment overrides using `lookup` to read variables.
///
/// Recognised: `NODE_ENV`, `PORT`, `BIND_ADDRESS`, `CLIENT_URL`, `CORS_MODE`,
/// `MONGO_URI`, `UPLOADS_DIR`, `LOG_LEVEL` and `<MODULE>_SERVICE_URL` for each
/// standard route module.
pub fn apply_env_overrides<F>(config: &mut ApiConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

    if let Some(env) = lookup("NODE_ENV") {
        config.environment = Environment::from_name(&env);
    }

    if let Some(addr) = lookup("BIND_ADDRESS") {
        config.listener.bind_address = addr;
    } else if let Some(port) = lookup("PORT") {
        let port: u16 = port
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidVar("PORT", port.clone()))?;
        config.listener.bind_address = format!("0.0.0.0:{port}");
    }

    if let Some(client_url) = lookup("CLIENT_URL") {
        config.cors.client_url = Some(client_url.trim().to_string());
    }

    if let Some(mode) = lookup("CORS_MODE") {
        config.cors.mode = match mode.trim().to_ascii_lowercase().as_str() {
            "strict" => CorsMode::Strict,
            "permissive" => CorsMode::Permissive,
            _ => return Err(ConfigError::InvalidVar("CORS_MODE", mode)),
        };
    }

    if let Some(uri) = lookup("MONGO_URI") {
        config.database.uri = uri;
    }

    if let Some(dir) = lookup("UPLOADS_DIR") {
        config.uploads.dir = Some(PathBuf::from(dir));
    }

    if let Some(level) = lookup("LOG_LEVEL") {
        config.observability.log_level = level;
    }

    for (name, _) in crate::routing::STANDARD_MODULES {
        let key = format!("{}_SERVICE_URL", name.to_ascii_uppercase());
        if let Some(url) = lookup(&key) {
            config.routes.upstreams.insert(name.to_string(), url);
        }
    }

    Ok(())
}
