//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (limits > 0, addresses parse)
//! - Check that upstreams reference known route modules
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ApiConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::ApiConfig;
use crate::routing::STANDARD_MODULES;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("invalid bind address '{0}'")]
    BindAddress(String),
    #[error("invalid metrics address '{0}'")]
    MetricsAddress(String),
    #[error("max_body_bytes must be greater than zero")]
    ZeroBodyLimit,
    #[error("connect_timeout_secs must be greater than zero")]
    ZeroConnectTimeout,
    #[error("api_prefix '{0}' must start with '/' and must not end with '/'")]
    ApiPrefix(String),
    #[error("invalid origin '{0}'")]
    Origin(String),
    #[error("upstream configured for unknown route module '{0}'")]
    UnknownModule(String),
}

/// Validate a configuration, collecting every error.
pub fn validate_config(config: &ApiConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if config.limits.max_body_bytes == 0 {
        errors.push(ValidationError::ZeroBodyLimit);
    }

    if config.database.connect_timeout_secs == 0 {
        errors.push(ValidationError::ZeroConnectTimeout);
    }

    let prefix = &config.routes.api_prefix;
    if !prefix.starts_with('/') || prefix.len() < 2 || prefix.ends_with('/') {
        errors.push(ValidationError::ApiPrefix(prefix.clone()));
    }

    let client_url = config.cors.client_url.iter().filter(|url| url.trim() != "*");
    for origin in config.cors.allowed_origins.iter().chain(client_url) {
        if !is_valid_origin(origin) {
            errors.push(ValidationError::Origin(origin.clone()));
        }
    }

    for name in config.routes.upstreams.keys() {
        if !STANDARD_MODULES.iter().any(|(module, _)| module == name) {
            errors.push(ValidationError::UnknownModule(name.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn is_valid_origin(origin: &str) -> bool {
    match url::Url::parse(origin.trim()) {
        Ok(url) => matches!(url.scheme(), "http" | "https") && url.host_str().is_some(),
        Err(_) => false,
    }
}
