//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the API.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Maximum accepted request body, in bytes (10 MiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Origins that are always allowed, in addition to `CLIENT_URL`.
pub const BUILTIN_ORIGINS: &[&str] = &[
    "https://finbug.vercel.app",
    "https://fin-bug.vercel.app",
    "http://localhost:5173",
    "http://localhost:5174",
    "http://localhost:3000",
];

/// Root configuration for the API server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ApiConfig {
    /// Deployment environment (`NODE_ENV`).
    pub environment: Environment,

    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Cross-origin policy.
    pub cors: CorsConfig,

    /// Request size limits.
    pub limits: LimitsConfig,

    /// Document store connection settings.
    pub database: DatabaseConfig,

    /// Route module mounting.
    pub routes: RoutesConfig,

    /// Static uploads directory.
    pub uploads: UploadsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Test,
    #[default]
    Production,
}

impl Environment {
    /// Parse a `NODE_ENV`-style value. Unknown values map to production.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Environment::Development,
            "test" => Environment::Test,
            _ => Environment::Production,
        }
    }

    /// Verbose error bodies are only rendered in development.
    pub fn is_development(self) -> bool {
        self == Environment::Development
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8000".to_string(),
        }
    }
}

/// How origins outside the allowed set are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CorsMode {
    /// Reject unlisted origins with 403.
    #[default]
    Strict,
    /// Let unlisted origins through with a warning. Debugging only.
    Permissive,
}

/// Cross-origin configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Frontend origin (`CLIENT_URL`). `"*"` allows any origin.
    pub client_url: Option<String>,

    /// Additional allowed origins. Defaults to the deployed frontends and
    /// the local dev servers.
    pub allowed_origins: Vec<String>,

    /// Strict or permissive handling of unlisted origins.
    pub mode: CorsMode,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            client_url: None,
            allowed_origins: BUILTIN_ORIGINS.iter().map(|o| o.to_string()).collect(),
            mode: CorsMode::Strict,
        }
    }
}

/// Request size limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum body size in bytes.
    pub max_body_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

/// Document store connection settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Connection URI (`MONGO_URI`), e.g. "mongodb://127.0.0.1:27017/finbug".
    pub uri: String,

    /// Connect timeout in seconds.
    pub connect_timeout_secs: u64,

    /// Start connecting at process start instead of on the first API request.
    pub eager_connect: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            uri: "mongodb://127.0.0.1:27017/finbug".to_string(),
            connect_timeout_secs: 10,
            eager_connect: true,
        }
    }
}

/// Route module mounting.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RoutesConfig {
    /// API namespace. Route modules mount below it; the database gate
    /// covers the prefixes of the modules that mounted.
    pub api_prefix: String,

    /// Upstream service URL per module name (auth, income, ...).
    pub upstreams: BTreeMap<String, String>,
}

impl Default for RoutesConfig {
    fn default() -> Self {
        Self {
            api_prefix: "/api/v1".to_string(),
            upstreams: BTreeMap::new(),
        }
    }
}

/// Static uploads directory.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct UploadsConfig {
    /// Directory served under `/uploads`. Disabled when unset.
    pub dir: Option<PathBuf>,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
