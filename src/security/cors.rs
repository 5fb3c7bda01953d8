//! Cross-origin policy.
//!
//! # Responsibilities
//! - Build the immutable allowed-origin set at startup
//! - Decide, per request, whether an `Origin` is admitted
//! - Produce the `CorsLayer` that writes the response headers
//!
//! # Design Decisions
//! - The decision is a pure function, testable without a server
//! - Allowed origins are echoed back, never the literal `*`, so
//!   credentialed requests stay valid
//! - Strict mode fails closed; permissive mode exists for debugging only

use axum::http::{header, Method};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::config::{CorsConfig, CorsMode};

/// Wildcard value for `CLIENT_URL`.
pub const ANY_ORIGIN: &str = "*";

/// Outcome of evaluating a request's `Origin`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OriginDecision {
    /// No `Origin` header or a listed/wildcard origin.
    Allow,
    /// Unlisted origin let through in permissive mode.
    AllowUnlisted(String),
    /// Unlisted origin in strict mode.
    Reject(String),
}

impl OriginDecision {
    pub fn is_allowed(&self) -> bool {
        !matches!(self, OriginDecision::Reject(_))
    }
}

/// The allowed-origin set plus how to treat everything else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginPolicy {
    allowed: Vec<String>,
    allow_any: bool,
    mode: CorsMode,
}

impl OriginPolicy {
    pub fn new(allowed: Vec<String>, allow_any: bool, mode: CorsMode) -> Self {
        let mut normalized: Vec<String> = Vec::with_capacity(allowed.len());
        for origin in allowed.iter().map(|o| normalize(o)) {
            if !origin.is_empty() && !normalized.contains(&origin) {
                normalized.push(origin);
            }
        }
        Self {
            allowed: normalized,
            allow_any,
            mode,
        }
    }

    /// Build from configuration: the configured origins followed by
    /// `CLIENT_URL`, or allow-any when `CLIENT_URL` is `*`.
    pub fn from_config(config: &CorsConfig) -> Self {
        let mut allowed = config.allowed_origins.clone();
        let mut allow_any = false;
        match config.client_url.as_deref().map(str::trim) {
            Some(ANY_ORIGIN) => allow_any = true,
            Some(url) => allowed.push(url.to_string()),
            None => {}
        }
        Self::new(allowed, allow_any, config.mode)
    }

    /// Allowed origins, in configuration order.
    pub fn allowed(&self) -> &[String] {
        &self.allowed
    }

    pub fn allows_any(&self) -> bool {
        self.allow_any
    }

    pub fn mode(&self) -> CorsMode {
        self.mode
    }

    fn contains(&self, origin: &str) -> bool {
        let origin = normalize(origin);
        self.allowed.iter().any(|allowed| *allowed == origin)
    }
}

/// Origins compare exactly, ignoring surrounding whitespace and a
/// trailing slash (`CLIENT_URL` values are often pasted with one).
fn normalize(origin: &str) -> String {
    origin.trim().trim_end_matches('/').to_string()
}

/// Decide whether a request with `origin` may proceed.
pub fn evaluate_origin(origin: Option<&str>, policy: &OriginPolicy) -> OriginDecision {
    let Some(origin) = origin else {
        return OriginDecision::Allow;
    };

    if policy.allow_any || policy.contains(origin) {
        return OriginDecision::Allow;
    }

    match policy.mode {
        CorsMode::Strict => OriginDecision::Reject(origin.to_string()),
        CorsMode::Permissive => OriginDecision::AllowUnlisted(origin.to_string()),
    }
}

/// Response-header half of CORS. Mirrors the request origin; only safe
/// behind the origin gate, which has already rejected disallowed origins.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::PATCH,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}
