//! Route module contract.

use axum::Router;

/// The six business modules and their prefixes, relative to the API
/// namespace.
pub const STANDARD_MODULES: &[(&str, &str)] = &[
    ("auth", "/auth"),
    ("income", "/income"),
    ("expense", "/expense"),
    ("dashboard", "/dashboard"),
    ("ai", "/ai"),
    ("bill", "/bill"),
];

/// Failure to produce a module's router at startup.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteLoadError {
    #[error("module '{module}' has no upstream configured")]
    MissingUpstream { module: String },

    #[error("module '{module}' has invalid upstream '{url}': {reason}")]
    InvalidUpstream {
        module: String,
        url: String,
        reason: String,
    },

    #[error("module '{module}' has invalid prefix '{prefix}'")]
    InvalidPrefix { module: String, prefix: String },

    #[error("module '{module}' reuses prefix '{prefix}'")]
    DuplicatePrefix { module: String, prefix: String },

    #[error("module '{module}' failed to load: {reason}")]
    Failed { module: String, reason: String },
}

/// A business area mounted under the API namespace.
///
/// `load` is called exactly once, at startup. The returned router is
/// nested under `<api_prefix><prefix>` and sees paths relative to it.
pub trait RouteModule: Send + Sync {
    fn name(&self) -> &str;

    /// Mount point relative to the API namespace, e.g. `/income`.
    fn prefix(&self) -> &str;

    fn load(&self) -> Result<Router, RouteLoadError>;
}
