//! Database readiness gate.
//!
//! Requests for a mounted route module wait for the shared database
//! connection before reaching it. Once the connection is up the check is a
//! single atomic load. Health, static routes and unmatched paths are never
//! gated, so a missing route is a 404 even while the database is down.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::http::response::ApiError;
use crate::http::server::AppState;

/// Whether `path` lies under `prefix`, respecting segment boundaries
/// (`/api/v1x` is not under `/api/v1`).
pub fn in_namespace(path: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        return true;
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

pub async fn require_database(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let path = req.uri().path();
    if !state.mounted.iter().any(|prefix| in_namespace(path, prefix)) {
        return Ok(next.run(req).await);
    }

    let handle = state
        .readiness
        .ensure_ready()
        .await
        .map_err(ApiError::ServiceUnavailable)?;

    req.extensions_mut().insert(handle);
    Ok(next.run(req).await)
}
