//! Built-in handlers: health and the not-found fallback.

use axum::{
    extract::{OriginalUri, State},
    Json,
};
use chrono::{SecondsFormat, Utc};

use crate::http::response::{ApiEnvelope, ApiError};
use crate::http::server::AppState;

/// `GET /` and `GET /api`. Always 200, whatever the database state.
pub async fn health(State(state): State<AppState>) -> Json<ApiEnvelope> {
    Json(ApiEnvelope {
        status: Some("ok".to_string()),
        db_connected: Some(state.readiness.is_ready()),
        timestamp: Some(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
        ..ApiEnvelope::message("FinBug API is running")
    })
}

/// Fallback for every unmatched request; lists the mounted module prefixes.
pub async fn not_found(State(state): State<AppState>, OriginalUri(uri): OriginalUri) -> ApiError {
    ApiError::NotFound {
        path: uri.path().to_string(),
        routes: state.mounted.to_vec(),
    }
}
