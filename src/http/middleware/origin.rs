//! Origin gate.
//!
//! Rejects cross-origin requests whose `Origin` is not admitted by the
//! configured [`OriginPolicy`](crate::security::OriginPolicy) before any
//! route handler runs. Response headers for admitted origins come from the
//! `CorsLayer` installed just inside this gate.

use std::borrow::Cow;

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::http::response::ApiError;
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::security::{evaluate_origin, OriginDecision};

pub async fn origin_gate(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let decision = {
        // Non-UTF-8 origins are compared lossily and can never match.
        let origin: Option<Cow<'_, str>> = req
            .headers()
            .get(header::ORIGIN)
            .map(|v| String::from_utf8_lossy(v.as_bytes()));
        evaluate_origin(origin.as_deref(), &state.origin_policy)
    };

    match decision {
        OriginDecision::Allow => next.run(req).await,
        OriginDecision::AllowUnlisted(origin) => {
            tracing::warn!(
                origin = %origin,
                path = %req.uri().path(),
                "Unlisted origin admitted (permissive CORS mode)"
            );
            next.run(req).await
        }
        OriginDecision::Reject(origin) => {
            tracing::warn!(
                origin = %origin,
                method = %req.method(),
                path = %req.uri().path(),
                "CORS blocked origin"
            );
            metrics::record_origin_rejected();
            ApiError::OriginNotAllowed(origin).into_response()
        }
    }
}
