//! Terminal error translation.
//!
//! # Responsibilities
//! - Log every failed request server-side, 5xx at error level
//! - In development, rewrite error bodies to include `error` and `stack`
//! - Turn panics in the body parser, database gate and route modules into
//!   sanitized 500s
//!
//! # Design Decisions
//! - Stages fail by returning [`ApiError`]; its response carries an
//!   [`ErrorReport`] extension which this stage consumes, so the report
//!   never leaves the process
//! - Sits inside compression so rewritten bodies are compressed normally
//! - The panic catcher is installed inside the CORS layer, so a panic 500
//!   still carries `Access-Control-Allow-Origin`

use std::any::Any;

use axum::{
    body::Body,
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::http::request::RequestIdExt;
use crate::http::response::{ApiError, ErrorReport};
use crate::http::server::AppState;

pub async fn translate_errors(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let request_id = req.request_id().to_string();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let mut response = next.run(req).await;
    let Some(report) = response.extensions_mut().remove::<ErrorReport>() else {
        return response;
    };

    if report.status.is_server_error() {
        tracing::error!(
            request_id = %request_id,
            method = %method,
            path = %path,
            status = report.status.as_u16(),
            kind = report.kind,
            error = %report.root_cause(),
            "Request failed"
        );
    } else {
        tracing::debug!(
            request_id = %request_id,
            method = %method,
            path = %path,
            status = report.status.as_u16(),
            kind = report.kind,
            "Request rejected"
        );
    }

    if !state.environment.is_development() {
        return response;
    }

    let body = match serde_json::to_vec(&report.verbose_envelope()) {
        Ok(body) => body,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to render verbose error body");
            return response;
        }
    };

    let (mut parts, _) = response.into_parts();
    parts.headers.remove(header::CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(body))
}

/// Panic handler for `CatchPanicLayer::custom`.
pub fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };

    ApiError::internal(format!("handler panicked: {detail}")).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn panic_becomes_internal_error() {
        let response = handle_panic(Box::new("index out of bounds"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let report = response.extensions().get::<ErrorReport>().unwrap();
        assert_eq!(report.root_cause(), "handler panicked: index out of bounds");
    }

    #[test]
    fn opaque_panic_payload() {
        let response = handle_panic(Box::new(42_u32));
        let report = response.extensions().get::<ErrorReport>().unwrap();
        assert_eq!(report.root_cause(), "handler panicked: unknown panic payload");
    }
}
