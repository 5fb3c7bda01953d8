//! Response envelope and error mapping.
//!
//! # Responsibilities
//! - Define the JSON envelope every response body uses
//! - Map pipeline errors to HTTP status codes
//! - Sanitize server-side failures before they reach the client
//!
//! # Design Decisions
//! - Errors render a sanitized envelope immediately and attach an
//!   `ErrorReport` extension; the terminal translation stage logs it and
//!   adds debug detail in development
//! - 5xx messages are fixed strings unless the error is meant to be public

use std::error::Error as StdError;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::database::DatabaseError;

/// Boxed error carried by internal and upstream failures.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// JSON response body shared by health, fallback and error responses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiEnvelope {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_connected: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub routes: Option<Vec<String>>,
}

impl ApiEnvelope {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }
}

/// Every failure the pipeline can turn into a response.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("origin '{0}' is not allowed by CORS")]
    OriginNotAllowed(String),

    #[error("malformed request body: {0}")]
    MalformedBody(String),

    #[error("request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error("database unavailable")]
    ServiceUnavailable(#[source] DatabaseError),

    #[error("no route for {path}")]
    NotFound { path: String, routes: Vec<String> },

    #[error("upstream failure: {message}")]
    Upstream {
        status: StatusCode,
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("internal error")]
    Internal(#[source] BoxError),
}

impl ApiError {
    /// Wrap any failure as a 500.
    pub fn internal(err: impl Into<BoxError>) -> Self {
        ApiError::Internal(err.into())
    }

    /// A failure that declares its own status code.
    pub fn with_status(status: StatusCode, message: impl Into<String>) -> Self {
        ApiError::Upstream {
            status,
            message: message.into(),
            source: None,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::OriginNotAllowed(_) => StatusCode::FORBIDDEN,
            ApiError::MalformedBody(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::Upstream { status, .. } => *status,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable kind, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::OriginNotAllowed(_) => "origin_not_allowed",
            ApiError::MalformedBody(_) => "malformed_body",
            ApiError::PayloadTooLarge { .. } => "payload_too_large",
            ApiError::ServiceUnavailable(_) => "service_unavailable",
            ApiError::NotFound { .. } => "not_found",
            ApiError::Upstream { .. } => "upstream",
            ApiError::Internal(_) => "internal",
        }
    }

    /// The body the client sees in every environment.
    pub fn envelope(&self) -> ApiEnvelope {
        match self {
            ApiError::OriginNotAllowed(origin) => ApiEnvelope {
                error: Some(format!("origin '{origin}' is not allowed")),
                ..ApiEnvelope::message("Not allowed by CORS")
            },
            ApiError::MalformedBody(detail) => ApiEnvelope {
                error: Some(detail.clone()),
                ..ApiEnvelope::message("Malformed request body")
            },
            ApiError::PayloadTooLarge { limit } => ApiEnvelope {
                error: Some(format!("request body exceeds {limit} bytes")),
                ..ApiEnvelope::message("Request body too large")
            },
            ApiError::ServiceUnavailable(cause) => ApiEnvelope {
                error: Some(cause.to_string()),
                ..ApiEnvelope::message("Database connection failed")
            },
            ApiError::NotFound { path, routes } => ApiEnvelope {
                path: Some(path.clone()),
                routes: Some(routes.clone()),
                ..ApiEnvelope::message("Route not found")
            },
            ApiError::Upstream {
                status, message, ..
            } if !status.is_server_error() => ApiEnvelope::message(message.clone()),
            ApiError::Upstream { status, .. } if *status == StatusCode::BAD_GATEWAY => {
                ApiEnvelope::message("Upstream request failed")
            }
            ApiError::Upstream { .. } | ApiError::Internal(_) => {
                ApiEnvelope::message("Internal server error")
            }
        }
    }

    /// Display of this error and each of its sources, outermost first.
    pub fn chain(&self) -> Vec<String> {
        let mut chain = vec![self.to_string()];
        let mut source = self.source();
        while let Some(err) = source {
            chain.push(err.to_string());
            source = err.source();
        }
        chain
    }
}

/// Diagnostic detail attached to error responses for the translation stage.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub kind: &'static str,
    pub status: StatusCode,
    pub envelope: ApiEnvelope,
    pub chain: Vec<String>,
}

impl ErrorReport {
    /// Innermost cause, the most specific description of the failure.
    pub fn root_cause(&self) -> &str {
        self.chain.last().map(String::as_str).unwrap_or_default()
    }

    /// Envelope with `error` and `stack` filled in, for development.
    pub fn verbose_envelope(&self) -> ApiEnvelope {
        let stack = self
            .chain
            .iter()
            .enumerate()
            .map(|(depth, line)| format!("{depth}: {line}"))
            .collect::<Vec<_>>()
            .join("\n");

        let mut envelope = self.envelope.clone();
        envelope.error.get_or_insert_with(|| self.root_cause().to_string());
        envelope.stack = Some(stack);
        envelope
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let report = ErrorReport {
            kind: self.kind(),
            status: self.status(),
            envelope: self.envelope(),
            chain: self.chain(),
        };

        let mut response = (report.status, Json(report.envelope.clone())).into_response();
        response.extensions_mut().insert(report);
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_omits_empty_fields() {
        let json = serde_json::to_value(ApiEnvelope::message("hi")).unwrap();
        assert_eq!(json, serde_json::json!({ "message": "hi" }));
    }

    #[test]
    fn envelope_uses_camel_case() {
        let envelope = ApiEnvelope {
            db_connected: Some(true),
            ..ApiEnvelope::message("ok")
        };
        let json = serde_json::to_value(envelope).unwrap();
        assert_eq!(json["dbConnected"], true);
    }

    #[test]
    fn status_codes() {
        assert_eq!(
            ApiError::OriginNotAllowed("x".into()).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::PayloadTooLarge { limit: 1 }.status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            ApiError::ServiceUnavailable(DatabaseError::Other("down".into())).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ApiError::with_status(StatusCode::CONFLICT, "taken").status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::internal("boom").status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn internal_errors_are_sanitized() {
        let err = ApiError::internal("password=hunter2 leaked");
        let envelope = err.envelope();
        assert_eq!(envelope.message, "Internal server error");
        assert!(envelope.error.is_none());
        assert!(envelope.stack.is_none());
    }

    #[test]
    fn declared_client_status_keeps_message() {
        let envelope = ApiError::with_status(StatusCode::CONFLICT, "Email already registered").envelope();
        assert_eq!(envelope.message, "Email already registered");
    }

    #[test]
    fn database_failure_carries_cause() {
        let err = ApiError::ServiceUnavailable(DatabaseError::Timeout {
            addr: "db:27017".into(),
            secs: 10,
        });
        let envelope = err.envelope();
        assert_eq!(envelope.message, "Database connection failed");
        assert_eq!(
            envelope.error.as_deref(),
            Some("connection to db:27017 timed out after 10s")
        );
    }

    #[test]
    fn chain_walks_sources() {
        let err = ApiError::ServiceUnavailable(DatabaseError::Other("refused".into()));
        assert_eq!(err.chain(), vec!["database unavailable", "refused"]);
    }

    #[test]
    fn verbose_envelope_adds_stack() {
        let report = ErrorReport {
            kind: "internal",
            status: StatusCode::INTERNAL_SERVER_ERROR,
            envelope: ApiEnvelope::message("Internal server error"),
            chain: vec!["internal error".into(), "disk full".into()],
        };
        let verbose = report.verbose_envelope();
        assert_eq!(verbose.error.as_deref(), Some("disk full"));
        assert_eq!(verbose.stack.as_deref(), Some("0: internal error\n1: disk full"));
    }

    #[test]
    fn into_response_attaches_report() {
        let response = ApiError::internal("boom").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let report = response.extensions().get::<ErrorReport>().unwrap();
        assert_eq!(report.kind, "internal");
        assert_eq!(report.root_cause(), "boom");
    }
}
