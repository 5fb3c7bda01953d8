//! Request body limits.
//!
//! # Responsibilities
//! - Enforce maximum request body size
//! - Reject on a declared `Content-Length` before reading anything
//! - Enforce the same bound on streamed bodies without a length
//!
//! # Design Decisions
//! - Limits apply regardless of content type
//! - Return 413 Payload Too Large

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap};
use futures_util::StreamExt;

use crate::http::response::ApiError;

/// Body size ceiling shared by the parsing stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BodyLimit {
    max_bytes: usize,
}

impl BodyLimit {
    pub fn new(max_bytes: usize) -> Self {
        Self { max_bytes }
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Early rejection on the declared `Content-Length`.
    pub fn check_declared(&self, headers: &HeaderMap) -> Result<(), ApiError> {
        let declared = headers
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());

        match declared {
            Some(len) if len > self.max_bytes as u64 => Err(ApiError::PayloadTooLarge {
                limit: self.max_bytes,
            }),
            _ => Ok(()),
        }
    }

    /// Buffer `body`, failing as soon as it grows past the limit.
    pub async fn read(&self, body: Body) -> Result<Bytes, ApiError> {
        let mut stream = body.into_data_stream();
        let mut buf: Vec<u8> = Vec::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk
                .map_err(|e| ApiError::MalformedBody(format!("failed to read request body: {e}")))?;
            if buf.len() + chunk.len() > self.max_bytes {
                return Err(ApiError::PayloadTooLarge {
                    limit: self.max_bytes,
                });
            }
            buf.extend_from_slice(&chunk);
        }

        Ok(Bytes::from(buf))
    }
}
