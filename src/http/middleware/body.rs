//! Body parsing.
//!
//! # Responsibilities
//! - Enforce the body ceiling on every request, whatever its content type
//! - Decode JSON and URL-encoded bodies into a [`ParsedBody`] extension
//! - Restore the raw bytes as the body so route modules can re-read them
//!
//! # Design Decisions
//! - Other content types pass through unparsed (multipart uploads are the
//!   route module's business)
//! - An empty body is never parsed, whatever its content type

use axum::{
    body::{Body, Bytes},
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use serde_json::{Map, Value};

use crate::http::response::ApiError;
use crate::http::server::AppState;

/// Decoded request body, present only for JSON and URL-encoded requests.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedBody(pub Value);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyKind {
    Json,
    Form,
}

pub async fn parse_body(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    state.body_limit.check_declared(req.headers())?;

    let (mut parts, body) = req.into_parts();
    let bytes = state.body_limit.read(body).await?;

    if !bytes.is_empty() {
        if let Some(kind) = body_kind(&parts.headers)? {
            let value = match kind {
                BodyKind::Json => parse_json(&bytes)?,
                BodyKind::Form => parse_form(&bytes),
            };
            parts.extensions.insert(ParsedBody(value));
        }
    }

    let req = Request::from_parts(parts, Body::from(bytes));
    Ok(next.run(req).await)
}

/// Classify the request by `Content-Type`. Unknown types yield `None`; a
/// charset other than UTF-8 on a parseable type is a client error.
fn body_kind(headers: &HeaderMap) -> Result<Option<BodyKind>, ApiError> {
    let Some(content_type) = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
    else {
        return Ok(None);
    };

    let mut params = content_type.split(';');
    let essence = params.next().unwrap_or_default().trim().to_ascii_lowercase();

    let kind = if essence == "application/json" || essence.ends_with("+json") {
        BodyKind::Json
    } else if essence == "application/x-www-form-urlencoded" {
        BodyKind::Form
    } else {
        return Ok(None);
    };

    for param in params {
        let Some((name, value)) = param.split_once('=') else {
            continue;
        };
        if !name.trim().eq_ignore_ascii_case("charset") {
            continue;
        }
        let charset = value.trim().trim_matches('"');
        if !charset.eq_ignore_ascii_case("utf-8") && !charset.eq_ignore_ascii_case("utf8") {
            return Err(ApiError::MalformedBody(format!(
                "unsupported charset '{charset}'"
            )));
        }
    }

    Ok(Some(kind))
}

fn parse_json(bytes: &Bytes) -> Result<Value, ApiError> {
    serde_json::from_slice(bytes).map_err(|e| ApiError::MalformedBody(format!("invalid JSON: {e}")))
}

/// Decode `a=1&b=2&b=3` into `{"a":"1","b":["2","3"]}`.
fn parse_form(bytes: &Bytes) -> Value {
    let mut object = Map::new();
    for (key, value) in url::form_urlencoded::parse(bytes) {
        let value = Value::String(value.into_owned());
        match object.get_mut(key.as_ref()) {
            Some(Value::Array(values)) => values.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                object.insert(key.into_owned(), value);
            }
        }
    }
    Value::Object(object)
}
