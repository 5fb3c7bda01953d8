//! Upstream route modules.
//!
//! # Responsibilities
//! - Validate the module's upstream URL when the module loads
//! - Forward every request under the prefix to the upstream service
//! - Relay the upstream response unchanged
//!
//! # Design Decisions
//! - Original path and query are forwarded as-is, so the upstream sees
//!   the same `/api/v1/...` paths a monolith would
//! - Hop-by-hop headers are stripped in both directions
//! - A transport failure is a 502; upstream error statuses pass through

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{ConnectInfo, OriginalUri, Request, State},
    http::{
        header::{self, HeaderMap, HeaderName, HeaderValue},
        uri::{Authority, PathAndQuery, Scheme},
        StatusCode, Uri,
    },
    response::Response,
    routing::any,
    Router,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};

use crate::config::RoutesConfig;
use crate::http::request::{RequestIdExt, X_REQUEST_ID};
use crate::http::response::ApiError;
use crate::routing::module::{RouteLoadError, RouteModule, STANDARD_MODULES};

const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

const HOP_BY_HOP: [HeaderName; 7] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::UPGRADE,
];

/// A module whose routes live in a separately deployed service.
pub struct UpstreamModule {
    name: String,
    prefix: String,
    upstream: Option<String>,
    client: Client<HttpConnector, Body>,
}

impl UpstreamModule {
    pub fn new(name: impl Into<String>, prefix: impl Into<String>, upstream: Option<String>) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self {
            name: name.into(),
            prefix: prefix.into(),
            upstream,
            client,
        }
    }

    /// The six standard modules, each pointed at its configured upstream.
    pub fn standard(config: &RoutesConfig) -> Vec<Box<dyn RouteModule>> {
        STANDARD_MODULES
            .iter()
            .map(|(name, prefix)| {
                let upstream = config.upstreams.get(*name).cloned();
                Box::new(UpstreamModule::new(*name, *prefix, upstream)) as Box<dyn RouteModule>
            })
            .collect()
    }

    pub fn upstream(&self) -> Option<&str> {
        self.upstream.as_deref()
    }

    fn target(&self) -> Result<UpstreamTarget, RouteLoadError> {
        let Some(url) = self.upstream.as_deref() else {
            return Err(RouteLoadError::MissingUpstream {
                module: self.name.clone(),
            });
        };

        let invalid = |reason: &str| RouteLoadError::InvalidUpstream {
            module: self.name.clone(),
            url: url.to_string(),
            reason: reason.to_string(),
        };

        let uri: Uri = url.trim().parse().map_err(|_| invalid("not a valid URI"))?;
        if uri.scheme() != Some(&Scheme::HTTP) {
            return Err(invalid("only http:// upstreams are supported"));
        }
        let authority = uri.authority().cloned().ok_or_else(|| invalid("missing host"))?;
        if uri.query().is_some() {
            return Err(invalid("query strings are not allowed"));
        }

        Ok(UpstreamTarget {
            module: self.name.clone(),
            authority,
            base_path: uri.path().trim_end_matches('/').to_string(),
            client: self.client.clone(),
        })
    }
}

impl RouteModule for UpstreamModule {
    fn name(&self) -> &str {
        &self.name
    }

    fn prefix(&self) -> &str {
        &self.prefix
    }

    fn load(&self) -> Result<Router, RouteLoadError> {
        let target = Arc::new(self.target()?);
        tracing::debug!(
            module = %self.name,
            upstream = %target.authority,
            "Upstream module ready"
        );
        Ok(Router::new()
            .route("/", any(forward))
            .route("/{*rest}", any(forward))
            .with_state(target))
    }
}

struct UpstreamTarget {
    module: String,
    authority: Authority,
    base_path: String,
    client: Client<HttpConnector, Body>,
}

impl UpstreamTarget {
    fn uri_for(&self, original: &Uri) -> Result<Uri, ApiError> {
        let path_and_query = original
            .path_and_query()
            .map(PathAndQuery::as_str)
            .unwrap_or("/");
        let path_and_query = format!("{}{}", self.base_path, path_and_query);

        Uri::builder()
            .scheme(Scheme::HTTP)
            .authority(self.authority.clone())
            .path_and_query(path_and_query)
            .build()
            .map_err(ApiError::internal)
    }
}

async fn forward(
    State(target): State<Arc<UpstreamTarget>>,
    OriginalUri(original): OriginalUri,
    req: Request,
) -> Result<Response, ApiError> {
    let request_id = req.request_id().to_string();
    let client_addr = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());

    let (mut parts, body) = req.into_parts();
    parts.uri = target.uri_for(&original)?;

    strip_hop_by_hop(&mut parts.headers);
    parts.headers.remove(header::HOST);
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        parts.headers.insert(X_REQUEST_ID, value);
    }
    if let Some(ip) = client_addr {
        append_forwarded_for(&mut parts.headers, &ip.to_string());
    }

    tracing::debug!(
        request_id = %request_id,
        module = %target.module,
        method = %parts.method,
        uri = %parts.uri,
        "Forwarding request upstream"
    );

    let upstream_req = Request::from_parts(parts, body);
    match target.client.request(upstream_req).await {
        Ok(response) => {
            let (mut parts, body) = response.into_parts();
            strip_hop_by_hop(&mut parts.headers);
            Ok(Response::from_parts(parts, Body::new(body)))
        }
        Err(e) => {
            tracing::warn!(
                request_id = %request_id,
                module = %target.module,
                error = %e,
                "Upstream request failed"
            );
            Err(ApiError::Upstream {
                status: StatusCode::BAD_GATEWAY,
                message: format!("{} service unreachable", target.module),
                source: Some(e.into()),
            })
        }
    }
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP.iter() {
        headers.remove(name);
    }
}

fn append_forwarded_for(headers: &mut HeaderMap, ip: &str) {
    let value = match headers.get(&X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
        Some(existing) => format!("{existing}, {ip}"),
        None => ip.to_string(),
    };
    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert(X_FORWARDED_FOR, value);
    }
}
