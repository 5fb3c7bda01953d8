//! Shared fixtures for integration tests.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::Request;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tower::ServiceExt;

use finbug_api::config::{ApiConfig, Environment};
use finbug_api::database::{DatabaseConnector, DatabaseError, DatabaseHandle};
use finbug_api::http::{ApiError, ParsedBody};
use finbug_api::routing::{RouteLoadError, RouteModule, STANDARD_MODULES};
use finbug_api::ApiServer;

/// Connector that replays scripted outcomes, defaulting to success.
pub struct MockConnector {
    outcomes: Mutex<VecDeque<Result<(), DatabaseError>>>,
    calls: AtomicUsize,
    delay: Duration,
    panic_first: bool,
}

impl MockConnector {
    pub fn healthy() -> Arc<Self> {
        Self::scripted(vec![], Duration::ZERO)
    }

    pub fn scripted(outcomes: Vec<Result<(), DatabaseError>>, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            outcomes: Mutex::new(outcomes.into()),
            calls: AtomicUsize::new(0),
            delay,
            panic_first: false,
        })
    }

    /// Panics inside the first connect, succeeds afterwards.
    pub fn panics_once() -> Arc<Self> {
        Arc::new(Self {
            outcomes: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
            delay: Duration::ZERO,
            panic_first: true,
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DatabaseConnector for MockConnector {
    fn describe(&self) -> String {
        "mock".to_string()
    }

    async fn connect(&self) -> Result<DatabaseHandle, DatabaseError> {
        let previous = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.panic_first && previous == 0 {
            panic!("driver state corrupted");
        }
        tokio::time::sleep(self.delay).await;
        let outcome = self.outcomes.lock().unwrap().pop_front().unwrap_or(Ok(()));
        outcome.map(|_| DatabaseHandle::new("mock:27017", Some("finbug".to_string())))
    }
}

pub fn db_timeout() -> DatabaseError {
    DatabaseError::Timeout {
        addr: "mock:27017".to_string(),
        secs: 10,
    }
}

/// In-process module with a handful of diagnostic routes.
pub struct TestModule {
    name: String,
    prefix: String,
    fail: bool,
}

impl TestModule {
    pub fn new(name: &str, prefix: &str) -> Self {
        Self {
            name: name.to_string(),
            prefix: prefix.to_string(),
            fail: false,
        }
    }

    pub fn failing(name: &str, prefix: &str) -> Self {
        Self {
            fail: true,
            ..Self::new(name, prefix)
        }
    }
}

impl RouteModule for TestModule {
    fn name(&self) -> &str {
        &self.name
    }

    fn prefix(&self) -> &str {
        &self.prefix
    }

    fn load(&self) -> Result<Router, RouteLoadError> {
        if self.fail {
            return Err(RouteLoadError::Failed {
                module: self.name.clone(),
                reason: "missing export".to_string(),
            });
        }
        let name = self.name.clone();
        Ok(Router::new()
            .route("/ping", get(move || async move { name }))
            .route("/echo", post(echo))
            .route("/fail", get(fail))
            .route("/conflict", get(conflict))
            .route("/panic", get(explode)))
    }
}

async fn echo(req: Request) -> Json<Value> {
    let (parts, body) = req.into_parts();
    let parsed = parts.extensions.get::<ParsedBody>().map(|p| p.0.clone());
    let db = parts.extensions.get::<Arc<DatabaseHandle>>().is_some();
    let raw = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    Json(json!({
        "parsed": parsed,
        "raw": String::from_utf8_lossy(&raw),
        "db": db,
    }))
}

async fn fail() -> Result<(), ApiError> {
    Err(ApiError::internal(std::io::Error::new(
        std::io::ErrorKind::Other,
        "disk full",
    )))
}

async fn conflict() -> Result<(), ApiError> {
    Err(ApiError::with_status(
        StatusCode::CONFLICT,
        "Email already registered",
    ))
}

async fn explode() -> &'static str {
    panic!("ledger exploded")
}

/// One in-process module per standard prefix.
pub fn standard_modules() -> Vec<Box<dyn RouteModule>> {
    STANDARD_MODULES
        .iter()
        .map(|(name, prefix)| Box::new(TestModule::new(name, prefix)) as Box<dyn RouteModule>)
        .collect()
}

/// Production config with no eager connect and no metrics exporter.
pub fn test_config() -> ApiConfig {
    let mut config = ApiConfig::default();
    config.environment = Environment::Production;
    config.database.eager_connect = false;
    config.observability.metrics_enabled = false;
    config
}

pub fn server(config: ApiConfig, connector: Arc<MockConnector>) -> ApiServer {
    ApiServer::new(config, connector, standard_modules())
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

/// Send `req` through `router` in-process. Non-JSON bodies come back as a
/// JSON string.
pub async fn send(router: Router, req: axum::http::Request<Body>) -> TestResponse {
    let response = router.oneshot(req).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    TestResponse {
        status,
        headers,
        body,
    }
}

pub fn get_req(path: &str) -> axum::http::Request<Body> {
    axum::http::Request::get(path).body(Body::empty()).unwrap()
}

/// Requests received by a mock upstream, head and body as text.
pub type Captured = Arc<Mutex<Vec<String>>>;

/// Start a mock upstream on an ephemeral port that answers every request
/// with `status` and `body`, recording what it received.
pub async fn start_mock_upstream(status: &'static str, body: &'static str) -> (SocketAddr, Captured) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let captured: Captured = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&captured);

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            let sink = Arc::clone(&sink);
            tokio::spawn(async move {
                let request = read_request(&mut socket).await;
                sink.lock().unwrap().push(request);

                let response = format!(
                    "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    (addr, captured)
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let head_end = loop {
        let n = socket.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            return String::from_utf8_lossy(&buf).into_owned();
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).to_ascii_lowercase();
    let content_length = head
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < head_end + content_length {
        let n = socket.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    String::from_utf8_lossy(&buf).into_owned()
}

/// An address nothing listens on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}
