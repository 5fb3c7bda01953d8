//! Database connector abstraction and the default TCP implementation.
//!
//! # Responsibilities
//! - Parse MongoDB-style connection URIs
//! - Establish the persistent connection under a timeout
//! - Report failures as cloneable errors so one attempt can be shared

use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::net::TcpStream;
use url::Url;

use crate::config::DatabaseConfig;

const DEFAULT_PORT: u16 = 27017;

/// Error raised by a connect attempt.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DatabaseError {
    #[error("invalid database uri: {0}")]
    InvalidUri(String),
    #[error("unsupported database uri scheme '{0}'")]
    Unsupported(String),
    #[error("connection to {addr} timed out after {secs}s")]
    Timeout { addr: String, secs: u64 },
    #[error("connection to {addr} failed: {reason}")]
    Io { addr: String, reason: String },
    #[error("{0}")]
    Other(String),
}

/// An established database connection, shared read-only by all requests.
#[derive(Debug, Clone)]
pub struct DatabaseHandle {
    address: String,
    database: Option<String>,
    connected_at: DateTime<Utc>,
    socket: Option<Arc<TcpStream>>,
}

impl DatabaseHandle {
    /// Create a handle for a connection established by a custom connector.
    pub fn new(address: impl Into<String>, database: Option<String>) -> Self {
        Self {
            address: address.into(),
            database,
            connected_at: Utc::now(),
            socket: None,
        }
    }

    fn with_socket(mut self, socket: TcpStream) -> Self {
        self.socket = Some(Arc::new(socket));
        self
    }

    /// `host:port` of the connected server.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Database name from the URI path, if any.
    pub fn database(&self) -> Option<&str> {
        self.database.as_deref()
    }

    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    /// The underlying socket, when the connector keeps one open.
    pub fn socket(&self) -> Option<&TcpStream> {
        self.socket.as_deref()
    }
}

/// Establishes the connection to the backing document store.
#[async_trait]
pub trait DatabaseConnector: Send + Sync {
    /// Credential-free description of the target, for logs.
    fn describe(&self) -> String;

    /// Open the connection.
    async fn connect(&self) -> Result<DatabaseHandle, DatabaseError>;
}

/// Parsed `mongodb://` connection target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionTarget {
    /// Host as it appears in an address; IPv6 literals keep their brackets.
    pub host: String,
    pub port: u16,
    pub database: Option<String>,
}

impl ConnectionTarget {
    /// Parse a `mongodb://[user:pass@]host[:port][,host2...][/db][?options]` URI.
    /// Only the first host of a seed list is used.
    pub fn parse(uri: &str) -> Result<Self, DatabaseError> {
        let url = Url::parse(&first_seed_only(uri.trim()))
            .map_err(|e| DatabaseError::InvalidUri(e.to_string()))?;

        match url.scheme() {
            "mongodb" => {}
            // SRV records need a DNS resolver this connector does not carry.
            other => return Err(DatabaseError::Unsupported(other.to_string())),
        }

        let host = url
            .host_str()
            .filter(|host| !host.is_empty())
            .ok_or_else(|| DatabaseError::InvalidUri("missing host".to_string()))?;

        let database = Some(url.path().trim_matches('/'))
            .filter(|db| !db.is_empty())
            .map(str::to_string);

        Ok(Self {
            host: host.to_string(),
            port: url.port().unwrap_or(DEFAULT_PORT),
            database,
        })
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Drop every seed after the first so the authority is a single `host[:port]`.
fn first_seed_only(uri: &str) -> Cow<'_, str> {
    let Some(start) = uri.find("://").map(|i| i + 3) else {
        return Cow::Borrowed(uri);
    };
    let end = uri[start..]
        .find(['/', '?'])
        .map_or(uri.len(), |i| start + i);
    let authority = &uri[start..end];
    let hosts_at = authority.rfind('@').map_or(0, |at| at + 1);

    match authority[hosts_at..].split_once(',') {
        Some((first, _)) => Cow::Owned(format!(
            "{}{}{}{}",
            &uri[..start],
            &authority[..hosts_at],
            first,
            &uri[end..]
        )),
        None => Cow::Borrowed(uri),
    }
}

/// Connects by opening a TCP session to the first configured host.
///
/// An unusable URI does not prevent construction. It is reported by every
/// connect attempt instead, so the server starts and only database-backed
/// routes fail.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    target: Result<ConnectionTarget, DatabaseError>,
    timeout: Duration,
}

impl TcpConnector {
    pub fn new(target: ConnectionTarget, timeout: Duration) -> Self {
        Self {
            target: Ok(target),
            timeout,
        }
    }

    /// Build from configuration.
    pub fn from_config(config: &DatabaseConfig) -> Self {
        let target = ConnectionTarget::parse(&config.uri);
        if let Err(e) = &target {
            tracing::warn!(error = %e, "Database URI is unusable; API routes will report it");
        }
        Self {
            target,
            timeout: Duration::from_secs(config.connect_timeout_secs),
        }
    }

    fn target_address(&self) -> String {
        self.target
            .as_ref()
            .map(ConnectionTarget::address)
            .unwrap_or_default()
    }
}

#[async_trait]
impl DatabaseConnector for TcpConnector {
    fn describe(&self) -> String {
        match &self.target {
            Ok(ConnectionTarget {
                database: Some(db),
                ..
            }) => format!("{}/{}", self.target_address(), db),
            Ok(_) => self.target_address(),
            Err(e) => format!("unusable target ({e})"),
        }
    }

    async fn connect(&self) -> Result<DatabaseHandle, DatabaseError> {
        let target = self.target.as_ref().map_err(Clone::clone)?;
        let addr = target.address();
        let socket = tokio::time::timeout(self.timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| DatabaseError::Timeout {
                addr: addr.clone(),
                secs: self.timeout.as_secs(),
            })?
            .map_err(|e| DatabaseError::Io {
                addr: addr.clone(),
                reason: e.to_string(),
            })?;

        socket.set_nodelay(true).ok();

        Ok(DatabaseHandle::new(addr, target.database.clone()).with_socket(socket))
    }
}
