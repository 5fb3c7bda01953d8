//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, layer wiring)
//!     → request.rs (request ID)
//!     → middleware/ (origin gate, body parsing, database gate)
//!     → [routing decides the module]
//!     → handlers.rs (health, not-found fallback)
//!     → response.rs (envelope, error mapping)
//!     → Send to client
//! ```

pub mod handlers;
pub mod middleware;
pub mod request;
pub mod response;
pub mod server;

pub use middleware::ParsedBody;
pub use request::{RequestIdExt, X_REQUEST_ID};
pub use response::{ApiEnvelope, ApiError, ErrorReport};
pub use server::{ApiServer, AppState};
