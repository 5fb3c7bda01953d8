//! Document store connectivity.
//!
//! # Data Flow
//! ```text
//! First API request (or eager startup connect)
//!     → readiness.rs (single shared connect attempt)
//!     → connector.rs (open connection under timeout)
//!     → Ready(handle) shared read-only by all requests
//! ```
//!
//! # Design Decisions
//! - At most one connect attempt in flight; late arrivals await it
//! - Readiness is terminal: once ready, never reset
//! - A failed attempt is not cached; the next request retries

pub mod connector;
pub mod readiness;

pub use connector::{DatabaseConnector, DatabaseError, DatabaseHandle, TcpConnector};
pub use readiness::{ReadinessGate, ReadinessState};
