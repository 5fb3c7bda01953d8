//! Admission pipeline stages.
//!
//! # Data Flow
//! ```text
//! request-id → trace → metrics → compression
//!     → errors.rs (terminal translation)
//!     → origin.rs (reject disallowed origins)
//!     → CorsLayer (response headers, preflight)
//!     → errors.rs (panic capture, so 500s still carry CORS headers)
//!     → body.rs (size ceiling, JSON / form decoding)
//!     → readiness.rs (database gate, mounted modules only)
//!     → route module or fallback
//! ```

pub mod body;
pub mod errors;
pub mod origin;
pub mod readiness;
pub mod telemetry;

pub use body::{parse_body, ParsedBody};
pub use errors::{handle_panic, translate_errors};
pub use origin::origin_gate;
pub use readiness::{in_namespace, require_database};
pub use telemetry::track_requests;
