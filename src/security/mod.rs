//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → cors.rs (evaluate Origin, reject or admit)
//!     → limits.rs (check request size)
//!     → Pass to database gate and routing
//! ```
//!
//! # Design Decisions
//! - Fail closed by default: unlisted origins are rejected
//! - Size limits enforced before parsing

pub mod cors;
pub mod limits;

pub use cors::{evaluate_origin, OriginDecision, OriginPolicy};
pub use limits::BodyLimit;
