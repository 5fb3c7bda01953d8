//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Init logging/metrics → Build server → Eager DB connect
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Drain connections → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - The eager database connect runs in the background and never delays
//!   binding the listener
//! - Requests arriving during that connect share its attempt

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
