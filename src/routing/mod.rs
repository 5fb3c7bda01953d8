//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     RouteModule[] (one per business area)
//!     → table.rs (load each module once, record the outcome)
//!     → Freeze as immutable axum Router + mounted prefix list
//!
//! Request:
//!     /api/v1/<module>/... → module router (upstream.rs forwards it)
//!     anything else        → not-found fallback
//! ```
//!
//! # Design Decisions
//! - Modules are loaded once; a module that fails stays unmounted for the
//!   process lifetime
//! - One failing module never prevents the others from mounting
//! - Prefix matching is on segment boundaries (axum `nest`)

pub mod module;
pub mod table;
pub mod upstream;

pub use module::{RouteLoadError, RouteModule, STANDARD_MODULES};
pub use table::{MountEntry, RouteTable};
pub use upstream::UpstreamModule;
