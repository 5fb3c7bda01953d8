//! Startup orchestration.
//!
//! # Responsibilities
//! - Kick off the eager database connect without blocking the listener
//!
//! # Design Decisions
//! - The eager connect goes through the readiness gate, so a request that
//!   arrives while it is in flight awaits the same attempt
//! - A failed eager connect is not fatal; the next API request retries

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::database::ReadinessGate;

pub fn spawn_eager_connect(gate: Arc<ReadinessGate>) -> JoinHandle<()> {
    tokio::spawn(async move {
        match gate.ensure_ready().await {
            Ok(_) => tracing::debug!("Eager database connect finished"),
            Err(e) => tracing::warn!(
                error = %e,
                "Eager database connect failed, will retry on the next API request"
            ),
        }
    })
}
