//! Route table: loads modules once and records what got mounted.
//!
//! # Responsibilities
//! - Call `load()` on each module exactly once
//! - Nest successful routers under `<api_prefix><prefix>`
//! - Record failures, log each once, and leave the prefix unmounted
//!
//! # Design Decisions
//! - Immutable after construction
//! - Mount order follows module order; the fallback lists prefixes in it

use axum::Router;

use crate::observability::metrics;
use crate::routing::module::{RouteLoadError, RouteModule};

/// Outcome of loading one module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEntry {
    pub name: String,
    /// Full mount path, API namespace included.
    pub prefix: String,
    pub outcome: Result<(), RouteLoadError>,
}

impl MountEntry {
    pub fn is_mounted(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Every module's mount outcome plus the combined router.
#[derive(Debug, Clone)]
pub struct RouteTable {
    entries: Vec<MountEntry>,
    router: Router,
}

impl RouteTable {
    pub fn load(api_prefix: &str, modules: &[Box<dyn RouteModule>]) -> Self {
        let base = api_prefix.trim_end_matches('/');
        let mut router = Router::new();
        let mut entries: Vec<MountEntry> = Vec::with_capacity(modules.len());

        for module in modules {
            let name = module.name().to_string();
            let prefix = format!("{base}{}", module.prefix());

            let outcome = check_prefix(module.as_ref(), &prefix, &entries).and_then(|()| module.load());

            let outcome = match outcome {
                Ok(module_router) => {
                    router = router.nest(&prefix, module_router);
                    tracing::info!(module = %name, prefix = %prefix, "Route module mounted");
                    Ok(())
                }
                Err(err) => {
                    tracing::error!(
                        module = %name,
                        prefix = %prefix,
                        error = %err,
                        "Failed to load route module, prefix left unmounted"
                    );
                    metrics::record_route_load_failure(&name);
                    Err(err)
                }
            };

            entries.push(MountEntry {
                name,
                prefix,
                outcome,
            });
        }

        Self { entries, router }
    }

    pub fn entries(&self) -> &[MountEntry] {
        &self.entries
    }

    /// Full prefixes of the modules that mounted, in load order.
    pub fn mounted_prefixes(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|entry| entry.is_mounted())
            .map(|entry| entry.prefix.clone())
            .collect()
    }

    /// Router containing every mounted module. It has no fallback of its own.
    pub fn router(&self) -> Router {
        self.router.clone()
    }
}

fn check_prefix(
    module: &dyn RouteModule,
    full_prefix: &str,
    mounted: &[MountEntry],
) -> Result<(), RouteLoadError> {
    let relative = module.prefix();
    let well_formed = relative.len() > 1
        && relative.starts_with('/')
        && !relative.ends_with('/')
        && !relative.contains(['{', '}', '*', '?', '#']);

    if !well_formed {
        return Err(RouteLoadError::InvalidPrefix {
            module: module.name().to_string(),
            prefix: relative.to_string(),
        });
    }

    if mounted
        .iter()
        .any(|entry| entry.is_mounted() && entry.prefix == full_prefix)
    {
        return Err(RouteLoadError::DuplicatePrefix {
            module: module.name().to_string(),
            prefix: full_prefix.to_string(),
        });
    }

    Ok(())
}
