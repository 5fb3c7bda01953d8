//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Load route modules once and build the Axum router
//! - Wire up the admission pipeline in its fixed order
//! - Serve health, static uploads and the not-found fallback
//! - Bind to a listener and shut down gracefully
//!
//! # Design Decisions
//! - Layers are applied innermost first; see `http::middleware` for the
//!   resulting order
//! - The router is built once; `router()` hands out clones for in-process
//!   use
//! - The only mutable state is the database readiness gate

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{handler::Handler, middleware, routing::get, Router};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    catch_panic::CatchPanicLayer, compression::CompressionLayer, services::ServeDir,
    trace::TraceLayer,
};

use crate::config::{ApiConfig, Environment};
use crate::database::{DatabaseConnector, ReadinessGate, TcpConnector};
use crate::http::handlers;
use crate::http::middleware::{
    handle_panic, origin_gate, parse_body, require_database, track_requests, translate_errors,
};
use crate::http::request::{propagate_request_id_layer, set_request_id_layer};
use crate::lifecycle::startup;
use crate::routing::{MountEntry, RouteModule, RouteTable, UpstreamModule};
use crate::security::{cors, BodyLimit, OriginPolicy};

/// Shared, read-only pipeline state handed to every stage.
#[derive(Clone)]
pub struct AppState {
    pub origin_policy: Arc<OriginPolicy>,
    pub body_limit: BodyLimit,
    pub readiness: Arc<ReadinessGate>,
    pub environment: Environment,
    pub mounted: Arc<[String]>,
}

/// The FinBug API server.
pub struct ApiServer {
    router: Router,
    config: ApiConfig,
    readiness: Arc<ReadinessGate>,
    mounts: Vec<MountEntry>,
}

impl ApiServer {
    /// Build the server from explicit collaborators.
    pub fn new(
        config: ApiConfig,
        connector: Arc<dyn DatabaseConnector>,
        modules: Vec<Box<dyn RouteModule>>,
    ) -> Self {
        let readiness = Arc::new(ReadinessGate::new(connector));
        let table = RouteTable::load(&config.routes.api_prefix, &modules);

        let state = AppState {
            origin_policy: Arc::new(OriginPolicy::from_config(&config.cors)),
            body_limit: BodyLimit::new(config.limits.max_body_bytes),
            readiness: Arc::clone(&readiness),
            environment: config.environment,
            mounted: table.mounted_prefixes().into(),
        };

        tracing::info!(
            environment = ?config.environment,
            cors_mode = ?state.origin_policy.mode(),
            allowed_origins = state.origin_policy.allowed().len(),
            mounted = state.mounted.len(),
            failed = table.entries().len() - state.mounted.len(),
            "Admission pipeline configured"
        );

        let router = Self::build_router(&config, &table, state);
        Self {
            router,
            config,
            readiness,
            mounts: table.entries().to_vec(),
        }
    }

    /// Build the server with the TCP database connector and the six
    /// standard upstream modules. A bad database URI surfaces as 503s on
    /// the API routes, not as a startup failure.
    pub fn from_config(config: ApiConfig) -> Self {
        let connector = Arc::new(TcpConnector::from_config(&config.database));
        let modules = UpstreamModule::standard(&config.routes);
        Self::new(config, connector, modules)
    }

    fn build_router(config: &ApiConfig, table: &RouteTable, state: AppState) -> Router {
        let mut app = Router::new()
            .route("/", get(handlers::health))
            .route("/api", get(handlers::health))
            .fallback(handlers::not_found)
            .with_state(state.clone())
            .merge(table.router());

        if let Some(dir) = &config.uploads.dir {
            tracing::info!(dir = %dir.display(), "Serving static uploads");
            let not_found = handlers::not_found.with_state(state.clone());
            app = app.nest_service("/uploads", ServeDir::new(dir).fallback(not_found));
        }

        app.layer(middleware::from_fn_with_state(state.clone(), require_database))
            .layer(middleware::from_fn_with_state(state.clone(), parse_body))
            .layer(CatchPanicLayer::custom(handle_panic))
            .layer(cors::cors_layer())
            .layer(middleware::from_fn_with_state(state.clone(), origin_gate))
            .layer(middleware::from_fn_with_state(state, translate_errors))
            .layer(CompressionLayer::new())
            .layer(middleware::from_fn(track_requests))
            .layer(TraceLayer::new_for_http())
            .layer(propagate_request_id_layer())
            .layer(set_request_id_layer())
    }

    /// A clone of the fully layered router, for in-process requests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn readiness(&self) -> Arc<ReadinessGate> {
        Arc::clone(&self.readiness)
    }

    /// Load outcome of every route module.
    pub fn mounts(&self) -> &[MountEntry] {
        &self.mounts
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    /// Serve until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        if self.config.database.eager_connect {
            startup::spawn_eager_connect(Arc::clone(&self.readiness));
        }

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
