use axum::{
    Router,
    extract::FromRef,
    http::HeaderName,
    routing::get,
};
use std::sync::Arc;

use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Ambient services: configuration, errors, authentication and validation collaborators.
pub mod auth;
pub mod config;
pub mod error;
pub mod validation;

// The per-request value and the route data model.
pub mod models;
pub mod request;

// Registration (validator, patterns, chains, registry, table) and the error pipeline.
pub mod pipeline;
pub mod routes;

// Built-in endpoints and the binary's own route modules.
pub mod handlers;
pub mod modules;

// --- Public Re-exports ---

pub use auth::{AuthOptions, SessionLoader};
pub use config::{AppConfig, Env};
pub use error::{ErrorKind, HttpError};
pub use models::{Handler, ModuleRoutes, RegisteredRoute, RouteDescriptor};
pub use pipeline::ErrorResponder;
pub use request::{Flow, RouteRequest};
pub use routes::{Catalog, ModuleSource, register_modules};
pub use validation::{ValidationOptions, ValidationSchemas};

use routes::registry::RouteRegistry;

/// AppState
///
/// Everything a request may need, assembled once at startup and shared read-only.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    /// The route table and the published listing, both frozen.
    pub catalog: Catalog,
    pub responder: ErrorResponder,
}

impl AppState {
    pub fn new(config: AppConfig, catalog: Catalog) -> Self {
        let responder = ErrorResponder::new(config.env);
        Self {
            config,
            catalog,
            responder,
        }
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

impl FromRef<AppState> for Arc<RouteRegistry> {
    fn from_ref(app_state: &AppState) -> Arc<RouteRegistry> {
        Arc::clone(&app_state.catalog.registry)
    }
}

/// create_router
///
/// Attaches the built-in endpoints, then the module route table as the fallback
/// (which ends in the error pipeline), then the observability layers.
pub fn create_router(state: AppState) -> Router {
    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        // GET /: discovery, answers with the service name.
        .route("/", get(handlers::service_name))
        // GET /ping: liveness.
        .route("/ping", get(handlers::ping))
        // GET /routes: every registered route.
        .route("/routes", get(handlers::list_routes))
        // Module routes, and every miss, go through the route table.
        .fallback(handlers::dispatch)
        .method_not_allowed_fallback(handlers::dispatch)
        .with_state(state);

    base_router.layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(trace_span_logger)
                    .on_response(
                        DefaultOnResponse::new()
                            .level(Level::INFO)
                            .latency_unit(tower_http::LatencyUnit::Millis),
                    ),
            )
            .layer(PropagateRequestIdLayer::new(x_request_id)),
    )
}

/// build_router
///
/// Register every module from `source` and build the router serving them. Routes are
/// complete before the returned router can see any traffic.
pub fn build_router(config: AppConfig, source: &impl ModuleSource) -> Router {
    let sessions = auth::session_loader(&config);
    let catalog = register_modules(source, sessions);
    tracing::info!(
        routes = catalog.registry.len(),
        env = ?config.env,
        "Route registration complete"
    );
    create_router(AppState::new(config, catalog))
}

/// trace_span_logger
///
/// Span for one request, correlated by its `x-request-id`.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
