use std::sync::Arc;

use axum::{
    Json,
    extract::{Request, State},
    response::{IntoResponse, Response},
};

use crate::{AppState, config::AppConfig, request::RouteRequest, routes::registry::RouteRegistry};

/// service_name
///
/// `GET /` answers with the service name so that callers can discover what they hit.
pub async fn service_name(State(config): State<AppConfig>) -> String {
    config.name
}

/// `GET /ping`, for monitoring and load balancer checks.
pub async fn ping() -> &'static str {
    "pong"
}

/// list_routes
///
/// `GET /routes`: every route accepted at startup, in registration order.
pub async fn list_routes(State(registry): State<Arc<RouteRegistry>>) -> Response {
    Json(registry.routes()).into_response()
}

/// dispatch
///
/// The fallback for everything the static routes above do not answer: hand the
/// request to the module route table, and any failure to the error pipeline.
pub async fn dispatch(State(state): State<AppState>, request: Request) -> Response {
    let request = match RouteRequest::from_http(request, state.config.body_limit).await {
        Ok(request) => request,
        Err(err) => return state.responder.respond(err),
    };
    match state.catalog.table.dispatch(request).await {
        Ok(response) => response,
        Err(err) => state.responder.respond(err),
    }
}
