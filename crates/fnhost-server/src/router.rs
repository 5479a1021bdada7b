//! HTTP router configuration.

use std::time::Duration;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handler::{
    get_function_metrics, get_metrics, health_check, list_functions, publish_event,
    readiness_check, run_function,
};
use crate::rpc::rpc_router;
use crate::state::AppState;

/// Build the application router.
///
/// Routes:
/// - `GET /health` - Health check
/// - `GET /ready` - Readiness check
/// - `GET /functions` - List registered functions
/// - `POST /run/:name` - Execute a function with a JSON object body
/// - `POST /events` - Publish an event
/// - `GET /metrics` - Metrics for all functions
/// - `GET /metrics/:name` - Metrics for one function
/// - `POST {rpc_prefix}/ExecuteFunction`, `POST {rpc_prefix}/ListFunctions`
///   when `rpc_prefix` is set
pub fn build_router(state: AppState, request_timeout: Duration, rpc_prefix: Option<&str>) -> Router {
    let function_routes = Router::new()
        .route("/functions", get(list_functions))
        .route("/run/:name", post(run_function));

    let event_routes = Router::new().route("/events", post(publish_event));

    let monitoring_routes = Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(get_metrics))
        .route("/metrics/:name", get(get_function_metrics));

    let mut router = Router::new()
        .merge(function_routes)
        .merge(event_routes)
        .merge(monitoring_routes);

    if let Some(prefix) = rpc_prefix {
        router = router.nest(prefix, rpc_router());
    }

    router
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(request_timeout))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
