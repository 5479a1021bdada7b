//! HTTP request handlers.
//!
//! Handlers translate between JSON over HTTP and the registry, bus, and
//! metrics collector in [`AppState`].

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::Serialize;
use serde_json::{Map, Value, json};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use fnhost_host::{Event, EventContext};

use crate::response::ApiResponse;
use crate::state::AppState;

/// Event published after every successful `POST /run/:name`.
pub const FUNCTION_EXECUTED: &str = "function.executed";

/// Health check handler.
pub async fn health_check() -> ApiResponse {
    ApiResponse::ok(json!({ "status": "ok" }))
}

/// Readiness check handler.
pub async fn readiness_check(State(state): State<AppState>) -> ApiResponse {
    let registry = state.registry();

    ApiResponse::ok(json!({
        "status": "ready",
        "functions_loaded": registry.len(),
        "bytecode_engine": registry.engine().is_some(),
    }))
}

/// List registered functions.
pub async fn list_functions(State(state): State<AppState>) -> ApiResponse {
    ApiResponse::ok(json!({ "functions": state.registry().list_functions() }))
}

/// Execute a function with the JSON object in the request body.
///
/// On success the result is returned as-is and a `function.executed` event
/// carrying `{function, input, result}` is published.
#[instrument(skip(state, body), fields(function = %name))]
pub async fn run_function(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResponse {
    let request_id = Uuid::new_v4().to_string();

    let input = match body {
        Ok(Json(Value::Object(input))) => input,
        Ok(Json(_)) => {
            return ApiResponse::error(StatusCode::BAD_REQUEST, "request body must be a JSON object");
        }
        Err(rejection) => {
            warn!(request_id = %request_id, error = %rejection, "Rejected request body");
            return ApiResponse::error(StatusCode::BAD_REQUEST, "invalid request body");
        }
    };

    info!(request_id = %request_id, "Handling function request");

    let result = match state.execute(&name, input.clone()).await {
        Ok(result) => result,
        Err(e) => {
            error!(request_id = %request_id, error = %e, "Function execution failed");
            return ApiResponse::from_function_error(&e, Some("error executing function"));
        }
    };

    let mut payload = Map::new();
    payload.insert("function".into(), json!(name));
    payload.insert("input".into(), Value::Object(input));
    payload.insert("result".into(), result.clone());

    let bus = state.bus().clone();
    let ctx = EventContext::with_request_id(request_id.clone());
    let published = tokio::task::spawn_blocking(move || {
        bus.publish(&ctx, &Event::new(FUNCTION_EXECUTED, payload))
    })
    .await;

    match published {
        Ok(errors) if !errors.is_empty() => {
            warn!(request_id = %request_id, failures = errors.len(), "function.executed subscribers failed");
        }
        Ok(_) => {}
        Err(e) => warn!(request_id = %request_id, error = %e, "Publishing function.executed failed"),
    }

    ApiResponse::ok(result)
}

/// Publish an event: `{"type": .., "payload": {..}}`.
pub async fn publish_event(
    State(state): State<AppState>,
    body: Result<Json<Event>, JsonRejection>,
) -> ApiResponse {
    let Ok(Json(event)) = body else {
        return ApiResponse::error(StatusCode::BAD_REQUEST, "invalid request body");
    };

    let bus = state.bus().clone();
    let errors = tokio::task::spawn_blocking(move || bus.publish(&EventContext::new(), &event))
        .await
        .map(|errors| errors.iter().map(ToString::to_string).collect::<Vec<_>>());

    match errors {
        Ok(errors) => ApiResponse::ok(json!({ "status": "published", "errors": errors })),
        Err(e) => ApiResponse::error(StatusCode::INTERNAL_SERVER_ERROR, format!("publish failed: {e}")),
    }
}

/// Metrics for every function that has executed.
pub async fn get_metrics(State(state): State<AppState>) -> ApiResponse {
    serialize(&state.metrics().get_metrics()).map_or_else(
        |e| e,
        |metrics| ApiResponse::ok(json!({ "metrics": metrics })),
    )
}

/// Metrics for one function; 404 when it has never executed.
pub async fn get_function_metrics(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResponse {
    let Some(metrics) = state.metrics().get_function_metrics(&name) else {
        return ApiResponse::error(
            StatusCode::NOT_FOUND,
            format!("no metrics recorded for function {name}"),
        );
    };

    serialize(&metrics).map_or_else(|e| e, ApiResponse::ok)
}

fn serialize<T: Serialize>(value: &T) -> Result<Value, ApiResponse> {
    serde_json::to_value(value).map_err(|e| {
        ApiResponse::error(StatusCode::INTERNAL_SERVER_ERROR, format!("serialization failed: {e}"))
    })
}
