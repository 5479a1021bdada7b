//! RPC transport: `ExecuteFunction` and `ListFunctions` as JSON over `POST`.
//!
//! The message shapes mirror a service definition with string maps:
//!
//! ```text
//! ExecuteFunction { name, input: map<string,string> }
//!     -> { success, result: map<string,string> }
//! ListFunctions {} -> { functions: [ { name, description, runtime } ] }
//! ```
//!
//! Object results are flattened to strings field by field; any other result
//! is returned as `{"result": "<value>"}`.

use std::collections::BTreeMap;

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, instrument};

use fnhost_common::{FunctionInfo, FunctionInput};

use crate::response::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Clone, Deserialize)]
pub struct ExecuteFunctionRequest {
    pub name: String,
    #[serde(default)]
    pub input: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecuteFunctionResponse {
    pub success: bool,
    pub result: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListFunctionsResponse {
    pub functions: Vec<FunctionInfo>,
}

/// Routes served under the configured RPC prefix.
pub fn rpc_router() -> Router<AppState> {
    Router::new()
        .route("/ExecuteFunction", post(execute_function))
        .route("/ListFunctions", post(list_functions))
}

#[instrument(skip_all)]
async fn execute_function(
    State(state): State<AppState>,
    body: Result<Json<ExecuteFunctionRequest>, JsonRejection>,
) -> Result<Json<ExecuteFunctionResponse>, ApiResponse> {
    let Json(request) =
        body.map_err(|e| ApiResponse::error(StatusCode::BAD_REQUEST, e.body_text()))?;

    let input: FunctionInput = request
        .input
        .into_iter()
        .map(|(k, v)| (k, Value::String(v)))
        .collect();

    let result = state.execute(&request.name, input).await.map_err(|e| {
        error!(function = %request.name, error = %e, "RPC execution failed");
        ApiResponse::from_function_error(&e, Some("failed to execute function"))
    })?;

    Ok(Json(ExecuteFunctionResponse {
        success: true,
        result: flatten_result(&result),
    }))
}

async fn list_functions(State(state): State<AppState>) -> Json<ListFunctionsResponse> {
    Json(ListFunctionsResponse {
        functions: state.registry().list_functions(),
    })
}

/// Render a result as a string map.
pub fn flatten_result(result: &Value) -> BTreeMap<String, String> {
    match result {
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| (k.clone(), render(v)))
            .collect(),
        other => BTreeMap::from([("result".to_string(), render(other))]),
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
