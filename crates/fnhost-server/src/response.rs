//! JSON responses and error status mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{Value, json};

use fnhost_common::FunctionError;

/// A JSON response with an explicit status.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl ApiResponse {
    /// A `200 OK` response.
    pub fn ok(body: Value) -> Self {
        Self::json(StatusCode::OK, body)
    }

    /// A response with any status.
    pub fn json(status: StatusCode, body: Value) -> Self {
        Self { status, body }
    }

    /// An error response: `{"error": message}`.
    pub fn error(status: StatusCode, message: impl Into<String>) -> Self {
        Self::json(status, json!({ "error": message.into() }))
    }

    /// Map a failed execution to a response.
    ///
    /// `context`, when given, is prefixed to the message.
    pub fn from_function_error(err: &FunctionError, context: Option<&str>) -> Self {
        let message = match context {
            Some(context) => format!("{context}: {err}"),
            None => err.to_string(),
        };
        Self::error(status_for(err), message)
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// HTTP status for an execution error.
///
/// Only a missing function is distinguished; anything a handler or the
/// engine reports is a server-side failure.
pub fn status_for(err: &FunctionError) -> StatusCode {
    if err.is_not_found() {
        StatusCode::NOT_FOUND
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fnhost_common::EngineError;

    #[test]
    fn test_error_body() {
        let resp = ApiResponse::error(StatusCode::BAD_REQUEST, "invalid request body");
        assert_eq!(resp.status, StatusCode::BAD_REQUEST);
        assert_eq!(resp.body, json!({"error": "invalid request body"}));
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for(&FunctionError::not_found("x")), StatusCode::NOT_FOUND);
        assert_eq!(
            status_for(&FunctionError::invalid_input("id is required")),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_for(&EngineError::NotInitialized.into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_from_function_error_with_context() {
        let resp = ApiResponse::from_function_error(
            &FunctionError::failed("boom"),
            Some("failed to execute function"),
        );
        assert_eq!(resp.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(resp.body["error"], "failed to execute function: boom");
    }

    #[test]
    fn test_into_response_status() {
        let resp = ApiResponse::ok(json!({"status": "ok"})).into_response();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
