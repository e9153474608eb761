//! API error handling for the traceability endpoints

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::TraceError;
use crate::storage::StorageError;
use crate::validation::ValidationError;

/// Error body returned by every endpoint:
/// `{ "success": false, "error": ..., "code": ..., "details"?: ..., "timestamp": ... }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub success: bool,
    #[serde(rename = "error")]
    pub message: String,
    pub code: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    pub timestamp: u64,
}

impl ApiError {
    pub fn new(code: u16, message: String) -> Self {
        Self {
            success: false,
            message,
            code,
            details: None,
            timestamp: chrono::Utc::now().timestamp() as u64,
        }
    }

    pub fn with_details(code: u16, message: String, details: serde_json::Value) -> Self {
        Self {
            details: Some(details),
            ..Self::new(code, message)
        }
    }

    // Common error constructors
    pub fn bad_request(message: &str) -> Self {
        Self::new(400, message.to_string())
    }

    pub fn not_found(message: &str) -> Self {
        Self::new(404, message.to_string())
    }

    pub fn internal_server_error(message: &str) -> Self {
        Self::new(500, message.to_string())
    }

    pub fn service_unavailable(message: &str) -> Self {
        Self::new(503, message.to_string())
    }

    // Traceability errors
    pub fn product_not_found() -> Self {
        Self::not_found("Product not found")
    }

    pub fn unknown_action(action: &str) -> Self {
        Self::with_details(
            400,
            "Unknown action".to_string(),
            serde_json::json!({
                "action": action
            }),
        )
    }

    pub fn invalid_payload(action: &str, reason: &str) -> Self {
        Self::with_details(
            422,
            "Validation error".to_string(),
            serde_json::json!({
                "action": action,
                "reason": reason
            }),
        )
    }

    pub fn validation_error(err: &ValidationError) -> Self {
        Self::with_details(
            422,
            "Validation error".to_string(),
            serde_json::to_value(err).unwrap_or(serde_json::Value::Null),
        )
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "API Error {}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

/// Result type alias for API operations
pub type ApiResult<T> = Result<T, ApiError>;

impl From<TraceError> for ApiError {
    fn from(err: TraceError) -> Self {
        match err {
            TraceError::NotFound => Self::product_not_found(),
            TraceError::Validation(e) => Self::validation_error(&e),
            TraceError::Storage(StorageError::ConnectionError(reason)) => {
                Self::service_unavailable(&format!("Store unavailable: {}", reason))
            }
            TraceError::Storage(e) => {
                Self::internal_server_error(&format!("Internal server error: {}", e))
            }
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        Self::validation_error(&err)
    }
}

/// Body that is not JSON, or JSON without an `action`
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(&format!("Invalid request body: {}", rejection.body_text()))
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::bad_request(&format!("JSON parsing error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_shape() {
        let body = serde_json::to_value(ApiError::product_not_found()).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Product not found");
        assert_eq!(body["code"], 404);
        assert!(body.get("details").is_none());
        assert!(body["timestamp"].as_u64().unwrap() > 0);
    }

    #[test]
    fn test_trace_error_mapping() {
        assert_eq!(ApiError::from(TraceError::NotFound).code, 404);

        let invalid = TraceError::Validation(ValidationError::new("searchTerm", "must not be empty", None));
        let api = ApiError::from(invalid);
        assert_eq!(api.code, 422);
        assert_eq!(api.details.unwrap()["field"], "searchTerm");

        let down = TraceError::Storage(StorageError::ConnectionError("refused".into()));
        assert_eq!(ApiError::from(down).code, 503);

        let broken = TraceError::Storage(StorageError::InvalidData("bad row".into()));
        assert_eq!(ApiError::from(broken).code, 500);
    }

    #[test]
    fn test_into_response_status() {
        let response = ApiError::unknown_action("deleteEverything").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
