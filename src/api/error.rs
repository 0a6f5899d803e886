//! API error handling.
//!
//! Every error response has the body `{"error": "<message>"}`. Backend
//! failure details are logged here and never sent to the client.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::infrastructure::RepositoryError;

// =============================================================================
// API Error
// =============================================================================

/// API error structure for JSON responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    /// Human-readable error message.
    pub error: String,
}

impl ApiError {
    /// Creates a new API error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}

// =============================================================================
// API Error Response
// =============================================================================

/// API error response containing status code and error body.
#[derive(Debug, Clone)]
pub struct ApiErrorResponse {
    /// HTTP status code.
    pub status: StatusCode,
    /// Error body.
    pub error: ApiError,
}

impl ApiErrorResponse {
    /// Creates a new API error response.
    #[must_use]
    pub const fn new(status: StatusCode, error: ApiError) -> Self {
        Self { status, error }
    }

    /// Creates a 400 Bad Request response.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, ApiError::new(message))
    }

    /// Creates a 404 Not Found response.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, ApiError::new(message))
    }

    /// Creates a 500 Internal Server Error response.
    #[must_use]
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, ApiError::new(message))
    }

    /// Maps a repository failure, logging backend errors with the operation
    /// that hit them.
    #[must_use]
    pub fn from_repository(operation: &'static str, error: RepositoryError) -> Self {
        match error {
            RepositoryError::NotFound(_) => Self::not_found("Contact not found"),
            RepositoryError::BackendUnavailable(cause) => {
                tracing::error!(operation, error = %cause, "Repository operation failed");
                Self::internal_error("Database error")
            }
        }
    }
}

impl IntoResponse for ApiErrorResponse {
    fn into_response(self) -> Response {
        (self.status, Json(self.error)).into_response()
    }
}

impl From<JsonRejection> for ApiErrorResponse {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!(rejection = %rejection.body_text(), "Rejected request body");
        Self::bad_request("Invalid JSON body")
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// First validation rule a request body failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ValidationError {
    /// Name of the offending field.
    pub field: &'static str,
    /// Client-facing message.
    pub message: String,
}

impl ValidationError {
    /// A required field is absent or blank.
    #[must_use]
    pub fn missing(field: &'static str) -> Self {
        Self {
            field,
            message: format!("Missing required field: {field}"),
        }
    }

    /// A field is present but malformed.
    #[must_use]
    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl From<ValidationError> for ApiErrorResponse {
    fn from(error: ValidationError) -> Self {
        Self::bad_request(error.message)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ContactId;
    use rstest::rstest;

    #[rstest]
    fn test_api_error_serializes_single_field() {
        let json = serde_json::to_value(ApiError::new("Not found")).unwrap();
        assert_eq!(json, serde_json::json!({"error": "Not found"}));
    }

    #[rstest]
    fn test_api_error_response_constructors() {
        assert_eq!(
            ApiErrorResponse::bad_request("bad").status,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiErrorResponse::not_found("gone").status,
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiErrorResponse::internal_error("boom").status,
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[rstest]
    fn test_not_found_hides_the_id() {
        let response = ApiErrorResponse::from_repository(
            "get_contact",
            RepositoryError::NotFound(ContactId::from("c-1")),
        );
        assert_eq!(response.status, StatusCode::NOT_FOUND);
        assert_eq!(response.error.error, "Contact not found");
    }

    #[rstest]
    fn test_backend_failure_hides_the_cause() {
        let response = ApiErrorResponse::from_repository(
            "list_contacts",
            RepositoryError::BackendUnavailable("connection refused to 10.0.0.1".to_string()),
        );
        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.error.error, "Database error");
    }

    #[rstest]
    #[case(ValidationError::missing("name"), "name", "Missing required field: name")]
    #[case(ValidationError::missing("email"), "email", "Missing required field: email")]
    #[case(
        ValidationError::invalid("email", "Invalid email format"),
        "email",
        "Invalid email format"
    )]
    fn test_validation_error_messages(
        #[case] error: ValidationError,
        #[case] field: &str,
        #[case] message: &str,
    ) {
        assert_eq!(error.field, field);
        assert_eq!(error.to_string(), message);

        let response: ApiErrorResponse = error.into();
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(response.error.error, message);
    }
}
