//! HTTP handlers for the Contact Management API.
//!
//! Handlers validate input, call the repository selected at startup through
//! `AppState`, and map results to responses. Any repository failure is turned
//! into an `ApiErrorResponse` by `ApiErrorResponse::from_repository`.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};

use super::dto::{ContactRequest, ContactResponse, validate_contact};
use super::error::ApiErrorResponse;
use crate::domain::{ContactId, Timestamp};
use crate::infrastructure::ContactRepository;

// =============================================================================
// Application State
// =============================================================================

/// Shared application dependencies.
///
/// Holds a trait object so the backend chosen by `RepositoryFactory` at
/// startup can be either implementation.
#[derive(Clone)]
pub struct AppState {
    /// Contact repository for persistence.
    pub repository: Arc<dyn ContactRepository>,
}

impl AppState {
    /// Creates a new `AppState` around the active repository.
    #[must_use]
    pub fn new(repository: Arc<dyn ContactRepository>) -> Self {
        Self { repository }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("AppState")
            .field("backend", &self.repository.backend())
            .finish()
    }
}

// =============================================================================
// GET /api/contacts Handler
// =============================================================================

/// Lists every contact.
///
/// # Response
///
/// - **200 OK**: Array of contacts, `[]` when there are none
/// - **500 Internal Server Error**: Backend failure
///
/// # Errors
///
/// Returns `ApiErrorResponse` when the repository fails.
pub async fn list_contacts(
    State(state): State<AppState>,
) -> Result<Json<Vec<ContactResponse>>, ApiErrorResponse> {
    let contacts = state
        .repository
        .list_all()
        .await
        .map_err(|error| ApiErrorResponse::from_repository("list_contacts", error))?;

    Ok(Json(contacts.iter().map(ContactResponse::from).collect()))
}

// =============================================================================
// GET /api/contacts/{id} Handler
// =============================================================================

/// Fetches one contact.
///
/// # Response
///
/// - **200 OK**: The contact
/// - **404 Not Found**: No contact with this id
///
/// # Errors
///
/// Returns `ApiErrorResponse` when the contact is absent or the repository fails.
pub async fn get_contact(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ContactResponse>, ApiErrorResponse> {
    let contact = state
        .repository
        .get(&ContactId::from(id))
        .await
        .map_err(|error| ApiErrorResponse::from_repository("get_contact", error))?;

    Ok(Json(ContactResponse::from(contact)))
}

// =============================================================================
// POST /api/contacts Handler
// =============================================================================

/// Creates a contact.
///
/// # Request Body
///
/// ```json
/// {
///   "name": "John Doe",
///   "email": "john@example.com",
///   "phone": "+1-234-567-8900",
///   "company": "Tech Corp"
/// }
/// ```
///
/// # Response
///
/// - **201 Created**: The stored contact with its generated id
/// - **400 Bad Request**: Malformed body or validation failure
///
/// # Errors
///
/// Returns `ApiErrorResponse` when the body is invalid or the repository fails.
pub async fn create_contact(
    State(state): State<AppState>,
    payload: Result<Json<ContactRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ContactResponse>), ApiErrorResponse> {
    let Json(request) = payload?;
    let candidate = validate_contact(&request)?;

    let contact = state
        .repository
        .create(candidate)
        .await
        .map_err(|error| ApiErrorResponse::from_repository("create_contact", error))?;

    tracing::info!(contact_id = %contact.contact_id, "Created contact");
    Ok((StatusCode::CREATED, Json(ContactResponse::from(contact))))
}

// =============================================================================
// PUT /api/contacts/{id} Handler
// =============================================================================

/// Replaces the fields of an existing contact.
///
/// Validation runs before the repository is consulted, so an invalid body
/// for an unknown id yields 400 rather than 404.
///
/// # Response
///
/// - **200 OK**: The updated contact
/// - **400 Bad Request**: Malformed body or validation failure
/// - **404 Not Found**: No contact with this id
///
/// # Errors
///
/// Returns `ApiErrorResponse` when the body is invalid, the contact is absent
/// or the repository fails.
pub async fn update_contact(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<ContactRequest>, JsonRejection>,
) -> Result<Json<ContactResponse>, ApiErrorResponse> {
    let Json(request) = payload?;
    let candidate = validate_contact(&request)?;

    let contact = state
        .repository
        .update(&ContactId::from(id), candidate)
        .await
        .map_err(|error| ApiErrorResponse::from_repository("update_contact", error))?;

    tracing::info!(contact_id = %contact.contact_id, "Updated contact");
    Ok(Json(ContactResponse::from(contact)))
}

// =============================================================================
// DELETE /api/contacts/{id} Handler
// =============================================================================

/// Deletes a contact.
///
/// # Response
///
/// - **204 No Content**: Deleted
/// - **404 Not Found**: No contact with this id
///
/// # Errors
///
/// Returns `ApiErrorResponse` when the contact is absent or the repository fails.
pub async fn delete_contact(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiErrorResponse> {
    let contact_id = ContactId::from(id);
    state
        .repository
        .delete(&contact_id)
        .await
        .map_err(|error| ApiErrorResponse::from_repository("delete_contact", error))?;

    tracing::info!(contact_id = %contact_id, "Deleted contact");
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// GET /api/health Handler
// =============================================================================

/// Health check response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
    /// Time the check was answered.
    pub timestamp: String,
    /// True when the document store backs the service.
    pub database_connected: bool,
}

/// Health check endpoint.
///
/// Always answers 200; a degraded service reports `databaseConnected: false`.
///
/// ```json
/// {
///   "status": "healthy",
///   "timestamp": "2024-05-01T12:30:00.123456Z",
///   "databaseConnected": true
/// }
/// ```
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: Timestamp::now().to_string(),
        database_connected: state.repository.backend().is_durable(),
    })
}

// =============================================================================
// Tests
// =============================================================================
