//! API module for HTTP handlers.
//!
//! This module contains route definitions and request/response handlers.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod routes;

pub use dto::{ContactRequest, ContactResponse, validate_contact};
pub use error::{ApiError, ApiErrorResponse, ValidationError};
pub use handlers::{
    AppState, HealthResponse, create_contact, delete_contact, get_contact, health_check,
    list_contacts, update_contact,
};
pub use routes::router;
