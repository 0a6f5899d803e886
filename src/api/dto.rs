//! Data Transfer Objects for API requests and responses.
//!
//! This module contains DTOs that are separate from domain models,
//! providing a clean API contract.

use serde::{Deserialize, Serialize};

use super::error::ValidationError;
use crate::domain::{Contact, ContactCandidate};

// =============================================================================
// Contact DTOs
// =============================================================================

/// Request DTO for creating or replacing a contact.
///
/// Every field is optional at this layer so that absence can be reported
/// with a field-level message instead of a generic decode failure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContactRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
}

/// Response DTO for a contact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactResponse {
    /// Contact ID.
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub company: String,
    /// Creation timestamp (RFC 3339, UTC).
    pub created_at: String,
    /// Last update timestamp (RFC 3339, UTC).
    pub updated_at: String,
}

impl From<&Contact> for ContactResponse {
    fn from(contact: &Contact) -> Self {
        Self {
            id: contact.contact_id.to_string(),
            name: contact.name.clone(),
            email: contact.email.clone(),
            phone: contact.phone.clone(),
            company: contact.company.clone(),
            created_at: contact.created_at.to_string(),
            updated_at: contact.updated_at.to_string(),
        }
    }
}

impl From<Contact> for ContactResponse {
    fn from(contact: Contact) -> Self {
        Self::from(&contact)
    }
}

// =============================================================================
// Validation
// =============================================================================

fn trimmed(value: Option<&str>) -> String {
    value.map(str::trim).unwrap_or_default().to_string()
}

/// Validates a contact request and produces the trimmed candidate.
///
/// # Validation Rules
///
/// - `name` must be present and non-blank
/// - `email` must be present, non-blank and contain `@`
/// - `phone` and `company` default to empty
///
/// Rules are checked in that order and the first failure is returned.
///
/// # Errors
///
/// Returns the `ValidationError` of the first failing rule.
pub fn validate_contact(request: &ContactRequest) -> Result<ContactCandidate, ValidationError> {
    let name = trimmed(request.name.as_deref());
    if name.is_empty() {
        return Err(ValidationError::missing("name"));
    }

    let email = trimmed(request.email.as_deref());
    if email.is_empty() {
        return Err(ValidationError::missing("email"));
    }
    if !email.contains('@') {
        return Err(ValidationError::invalid("email", "Invalid email format"));
    }

    Ok(ContactCandidate {
        name,
        email,
        phone: trimmed(request.phone.as_deref()),
        company: trimmed(request.company.as_deref()),
    })
}

// =============================================================================
// Tests
// =============================================================================
