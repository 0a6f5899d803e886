//! Repository trait for contacts.
//!
//! Every method returns a boxed `'static` future so implementations can be
//! shared behind `Arc<dyn ContactRepository>` and selected at runtime.

use futures::future::BoxFuture;
use thiserror::Error;

use crate::domain::{Contact, ContactCandidate, ContactId};

// =============================================================================
// Repository Error
// =============================================================================

/// Errors that can occur during repository operations.
///
/// Implementations translate every backend-specific failure into one of these
/// variants before it leaves the repository.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    /// No contact exists with the given id.
    #[error("Contact not found: {0}")]
    NotFound(ContactId),

    /// The durable store failed to service the request.
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),
}

// =============================================================================
// Backend
// =============================================================================

/// Which storage implementation is serving requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Networked document store.
    DocumentStore,
    /// Transient in-process map used when the document store is unreachable.
    InMemory,
}

impl Backend {
    /// Returns true when contacts are persisted durably.
    #[must_use]
    pub const fn is_durable(self) -> bool {
        matches!(self, Self::DocumentStore)
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DocumentStore => formatter.write_str("document_store"),
            Self::InMemory => formatter.write_str("in_memory"),
        }
    }
}

// =============================================================================
// Contact Repository
// =============================================================================

/// Repository trait for `Contact` entities.
///
/// Both implementations must behave identically from the caller's point of
/// view; only `backend` tells them apart.
pub trait ContactRepository: Send + Sync {
    /// Returns every persisted contact, in an order that is stable for the
    /// lifetime of the implementation.
    fn list_all(&self) -> BoxFuture<'static, Result<Vec<Contact>, RepositoryError>>;

    /// Finds a contact by id.
    ///
    /// Returns `RepositoryError::NotFound` when no such contact exists.
    fn get(&self, id: &ContactId) -> BoxFuture<'static, Result<Contact, RepositoryError>>;

    /// Persists a new contact built from the candidate.
    ///
    /// The repository generates the id and stamps `created_at == updated_at`.
    fn create(
        &self,
        candidate: ContactCandidate,
    ) -> BoxFuture<'static, Result<Contact, RepositoryError>>;

    /// Replaces the mutable fields of an existing contact.
    ///
    /// `id` and `created_at` are preserved and `updated_at` is refreshed.
    /// Returns `RepositoryError::NotFound` when no such contact exists.
    fn update(
        &self,
        id: &ContactId,
        candidate: ContactCandidate,
    ) -> BoxFuture<'static, Result<Contact, RepositoryError>>;

    /// Removes a contact permanently.
    ///
    /// Not idempotent: deleting an absent id returns `RepositoryError::NotFound`.
    fn delete(&self, id: &ContactId) -> BoxFuture<'static, Result<(), RepositoryError>>;

    /// Reports which storage implementation this is.
    fn backend(&self) -> Backend;
}

// =============================================================================
// Tests
// =============================================================================
