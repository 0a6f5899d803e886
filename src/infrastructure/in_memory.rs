//! In-memory repository implementation.
//!
//! This is the degraded mode the service falls back to when the document
//! store cannot be reached at startup. Contacts live only as long as the
//! process does.
//!
//! # Features
//!
//! - Thread-safe with `Arc<RwLock<...>>`
//! - Each operation holds the lock for its full read-modify-write
//! - Listing is ordered by `created_at`, then id

use std::collections::HashMap;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::RwLock;

use crate::domain::{Contact, ContactCandidate, ContactId, Timestamp};
use crate::infrastructure::{Backend, ContactRepository, RepositoryError};

// =============================================================================
// In-Memory Contact Repository
// =============================================================================

/// In-memory implementation of `ContactRepository`.
///
/// # Example
///
/// ```ignore
/// use infrastructure::in_memory::InMemoryContactRepository;
///
/// let repository = InMemoryContactRepository::new();
/// let contact = repository.create(candidate).await?;
/// let found = repository.get(&contact.contact_id).await?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryContactRepository {
    contacts: Arc<RwLock<HashMap<ContactId, Contact>>>,
}

impl InMemoryContactRepository {
    /// Creates a new empty in-memory contact repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[allow(clippy::significant_drop_tightening)]
impl ContactRepository for InMemoryContactRepository {
    fn list_all(&self) -> BoxFuture<'static, Result<Vec<Contact>, RepositoryError>> {
        let contacts = Arc::clone(&self.contacts);
        async move {
            let guard = contacts.read().await;
            let mut all_contacts: Vec<Contact> = guard.values().cloned().collect();
            drop(guard);

            all_contacts.sort_by(|left, right| {
                left.created_at
                    .cmp(&right.created_at)
                    .then_with(|| left.contact_id.cmp(&right.contact_id))
            });
            Ok(all_contacts)
        }
        .boxed()
    }

    fn get(&self, id: &ContactId) -> BoxFuture<'static, Result<Contact, RepositoryError>> {
        let contacts = Arc::clone(&self.contacts);
        let id = id.clone();
        async move {
            let guard = contacts.read().await;
            guard
                .get(&id)
                .cloned()
                .ok_or(RepositoryError::NotFound(id))
        }
        .boxed()
    }

    fn create(
        &self,
        candidate: ContactCandidate,
    ) -> BoxFuture<'static, Result<Contact, RepositoryError>> {
        let contacts = Arc::clone(&self.contacts);
        async move {
            let mut guard = contacts.write().await;

            // A v4 collision is astronomically unlikely, but the id must stay unique.
            let mut contact_id = ContactId::generate();
            while guard.contains_key(&contact_id) {
                contact_id = ContactId::generate();
            }

            let contact = Contact::create(contact_id, candidate, Timestamp::now());
            guard.insert(contact.contact_id.clone(), contact.clone());
            tracing::debug!(contact_id = %contact.contact_id, "Created contact in memory");
            Ok(contact)
        }
        .boxed()
    }

    fn update(
        &self,
        id: &ContactId,
        candidate: ContactCandidate,
    ) -> BoxFuture<'static, Result<Contact, RepositoryError>> {
        let contacts = Arc::clone(&self.contacts);
        let id = id.clone();
        async move {
            let mut guard = contacts.write().await;
            let Some(existing) = guard.remove(&id) else {
                return Err(RepositoryError::NotFound(id));
            };

            let updated = existing.apply_update(candidate, Timestamp::now());
            guard.insert(id, updated.clone());
            tracing::debug!(contact_id = %updated.contact_id, "Updated contact in memory");
            Ok(updated)
        }
        .boxed()
    }

    fn delete(&self, id: &ContactId) -> BoxFuture<'static, Result<(), RepositoryError>> {
        let contacts = Arc::clone(&self.contacts);
        let id = id.clone();
        async move {
            let mut guard = contacts.write().await;
            if guard.remove(&id).is_some() {
                tracing::debug!(contact_id = %id, "Deleted contact from memory");
                Ok(())
            } else {
                Err(RepositoryError::NotFound(id))
            }
        }
        .boxed()
    }

    fn backend(&self) -> Backend {
        Backend::InMemory
    }
}

// =============================================================================
// Tests
// =============================================================================
