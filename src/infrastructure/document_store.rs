//! Document-store-backed repository implementation.
//!
//! Each contact is stored as one JSON document whose `_id` is the contact id.
//! Field names in the store are snake_case (`created_at`, `updated_at`) so
//! records written by earlier deployments remain readable.
//!
//! Design and system documents (ids starting with `_`) share the database
//! but are never contacts: they are skipped by `list_all` and reported as
//! not found by the single-document operations.

use futures::FutureExt;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use super::couch::{CouchDatabase, CouchError};
use crate::domain::{Contact, ContactCandidate, ContactId, Timestamp};
use crate::infrastructure::{Backend, ContactRepository, RepositoryError};

// =============================================================================
// Contact Document
// =============================================================================

/// Stored shape of a contact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct ContactDocument {
    #[serde(rename = "_id")]
    id: ContactId,
    #[serde(rename = "_rev", default, skip_serializing_if = "Option::is_none")]
    rev: Option<String>,
    #[serde(default)]
    name: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    phone: String,
    #[serde(default)]
    company: String,
    created_at: Timestamp,
    updated_at: Timestamp,
}

impl ContactDocument {
    fn from_contact(contact: &Contact, rev: Option<String>) -> Self {
        Self {
            id: contact.contact_id.clone(),
            rev,
            name: contact.name.clone(),
            email: contact.email.clone(),
            phone: contact.phone.clone(),
            company: contact.company.clone(),
            created_at: contact.created_at,
            updated_at: contact.updated_at,
        }
    }

    /// Splits the document into the contact and its current revision.
    fn into_contact(self) -> (Contact, Option<String>) {
        let contact = Contact {
            contact_id: self.id,
            name: self.name,
            email: self.email,
            phone: self.phone,
            company: self.company,
            created_at: self.created_at,
            updated_at: self.updated_at,
        };
        (contact, self.rev)
    }
}

// =============================================================================
// Error Mapping
// =============================================================================

fn unavailable(error: &CouchError) -> RepositoryError {
    RepositoryError::BackendUnavailable(error.to_string())
}

fn for_document(id: &ContactId, error: &CouchError) -> RepositoryError {
    match error {
        CouchError::NotFound => RepositoryError::NotFound(id.clone()),
        other => unavailable(other),
    }
}

async fn fetch(
    database: &CouchDatabase,
    id: &ContactId,
) -> Result<ContactDocument, RepositoryError> {
    if id.is_reserved() {
        return Err(RepositoryError::NotFound(id.clone()));
    }
    database
        .get_document::<ContactDocument>(id.as_str())
        .await
        .map_err(|error| for_document(id, &error))
}

// =============================================================================
// Document Store Contact Repository
// =============================================================================

/// `ContactRepository` backed by a CouchDB-compatible database.
#[derive(Debug, Clone)]
pub struct DocumentStoreContactRepository {
    database: CouchDatabase,
}

impl DocumentStoreContactRepository {
    /// Creates a repository over an already selected database.
    #[must_use]
    pub const fn new(database: CouchDatabase) -> Self {
        Self { database }
    }
}

impl ContactRepository for DocumentStoreContactRepository {
    fn list_all(&self) -> BoxFuture<'static, Result<Vec<Contact>, RepositoryError>> {
        let database = self.database.clone();
        async move {
            let documents = database
                .all_documents()
                .await
                .map_err(|error| unavailable(&error))?;

            let contacts = documents
                .into_iter()
                .filter(|document| !document.id.starts_with('_'))
                .filter_map(|document| {
                    let document_id = document.id.clone();
                    match document.decode::<ContactDocument>() {
                        Ok(decoded) => Some(decoded.into_contact().0),
                        Err(error) => {
                            tracing::warn!(
                                %document_id,
                                %error,
                                "Skipping document that is not a readable contact"
                            );
                            None
                        }
                    }
                })
                .collect();
            Ok(contacts)
        }
        .boxed()
    }

    fn get(&self, id: &ContactId) -> BoxFuture<'static, Result<Contact, RepositoryError>> {
        let database = self.database.clone();
        let id = id.clone();
        async move { fetch(&database, &id).await.map(|document| document.into_contact().0) }
            .boxed()
    }

    fn create(
        &self,
        candidate: ContactCandidate,
    ) -> BoxFuture<'static, Result<Contact, RepositoryError>> {
        let database = self.database.clone();
        async move {
            let contact = Contact::create(ContactId::generate(), candidate, Timestamp::now());
            let document = ContactDocument::from_contact(&contact, None);

            database
                .create_document(&document)
                .await
                .map_err(|error| unavailable(&error))?;

            tracing::debug!(contact_id = %contact.contact_id, "Created contact document");
            Ok(contact)
        }
        .boxed()
    }

    fn update(
        &self,
        id: &ContactId,
        candidate: ContactCandidate,
    ) -> BoxFuture<'static, Result<Contact, RepositoryError>> {
        let database = self.database.clone();
        let id = id.clone();
        async move {
            let (existing, rev) = fetch(&database, &id).await?.into_contact();
            let updated = existing.apply_update(candidate, Timestamp::now());
            let document = ContactDocument::from_contact(&updated, rev);

            database
                .save_document(id.as_str(), &document)
                .await
                .map_err(|error| for_document(&id, &error))?;

            tracing::debug!(contact_id = %id, "Saved contact document");
            Ok(updated)
        }
        .boxed()
    }

    fn delete(&self, id: &ContactId) -> BoxFuture<'static, Result<(), RepositoryError>> {
        let database = self.database.clone();
        let id = id.clone();
        async move {
            let document = fetch(&database, &id).await?;
            let rev = document.rev.unwrap_or_default();

            database
                .delete_document(id.as_str(), &rev)
                .await
                .map_err(|error| for_document(&id, &error))?;

            tracing::debug!(contact_id = %id, "Deleted contact document");
            Ok(())
        }
        .boxed()
    }

    fn backend(&self) -> Backend {
        Backend::DocumentStore
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::couch::CouchClient;
    use mockito::{Matcher, Server};
    use rstest::rstest;
    use serde_json::json;
    use std::time::Duration;

    fn repository(server: &Server) -> DocumentStoreContactRepository {
        let client = CouchClient::new(
            reqwest::Client::new(),
            &server.url(),
            None,
            Duration::from_secs(5),
        )
        .unwrap();
        DocumentStoreContactRepository::new(client.database("contacts_db"))
    }

    fn candidate() -> ContactCandidate {
        ContactCandidate {
            name: "John Doe".to_string(),
            email: "john@example.com".to_string(),
            phone: "+1-234-567-8900".to_string(),
            company: "Tech Corp".to_string(),
        }
    }

    fn stored(id: &str, rev: &str) -> serde_json::Value {
        json!({
            "_id": id,
            "_rev": rev,
            "name": "John Doe",
            "email": "john@example.com",
            "phone": "+1-234-567-8900",
            "company": "Tech Corp",
            "created_at": "2024-05-01T12:30:00.123456",
            "updated_at": "2024-05-01T12:30:00.123456"
        })
    }

    // -------------------------------------------------------------------------
    // Document Tests
    // -------------------------------------------------------------------------

    #[rstest]
    fn test_document_defaults_missing_optional_fields() {
        let document: ContactDocument = serde_json::from_value(json!({
            "_id": "legacy",
            "_rev": "1-a",
            "name": "Legacy",
            "email": "legacy@example.com",
            "created_at": "2023-01-01T00:00:00",
            "updated_at": "2023-01-01T00:00:00"
        }))
        .unwrap();

        let (contact, rev) = document.into_contact();

        assert_eq!(rev.as_deref(), Some("1-a"));
        assert!(contact.phone.is_empty());
        assert!(contact.company.is_empty());
        assert_eq!(contact.created_at.to_string(), "2023-01-01T00:00:00.000000Z");
    }

    #[rstest]
    fn test_new_document_omits_revision() {
        let contact = Contact::create(ContactId::from("c-1"), candidate(), Timestamp::now());

        let value = serde_json::to_value(ContactDocument::from_contact(&contact, None)).unwrap();

        assert_eq!(value["_id"], "c-1");
        assert!(value.get("_rev").is_none());
        assert!(value.get("created_at").is_some());
    }

    // -------------------------------------------------------------------------
    // Repository Tests
    // -------------------------------------------------------------------------

    #[rstest]
    #[tokio::test]
    async fn test_list_all_skips_design_documents() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/contacts_db/_all_docs")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "total_rows": 2,
                    "offset": 0,
                    "rows": [
                        {"id": "_design/views", "key": "_design/views", "value": {"rev": "1-d"},
                         "doc": {"_id": "_design/views", "views": {}}},
                        {"id": "c-1", "key": "c-1", "value": {"rev": "1-a"}, "doc": stored("c-1", "1-a")}
                    ]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let contacts = repository(&server).list_all().await.unwrap();

        assert_eq!(contacts.len(), 1);
        assert_eq!(contacts[0].contact_id.as_str(), "c-1");
    }

    #[rstest]
    #[tokio::test]
    async fn test_list_all_skips_unreadable_documents() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/contacts_db/_all_docs")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "total_rows": 3,
                    "offset": 0,
                    "rows": [
                        {"id": "c-1", "key": "c-1", "value": {"rev": "1-a"}, "doc": stored("c-1", "1-a")},
                        {"id": "notimes", "key": "notimes", "value": {"rev": "1-b"},
                         "doc": {"_id": "notimes", "_rev": "1-b", "name": "B", "email": "b@c"}},
                        {"id": "badtimes", "key": "badtimes", "value": {"rev": "1-c"},
                         "doc": {"_id": "badtimes", "_rev": "1-c", "name": "C", "email": "c@d",
                                 "created_at": "yesterday", "updated_at": "today"}}
                    ]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let contacts = repository(&server).list_all().await.unwrap();

        assert_eq!(contacts.len(), 1);
        assert_eq!(contacts[0].contact_id.as_str(), "c-1");
    }

    #[rstest]
    #[tokio::test]
    async fn test_get_missing_document_is_not_found() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/contacts_db/missing")
            .with_status(404)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error":"not_found","reason":"missing"}"#)
            .create_async()
            .await;

        let result = repository(&server).get(&ContactId::from("missing")).await;

        assert_eq!(result, Err(RepositoryError::NotFound(ContactId::from("missing"))));
    }

    #[rstest]
    #[tokio::test]
    async fn test_update_missing_document_is_not_found() {
        let mut server = Server::new_async().await;
        let _get = server
            .mock("GET", "/contacts_db/missing")
            .with_status(404)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error":"not_found","reason":"deleted"}"#)
            .create_async()
            .await;
        let save = server
            .mock("PUT", "/contacts_db/missing")
            .expect(0)
            .create_async()
            .await;

        let result = repository(&server)
            .update(&ContactId::from("missing"), candidate())
            .await;

        assert_eq!(result, Err(RepositoryError::NotFound(ContactId::from("missing"))));
        save.assert_async().await;
    }

    #[rstest]
    #[tokio::test]
    async fn test_reserved_ids_never_reach_the_store() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", Matcher::Any)
            .expect(0)
            .create_async()
            .await;
        let repository = repository(&server);
        let id = ContactId::from("_design/views");

        assert_eq!(
            repository.get(&id).await,
            Err(RepositoryError::NotFound(id.clone()))
        );
        assert_eq!(
            repository.delete(&id).await,
            Err(RepositoryError::NotFound(id.clone()))
        );
        mock.assert_async().await;
    }

    #[rstest]
    #[tokio::test]
    async fn test_create_posts_document() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/contacts_db")
            .match_body(Matcher::PartialJson(json!({
                "name": "John Doe",
                "email": "john@example.com",
                "company": "Tech Corp"
            })))
            .with_status(201)
            .with_header("content-type", "application/json")
            .with_body(r#"{"ok":true,"id":"ignored","rev":"1-a"}"#)
            .create_async()
            .await;

        let contact = repository(&server).create(candidate()).await.unwrap();

        assert_eq!(contact.created_at, contact.updated_at);
        assert_eq!(contact.name, "John Doe");
        mock.assert_async().await;
    }

    #[rstest]
    #[tokio::test]
    async fn test_update_saves_with_current_revision() {
        let mut server = Server::new_async().await;
        let _get = server
            .mock("GET", "/contacts_db/c-1")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(stored("c-1", "2-current").to_string())
            .create_async()
            .await;
        let save = server
            .mock("PUT", "/contacts_db/c-1")
            .match_body(Matcher::PartialJson(json!({
                "_id": "c-1",
                "_rev": "2-current",
                "name": "Jane Doe",
                "created_at": "2024-05-01T12:30:00.123456Z"
            })))
            .with_status(201)
            .with_header("content-type", "application/json")
            .with_body(r#"{"ok":true,"id":"c-1","rev":"3-next"}"#)
            .create_async()
            .await;

        let replacement = ContactCandidate {
            name: "Jane Doe".to_string(),
            ..candidate()
        };
        let updated = repository(&server)
            .update(&ContactId::from("c-1"), replacement)
            .await
            .unwrap();

        assert_eq!(updated.name, "Jane Doe");
        assert!(updated.updated_at > updated.created_at);
        save.assert_async().await;
    }

    #[rstest]
    #[tokio::test]
    async fn test_delete_uses_fetched_revision() {
        let mut server = Server::new_async().await;
        let _get = server
            .mock("GET", "/contacts_db/c-1")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(stored("c-1", "4-latest").to_string())
            .create_async()
            .await;
        let delete = server
            .mock("DELETE", "/contacts_db/c-1")
            .match_query(Matcher::UrlEncoded("rev".into(), "4-latest".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"ok":true,"id":"c-1","rev":"5-gone"}"#)
            .create_async()
            .await;

        let result = repository(&server).delete(&ContactId::from("c-1")).await;

        assert_eq!(result, Ok(()));
        delete.assert_async().await;
    }

    #[rstest]
    #[case(500, r#"{"error":"internal_server_error","reason":"boom"}"#)]
    #[case(409, r#"{"error":"conflict","reason":"Document update conflict."}"#)]
    #[case(200, "not json")]
    #[tokio::test]
    async fn test_store_failures_are_backend_unavailable(
        #[case] status: usize,
        #[case] body: &str,
    ) {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/contacts_db")
            .with_status(status)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create_async()
            .await;

        let result = repository(&server).create(candidate()).await;

        assert!(matches!(result, Err(RepositoryError::BackendUnavailable(_))));
    }

    #[rstest]
    fn test_backend_is_document_store() {
        let client = CouchClient::new(
            reqwest::Client::new(),
            "http://localhost:5984",
            None,
            Duration::from_secs(1),
        )
        .unwrap();
        let repository = DocumentStoreContactRepository::new(client.database("contacts_db"));

        assert_eq!(repository.backend(), Backend::DocumentStore);
    }
}
