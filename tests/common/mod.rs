//! Common test helpers for integration tests.
//!
//! This module builds routers over chosen repositories and sends requests
//! through them without binding a socket.
//!
//! # Note
//!
//! The `#![allow(dead_code)]` attribute is necessary because Rust compiles each
//! integration test file as a separate crate, and not every file uses every
//! helper.

#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use futures::FutureExt;
use futures::future::BoxFuture;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use contact_management_api::api::{AppState, router};
use contact_management_api::domain::{Contact, ContactCandidate, ContactId};
use contact_management_api::infrastructure::{
    Backend, ContactRepository, InMemoryContactRepository, RepositoryError,
};

// =============================================================================
// Router Helpers
// =============================================================================

/// Creates a router over a fresh in-memory repository.
pub fn create_test_app() -> Router {
    create_app(Arc::new(InMemoryContactRepository::new()))
}

/// Creates a router over the given repository.
pub fn create_app(repository: Arc<dyn ContactRepository>) -> Router {
    router(AppState::new(repository))
}

/// Response status and decoded JSON body (`None` for an empty body).
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Option<Value>,
}

impl TestResponse {
    /// Returns the body, panicking if it is empty.
    pub fn json(&self) -> &Value {
        self.body.as_ref().expect("response body should be JSON")
    }

    /// Returns the `error` message of an error body.
    pub fn error_message(&self) -> &str {
        self.json()["error"]
            .as_str()
            .expect("error body should carry a message")
    }
}

/// Sends a request with an optional JSON body.
pub async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> TestResponse {
    match body {
        Some(value) => send_raw(app, method, uri, "application/json", value.to_string()).await,
        None => {
            let request = Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap();
            execute(app, request).await
        }
    }
}

/// Sends a request with an arbitrary body and content type.
pub async fn send_raw(
    app: &Router,
    method: Method,
    uri: &str,
    content_type: &str,
    body: impl Into<String>,
) -> TestResponse {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, content_type)
        .body(Body::from(body.into()))
        .unwrap();
    execute(app, request).await
}

async fn execute(app: &Router, request: Request<Body>) -> TestResponse {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        None
    } else {
        Some(serde_json::from_slice(&bytes).expect("response body should be valid JSON"))
    };
    TestResponse { status, body }
}

/// A complete contact payload.
pub fn john_doe() -> Value {
    serde_json::json!({
        "name": "John Doe",
        "email": "john@example.com",
        "phone": "+1-234-567-8900",
        "company": "Tech Corp"
    })
}

/// A validated candidate for repository-level tests.
pub fn candidate(name: &str, email: &str) -> ContactCandidate {
    ContactCandidate {
        name: name.to_string(),
        email: email.to_string(),
        phone: String::new(),
        company: String::new(),
    }
}

// =============================================================================
// Faulty Repositories
// =============================================================================

/// Repository whose every operation fails as if the backend were down.
#[derive(Debug, Default)]
pub struct FailingRepository;

fn unavailable<T: Send + 'static>() -> BoxFuture<'static, Result<T, RepositoryError>> {
    async { Err(RepositoryError::BackendUnavailable("connection reset".to_string())) }.boxed()
}

impl ContactRepository for FailingRepository {
    fn list_all(&self) -> BoxFuture<'static, Result<Vec<Contact>, RepositoryError>> {
        unavailable()
    }

    fn get(&self, _id: &ContactId) -> BoxFuture<'static, Result<Contact, RepositoryError>> {
        unavailable()
    }

    fn create(
        &self,
        _candidate: ContactCandidate,
    ) -> BoxFuture<'static, Result<Contact, RepositoryError>> {
        unavailable()
    }

    fn update(
        &self,
        _id: &ContactId,
        _candidate: ContactCandidate,
    ) -> BoxFuture<'static, Result<Contact, RepositoryError>> {
        unavailable()
    }

    fn delete(&self, _id: &ContactId) -> BoxFuture<'static, Result<(), RepositoryError>> {
        unavailable()
    }

    fn backend(&self) -> Backend {
        Backend::DocumentStore
    }
}

/// Repository that panics while serving any request.
#[derive(Debug, Default)]
pub struct PanickingRepository;

fn explode<T: Send + 'static>() -> BoxFuture<'static, Result<T, RepositoryError>> {
    async { panic!("repository invariant violated") }.boxed()
}

impl ContactRepository for PanickingRepository {
    fn list_all(&self) -> BoxFuture<'static, Result<Vec<Contact>, RepositoryError>> {
        explode()
    }

    fn get(&self, _id: &ContactId) -> BoxFuture<'static, Result<Contact, RepositoryError>> {
        explode()
    }

    fn create(
        &self,
        _candidate: ContactCandidate,
    ) -> BoxFuture<'static, Result<Contact, RepositoryError>> {
        explode()
    }

    fn update(
        &self,
        _id: &ContactId,
        _candidate: ContactCandidate,
    ) -> BoxFuture<'static, Result<Contact, RepositoryError>> {
        explode()
    }

    fn delete(&self, _id: &ContactId) -> BoxFuture<'static, Result<(), RepositoryError>> {
        explode()
    }

    fn backend(&self) -> Backend {
        Backend::InMemory
    }
}
