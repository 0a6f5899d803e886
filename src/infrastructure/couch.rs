//! Minimal CouchDB HTTP client.
//!
//! Covers exactly what the contact repository needs from a CouchDB-compatible
//! document store (IBM Cloudant included): authenticate, list and create
//! databases, select a database, and get/create/save/delete/iterate its
//! documents.
//!
//! # Endpoints
//!
//! - `GET /_all_dbs` - list databases
//! - `PUT /{db}` - create database
//! - `GET /{db}/{id}` - fetch document
//! - `POST /{db}` - create document
//! - `PUT /{db}/{id}` - save document revision
//! - `DELETE /{db}/{id}?rev={rev}` - delete document
//! - `GET /{db}/_all_docs?include_docs=true` - iterate documents (paged)

use std::time::Duration;

use reqwest::{Method, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::iam::IamAuthenticator;

/// Rows fetched per `_all_docs` request.
const DEFAULT_PAGE_SIZE: usize = 200;

// =============================================================================
// Couch Error
// =============================================================================

/// Errors returned by the document store client.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CouchError {
    /// The document or database does not exist.
    #[error("Document not found")]
    NotFound,

    /// The revision supplied is not the current one.
    #[error("Document update conflict")]
    Conflict,

    /// Token exchange failed or the store rejected the credentials.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Connection, timeout or other transport failure.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Any other non-success response.
    #[error("Unexpected HTTP status {status}: {reason}")]
    Status { status: u16, reason: String },

    /// The response body could not be decoded.
    #[error("Malformed response: {0}")]
    Decode(String),

    /// The configured endpoint is not a usable base URL.
    #[error("Invalid document store URL: {0}")]
    InvalidUrl(String),
}

impl From<reqwest::Error> for CouchError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            Self::Decode(error.to_string())
        } else {
            Self::Transport(error.to_string())
        }
    }
}

/// Error body CouchDB sends with non-success responses.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
    #[serde(default)]
    reason: String,
}

/// Body of a successful document write.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DocumentRevision {
    pub id: String,
    pub rev: String,
}

/// A document as returned by database iteration, not yet decoded.
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub id: String,
    pub body: serde_json::Value,
}

impl RawDocument {
    /// Decodes the document body.
    ///
    /// # Errors
    ///
    /// Returns `CouchError::Decode` when the body does not match `T`.
    pub fn decode<T: DeserializeOwned>(self) -> Result<T, CouchError> {
        serde_json::from_value(self.body)
            .map_err(|error| CouchError::Decode(format!("document {}: {error}", self.id)))
    }
}

#[derive(Debug, Deserialize)]
struct AllDocsResponse {
    rows: Vec<AllDocsRow>,
}

#[derive(Debug, Deserialize)]
struct AllDocsRow {
    id: String,
    #[serde(default)]
    doc: Option<serde_json::Value>,
}

// =============================================================================
// Couch Client
// =============================================================================

/// Client for a CouchDB-compatible server.
///
/// Cheap to clone; clones share the HTTP connection pool and the cached token.
#[derive(Debug, Clone)]
pub struct CouchClient {
    http: reqwest::Client,
    base_url: Url,
    authenticator: Option<IamAuthenticator>,
    timeout: Duration,
}

impl CouchClient {
    /// Creates a client for `endpoint`.
    ///
    /// Credentials embedded in the URL are discarded; authentication goes
    /// through the authenticator when one is given.
    ///
    /// # Errors
    ///
    /// Returns `CouchError::InvalidUrl` if the endpoint is not an http(s) URL.
    pub fn new(
        http: reqwest::Client,
        endpoint: &str,
        authenticator: Option<IamAuthenticator>,
        timeout: Duration,
    ) -> Result<Self, CouchError> {
        let mut base_url =
            Url::parse(endpoint).map_err(|error| CouchError::InvalidUrl(error.to_string()))?;

        if !matches!(base_url.scheme(), "http" | "https") || base_url.cannot_be_a_base() {
            return Err(CouchError::InvalidUrl(format!(
                "unsupported endpoint '{}'",
                base_url.as_str()
            )));
        }

        // Only fails for cannot-be-a-base URLs, which are rejected above.
        let _ = base_url.set_username("");
        let _ = base_url.set_password(None);
        base_url.set_query(None);
        base_url.set_fragment(None);

        Ok(Self {
            http,
            base_url,
            authenticator,
            timeout,
        })
    }

    /// Returns the endpoint without credentials.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Establishes the session by obtaining a bearer token.
    ///
    /// A no-op for unauthenticated clients.
    ///
    /// # Errors
    ///
    /// Returns `CouchError::Authentication` if the token exchange fails.
    pub async fn connect(&self) -> Result<(), CouchError> {
        if let Some(authenticator) = &self.authenticator {
            authenticator.bearer_token().await?;
        }
        Ok(())
    }

    /// Lists the names of all databases on the server.
    ///
    /// # Errors
    ///
    /// Returns `CouchError` on transport or status failure.
    pub async fn list_databases(&self) -> Result<Vec<String>, CouchError> {
        let url = self.url(&["_all_dbs"]);
        let response = self.request(Method::GET, url).await?.send().await?;
        read_json(response).await
    }

    /// Creates a database. An already existing database is not an error.
    ///
    /// # Errors
    ///
    /// Returns `CouchError` on transport or status failure.
    pub async fn create_database(&self, name: &str) -> Result<(), CouchError> {
        let url = self.url(&[name]);
        let response = self.request(Method::PUT, url).await?.send().await?;
        if response.status() == StatusCode::PRECONDITION_FAILED {
            return Ok(());
        }
        read_json::<serde_json::Value>(response).await.map(|_| ())
    }

    /// Selects a database. No request is made.
    #[must_use]
    pub fn database(&self, name: impl Into<String>) -> CouchDatabase {
        CouchDatabase {
            client: self.clone(),
            name: name.into(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn request(&self, method: Method, url: Url) -> Result<RequestBuilder, CouchError> {
        let builder = self
            .http
            .request(method, url)
            .header(reqwest::header::ACCEPT, "application/json")
            .timeout(self.timeout);

        match &self.authenticator {
            Some(authenticator) => Ok(builder.bearer_auth(authenticator.bearer_token().await?)),
            None => Ok(builder),
        }
    }
}

// =============================================================================
// Couch Database
// =============================================================================

/// Handle to a single database.
#[derive(Debug, Clone)]
pub struct CouchDatabase {
    client: CouchClient,
    name: String,
    page_size: usize,
}

impl CouchDatabase {
    /// Overrides how many rows each iteration request fetches.
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Fetches a document by id.
    ///
    /// # Errors
    ///
    /// Returns `CouchError::NotFound` if the document does not exist.
    pub async fn get_document<T: DeserializeOwned>(&self, id: &str) -> Result<T, CouchError> {
        let url = self.client.url(&[&self.name, id]);
        let response = self.client.request(Method::GET, url).await?.send().await?;
        read_json(response).await
    }

    /// Creates a document. The body carries its own `_id`.
    ///
    /// # Errors
    ///
    /// Returns `CouchError::Conflict` if a document with that id exists.
    pub async fn create_document<T: Serialize + Sync>(
        &self,
        document: &T,
    ) -> Result<DocumentRevision, CouchError> {
        let url = self.client.url(&[&self.name]);
        let response = self
            .client
            .request(Method::POST, url)
            .await?
            .json(document)
            .send()
            .await?;
        read_json(response).await
    }

    /// Saves a new revision of an existing document. The body must carry the
    /// current `_rev`.
    ///
    /// # Errors
    ///
    /// Returns `CouchError::Conflict` if the revision is stale.
    pub async fn save_document<T: Serialize + Sync>(
        &self,
        id: &str,
        document: &T,
    ) -> Result<DocumentRevision, CouchError> {
        let url = self.client.url(&[&self.name, id]);
        let response = self
            .client
            .request(Method::PUT, url)
            .await?
            .json(document)
            .send()
            .await?;
        read_json(response).await
    }

    /// Deletes the given revision of a document.
    ///
    /// # Errors
    ///
    /// Returns `CouchError::NotFound` or `CouchError::Conflict` as reported by the store.
    pub async fn delete_document(&self, id: &str, rev: &str) -> Result<(), CouchError> {
        let url = self.client.url(&[&self.name, id]);
        let response = self
            .client
            .request(Method::DELETE, url)
            .await?
            .query(&[("rev", rev)])
            .send()
            .await?;
        read_json::<serde_json::Value>(response).await.map(|_| ())
    }

    /// Iterates over every document in the database, in key order.
    ///
    /// Pages through `_all_docs` `page_size` rows at a time, fetching one extra
    /// row to learn the next start key.
    ///
    /// # Errors
    ///
    /// Returns `CouchError` if any page request fails.
    pub async fn all_documents(&self) -> Result<Vec<RawDocument>, CouchError> {
        let mut documents = Vec::new();
        let mut start_key: Option<String> = None;

        loop {
            let mut query = vec![
                ("include_docs", "true".to_string()),
                ("limit", (self.page_size + 1).to_string()),
            ];
            if let Some(key) = &start_key {
                let encoded = serde_json::to_string(key)
                    .map_err(|error| CouchError::Decode(error.to_string()))?;
                query.push(("startkey", encoded));
            }

            let url = self.client.url(&[&self.name, "_all_docs"]);
            let response = self
                .client
                .request(Method::GET, url)
                .await?
                .query(&query)
                .send()
                .await?;
            let mut page: AllDocsResponse = read_json(response).await?;

            start_key = if page.rows.len() > self.page_size {
                page.rows.pop().map(|row| row.id)
            } else {
                None
            };

            documents.extend(
                page.rows
                    .into_iter()
                    .filter_map(|row| row.doc.map(|body| RawDocument { id: row.id, body })),
            );

            if start_key.is_none() {
                return Ok(documents);
            }
        }
    }
}

/// Maps the response status to `CouchError` and decodes a successful body.
async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, CouchError> {
    let status = response.status();
    if status.is_success() {
        return response
            .json()
            .await
            .map_err(|error| CouchError::Decode(error.to_string()));
    }

    match status {
        StatusCode::NOT_FOUND => Err(CouchError::NotFound),
        StatusCode::CONFLICT => Err(CouchError::Conflict),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Err(CouchError::Authentication(format!("HTTP {status}")))
        }
        _ => {
            let text = response.text().await.unwrap_or_default();
            let reason = serde_json::from_str::<ErrorBody>(&text)
                .map(|body| format!("{}: {}", body.error, body.reason))
                .unwrap_or(text);
            Err(CouchError::Status {
                status: status.as_u16(),
                reason,
            })
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
