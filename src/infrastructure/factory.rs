//! Repository factory for startup backend selection.
//!
//! The document store is used when its endpoint and API key are configured
//! and a connection can be established. Otherwise the service degrades to the
//! in-memory repository. The choice is made once; there is no reconnection.
//!
//! # Environment Variables
//!
//! - `CLOUDANT_URL`: document store endpoint
//! - `CLOUDANT_API_KEY`: IAM API key
//! - `CLOUDANT_DATABASE`: database name (default `contacts_db`)
//! - `CLOUDANT_IAM_URL`: IAM token endpoint
//! - `CLOUDANT_TIMEOUT_MS`: per-request timeout in milliseconds (default `10000`)
//!
//! # Example
//!
//! ```ignore
//! use infrastructure::factory::{RepositoryConfig, RepositoryFactory};
//!
//! let config = RepositoryConfig::from_env()?;
//! let repository = RepositoryFactory::new(config).create().await;
//! let contacts = repository.list_all().await?;
//! ```

use std::env;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Url;
use thiserror::Error;

use super::couch::{CouchClient, CouchError};
use super::iam::{DEFAULT_IAM_URL, IamAuthenticator};
use super::{ContactRepository, DocumentStoreContactRepository, InMemoryContactRepository};

/// Database used when `CLOUDANT_DATABASE` is unset.
pub const DEFAULT_DATABASE: &str = "contacts_db";

/// Request timeout used when `CLOUDANT_TIMEOUT_MS` is unset.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(10_000);

// =============================================================================
// Configuration Types
// =============================================================================

/// Configuration for the repository factory.
///
/// Use `RepositoryConfigBuilder` for a fluent API to construct this.
#[derive(Clone)]
pub struct RepositoryConfig {
    /// Document store endpoint. `None` selects in-memory storage.
    pub cloudant_url: Option<String>,
    /// IAM API key. `None` selects in-memory storage.
    pub cloudant_api_key: Option<String>,
    /// Database holding the contact documents.
    pub database: String,
    /// IAM token endpoint.
    pub iam_url: String,
    /// Timeout applied to every document store request.
    pub timeout: Duration,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            cloudant_url: None,
            cloudant_api_key: None,
            database: DEFAULT_DATABASE.to_string(),
            iam_url: DEFAULT_IAM_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl std::fmt::Debug for RepositoryConfig {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("RepositoryConfig")
            .field("cloudant_url", &self.cloudant_url.as_ref().map(|_| "<set>"))
            .field(
                "cloudant_api_key",
                &self.cloudant_api_key.as_ref().map(|_| "<redacted>"),
            )
            .field("database", &self.database)
            .field("iam_url", &self.iam_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl RepositoryConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> RepositoryConfigBuilder {
        RepositoryConfigBuilder::default()
    }

    /// Creates a configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` if a variable holds an invalid value.
    pub fn from_env() -> Result<Self, ConfigurationError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Creates a configuration from an arbitrary variable source.
    ///
    /// Empty and whitespace-only values count as unset.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` if a variable holds an invalid value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigurationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let timeout = match read("CLOUDANT_TIMEOUT_MS") {
            Some(value) => value
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|_| ConfigurationError::InvalidTimeout(value))?,
            None => DEFAULT_TIMEOUT,
        };

        let config = Self {
            cloudant_url: read("CLOUDANT_URL"),
            cloudant_api_key: read("CLOUDANT_API_KEY"),
            database: read("CLOUDANT_DATABASE").unwrap_or_else(|| DEFAULT_DATABASE.to_string()),
            iam_url: read("CLOUDANT_IAM_URL").unwrap_or_else(|| DEFAULT_IAM_URL.to_string()),
            timeout,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` if the database name or timeout is unusable.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if !is_valid_database_name(&self.database) {
            return Err(ConfigurationError::InvalidDatabaseName(
                self.database.clone(),
            ));
        }

        if self.timeout.is_zero() {
            return Err(ConfigurationError::InvalidTimeout("0".to_string()));
        }

        Ok(())
    }

    /// Returns the endpoint and API key when both are configured.
    #[must_use]
    pub fn document_store_credentials(&self) -> Option<(&str, &str)> {
        self.cloudant_url
            .as_deref()
            .zip(self.cloudant_api_key.as_deref())
    }
}

/// CouchDB database names: a lowercase letter followed by lowercase letters,
/// digits or any of `_$()+-/`.
fn is_valid_database_name(name: &str) -> bool {
    let mut characters = name.chars();
    characters
        .next()
        .is_some_and(|first| first.is_ascii_lowercase())
        && characters.all(|character| {
            character.is_ascii_lowercase()
                || character.is_ascii_digit()
                || "_$()+-/".contains(character)
        })
}

/// Builder for `RepositoryConfig`.
///
/// # Example
///
/// ```ignore
/// let config = RepositoryConfig::builder()
///     .cloudant_url("https://account.cloudantnosqldb.appdomain.cloud")
///     .cloudant_api_key("api-key")
///     .database("contacts_db")
///     .build()?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct RepositoryConfigBuilder {
    config: RepositoryConfig,
}

impl RepositoryConfigBuilder {
    /// Sets the document store endpoint.
    #[must_use]
    pub fn cloudant_url(mut self, url: impl Into<String>) -> Self {
        self.config.cloudant_url = Some(url.into());
        self
    }

    /// Sets the IAM API key.
    #[must_use]
    pub fn cloudant_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.config.cloudant_api_key = Some(api_key.into());
        self
    }

    /// Sets the database name.
    #[must_use]
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.config.database = database.into();
        self
    }

    /// Sets the IAM token endpoint.
    #[must_use]
    pub fn iam_url(mut self, url: impl Into<String>) -> Self {
        self.config.iam_url = url.into();
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` if the configuration is invalid.
    pub fn build(self) -> Result<RepositoryConfig, ConfigurationError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

// =============================================================================
// Error Types
// =============================================================================

/// Errors in the repository configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// `CLOUDANT_TIMEOUT_MS` is not a positive integer.
    #[error("Invalid CLOUDANT_TIMEOUT_MS: '{0}'. Expected a positive number of milliseconds")]
    InvalidTimeout(String),

    /// `CLOUDANT_DATABASE` is not a legal database name.
    #[error("Invalid CLOUDANT_DATABASE: '{0}'. Expected a lowercase CouchDB database name")]
    InvalidDatabaseName(String),
}

/// Errors that can occur while connecting to the document store.
#[derive(Debug, Error)]
pub enum FactoryError {
    /// Endpoint or API key is missing.
    #[error("CLOUDANT_URL and CLOUDANT_API_KEY are required for the document store")]
    MissingCredentials,

    /// `CLOUDANT_IAM_URL` does not parse.
    #[error("Invalid IAM token URL: {0}")]
    InvalidIamUrl(String),

    /// The HTTP client could not be built.
    #[error("HTTP client initialization failed: {0}")]
    HttpClient(String),

    /// The document store refused or failed the connection.
    #[error("Document store connection error: {0}")]
    DocumentStore(#[from] CouchError),
}

// =============================================================================
// Repository Factory
// =============================================================================

/// Selects and initializes the contact repository.
#[derive(Debug, Clone)]
pub struct RepositoryFactory {
    config: RepositoryConfig,
}

impl RepositoryFactory {
    /// Creates a new repository factory with the given configuration.
    #[must_use]
    pub const fn new(config: RepositoryConfig) -> Self {
        Self { config }
    }

    /// Creates the repository the service will use for its whole lifetime.
    ///
    /// Never fails: when the document store is not configured or cannot be
    /// reached, the reason is logged and an in-memory repository is returned.
    pub async fn create(&self) -> Arc<dyn ContactRepository> {
        if self.config.document_store_credentials().is_none() {
            tracing::warn!("Document store credentials not configured, using in-memory storage");
            return Arc::new(InMemoryContactRepository::new());
        }

        match self.connect_document_store().await {
            Ok(repository) => {
                tracing::info!(database = %self.config.database, "Connected to document store");
                Arc::new(repository)
            }
            Err(error) => {
                tracing::error!(
                    error = %error,
                    "Document store unavailable, falling back to in-memory storage"
                );
                Arc::new(InMemoryContactRepository::new())
            }
        }
    }

    /// Authenticates, ensures the configured database exists and returns a
    /// repository over it.
    ///
    /// # Errors
    ///
    /// Returns `FactoryError` if any step of the connection fails.
    pub async fn connect_document_store(
        &self,
    ) -> Result<DocumentStoreContactRepository, FactoryError> {
        let (endpoint, api_key) = self
            .config
            .document_store_credentials()
            .ok_or(FactoryError::MissingCredentials)?;

        let token_url = Url::parse(&self.config.iam_url)
            .map_err(|error| FactoryError::InvalidIamUrl(error.to_string()))?;

        let http = reqwest::Client::builder()
            .timeout(self.config.timeout)
            .build()
            .map_err(|error| FactoryError::HttpClient(error.to_string()))?;

        let authenticator =
            IamAuthenticator::new(http.clone(), token_url, api_key, self.config.timeout);
        let client = CouchClient::new(http, endpoint, Some(authenticator), self.config.timeout)?;

        client.connect().await?;

        let databases = client.list_databases().await?;
        if !databases.contains(&self.config.database) {
            client.create_database(&self.config.database).await?;
            tracing::info!(database = %self.config.database, "Created document store database");
        }

        Ok(DocumentStoreContactRepository::new(
            client.database(self.config.database.clone()),
        ))
    }
}

// =============================================================================
// Tests
// =============================================================================
