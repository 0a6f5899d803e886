//! IBM Cloud IAM token exchange for the document store.
//!
//! An API key is exchanged for a short-lived bearer token. The token is
//! cached and exchanged again once it is within `REFRESH_MARGIN_SECONDS` of
//! its expiration.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use reqwest::Url;
use serde::Deserialize;
use tokio::sync::Mutex;

use super::couch::CouchError;

/// Default IAM token endpoint.
pub const DEFAULT_IAM_URL: &str = "https://iam.cloud.ibm.com/identity/token";

/// Grant type for API key exchange.
const APIKEY_GRANT_TYPE: &str = "urn:ibm:params:oauth:grant-type:apikey";

/// Tokens are renewed this many seconds before they expire.
const REFRESH_MARGIN_SECONDS: i64 = 60;

/// Token endpoint response. Only the fields used here are decoded.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    /// Expiration as UNIX seconds.
    expiration: i64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expiration: i64,
}

impl CachedToken {
    fn is_fresh(&self, now: i64) -> bool {
        now + REFRESH_MARGIN_SECONDS < self.expiration
    }
}

/// Exchanges an API key for bearer tokens and caches the current one.
#[derive(Clone)]
pub struct IamAuthenticator {
    client: reqwest::Client,
    token_url: Url,
    api_key: String,
    timeout: Duration,
    token: Arc<Mutex<Option<CachedToken>>>,
}

impl std::fmt::Debug for IamAuthenticator {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("IamAuthenticator")
            .field("token_url", &self.token_url.as_str())
            .field("api_key", &"<redacted>")
            .finish_non_exhaustive()
    }
}

impl IamAuthenticator {
    /// Creates an authenticator. No request is made until a token is needed.
    #[must_use]
    pub fn new(
        client: reqwest::Client,
        token_url: Url,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            token_url,
            api_key: api_key.into(),
            timeout,
            token: Arc::new(Mutex::new(None)),
        }
    }

    /// Returns a bearer token, exchanging the API key when the cached one is
    /// missing or about to expire.
    ///
    /// The lock is held across the exchange so concurrent callers share one
    /// request.
    ///
    /// # Errors
    ///
    /// Returns `CouchError::Authentication` when the exchange fails.
    pub async fn bearer_token(&self) -> Result<String, CouchError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref().filter(|token| token.is_fresh(Utc::now().timestamp()))
        {
            return Ok(token.access_token.clone());
        }

        let token = self.exchange().await?;
        let access_token = token.access_token.clone();
        *cached = Some(token);
        drop(cached);
        Ok(access_token)
    }

    async fn exchange(&self) -> Result<CachedToken, CouchError> {
        let response = self
            .client
            .post(self.token_url.clone())
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&[("grant_type", APIKEY_GRANT_TYPE), ("apikey", self.api_key.as_str())])
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|error| CouchError::Authentication(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CouchError::Authentication(format!(
                "token endpoint returned HTTP {status}"
            )));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|error| CouchError::Authentication(error.to_string()))?;

        tracing::debug!(expiration = body.expiration, "Obtained IAM access token");
        Ok(CachedToken {
            access_token: body.access_token,
            expiration: body.expiration,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
