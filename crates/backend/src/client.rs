//! The single configured backend client handle.
//!
//! One [`BackendClient`] is built at startup from [`BackendConfig`] and cloned
//! into every repository, the auth API and the storage API. Cloning is cheap
//! (`Arc` inside).

use std::sync::Arc;

use reqwest::{Method, RequestBuilder, Response, StatusCode};
use secrecy::ExposeSecret;
use tracing::{debug, instrument};
use url::Url;

use crate::config::BackendConfig;
use crate::error::BackendError;
use crate::query::TableQuery;

const REST_PATH: &str = "rest/v1/";
const AUTH_PATH: &str = "auth/v1/";
const STORAGE_PATH: &str = "storage/v1/";

// =============================================================================
// BackendClient
// =============================================================================

/// HTTP client for the hosted backend's REST, auth and storage APIs.
#[derive(Clone)]
pub struct BackendClient {
    inner: Arc<BackendClientInner>,
}

struct BackendClientInner {
    http: reqwest::Client,
    base: Url,
    anon_key: String,
    bearer: String,
    storage_bucket: String,
}

impl std::fmt::Debug for BackendClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendClient")
            .field("base", &self.inner.base.as_str())
            .field("storage_bucket", &self.inner.storage_bucket)
            .finish_non_exhaustive()
    }
}

impl BackendClient {
    /// Build the client from configuration.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Http` if the underlying HTTP client cannot be
    /// constructed (TLS backend failure).
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.timeout)
            .timeout(config.timeout)
            .user_agent(concat!("numisma/", env!("CARGO_PKG_VERSION")))
            .build()?;

        // Url::join drops the last path segment unless the base ends in '/'
        let mut base = config.url.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        Ok(Self {
            inner: Arc::new(BackendClientInner {
                http,
                base,
                anon_key: config.anon_key.expose_secret().to_string(),
                bearer: config.bearer_key().to_string(),
                storage_bucket: config.storage_bucket.clone(),
            }),
        })
    }

    /// Start a query against a table.
    #[must_use]
    pub fn from(&self, table: &str) -> TableQuery {
        TableQuery::new(self.clone(), table)
    }

    /// Name of the bucket used for uploads.
    #[must_use]
    pub fn storage_bucket(&self) -> &str {
        &self.inner.storage_bucket
    }

    /// Base URL as configured.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base
    }

    /// URL of a table endpoint.
    pub(crate) fn rest_url(&self, table: &str) -> Result<Url, BackendError> {
        Ok(self.inner.base.join(REST_PATH)?.join(table)?)
    }

    /// URL of an auth endpoint (`signup`, `token`, `otp`, ...).
    pub(crate) fn auth_url(&self, path: &str) -> Result<Url, BackendError> {
        Ok(self.inner.base.join(AUTH_PATH)?.join(path)?)
    }

    /// URL of a storage endpoint.
    pub(crate) fn storage_url(&self, path: &str) -> Result<Url, BackendError> {
        Ok(self.inner.base.join(STORAGE_PATH)?.join(path)?)
    }

    /// Request carrying the API key and the server bearer token.
    pub(crate) fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.request_as(method, url, &self.inner.bearer)
    }

    /// Request carrying the API key and a user access token.
    pub(crate) fn request_as(&self, method: Method, url: Url, token: &str) -> RequestBuilder {
        self.inner
            .http
            .request(method, url)
            .header("apikey", &self.inner.anon_key)
            .bearer_auth(token)
    }

    /// Send a request and map non-success statuses to [`BackendError`].
    pub(crate) async fn send(&self, request: RequestBuilder) -> Result<Response, BackendError> {
        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(BackendError::RateLimited(retry_after));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(
                status = %status,
                body = %body.chars().take(500).collect::<String>(),
                "Backend returned non-success status"
            );
            return Err(BackendError::from_response(status, &body));
        }

        Ok(response)
    }

    /// Read a JSON body, logging the raw text on parse failure.
    pub(crate) async fn json<T: serde::de::DeserializeOwned>(
        response: Response,
    ) -> Result<T, BackendError> {
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %text.chars().take(500).collect::<String>(),
                "Failed to parse backend response"
            );
            BackendError::Parse(e)
        })
    }

    /// Check that the REST API answers.
    ///
    /// # Errors
    ///
    /// Returns the transport or status error if the backend is unreachable.
    #[instrument(skip(self))]
    pub async fn health(&self) -> Result<(), BackendError> {
        let url = self.inner.base.join(REST_PATH)?;
        self.send(self.request(Method::HEAD, url)).await?;
        debug!("Backend healthy");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use secrecy::SecretString;

    use super::*;

    fn client(url: &str) -> BackendClient {
        BackendClient::new(&BackendConfig {
            url: Url::parse(url).unwrap(),
            anon_key: SecretString::from("anon"),
            service_key: None,
            storage_bucket: "images".to_string(),
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    #[test]
    fn test_rest_url() {
        let c = client("https://abc.backend.test");
        assert_eq!(
            c.rest_url("coin_listings").unwrap().as_str(),
            "https://abc.backend.test/rest/v1/coin_listings"
        );
    }

    #[test]
    fn test_base_path_is_kept() {
        let c = client("https://proxy.test/numisma");
        assert_eq!(
            c.auth_url("token").unwrap().as_str(),
            "https://proxy.test/numisma/auth/v1/token"
        );
        assert_eq!(
            c.storage_url("object/images/a.png").unwrap().as_str(),
            "https://proxy.test/numisma/storage/v1/object/images/a.png"
        );
    }
}
