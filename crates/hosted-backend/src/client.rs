//! Shared HTTP client for the record store and identity provider.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use url::Url;

use crate::auth::AuthApi;
use crate::error::BackendError;
use crate::query::QueryBuilder;
use crate::types::BackendConfig;

/// Path prefix of the record store API
const REST_PATH: &str = "rest/v1/";

/// Path prefix of the identity provider API
const AUTH_PATH: &str = "auth/v1/";

/// Client for the hosted backend.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Clone)]
pub struct Client {
    /// HTTP client for making requests
    http_client: reqwest::Client,
    /// Project base URL, always ending in `/`
    base_url: Url,
    /// Public anonymous key sent with every request
    anon_key: String,
}

impl Client {
    /// Create a new client.
    ///
    /// # Errors
    /// Returns `BackendError::ConfigError` if the URL or key is unusable.
    pub fn new(config: BackendConfig) -> Result<Self, BackendError> {
        if config.anon_key.trim().is_empty() {
            return Err(BackendError::ConfigError("anon key is empty".to_string()));
        }

        let mut raw = config.url.trim().to_string();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        let base_url = Url::parse(&raw)?;

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(BackendError::HttpError)?;

        Ok(Self {
            http_client,
            base_url,
            anon_key: config.anon_key,
        })
    }

    /// Identity provider operations.
    pub fn auth(&self) -> AuthApi<'_> {
        AuthApi::new(self)
    }

    /// Start a query against a record store table.
    pub fn from(&self, table: &str) -> QueryBuilder {
        QueryBuilder::new(self.clone(), table)
    }

    /// Build a record store URL for a table.
    pub(crate) fn rest_url(&self, table: &str) -> Result<Url, BackendError> {
        Ok(self.base_url.join(REST_PATH)?.join(table)?)
    }

    /// Build an identity provider URL for an endpoint.
    pub(crate) fn auth_url(&self, endpoint: &str) -> Result<Url, BackendError> {
        Ok(self.base_url.join(AUTH_PATH)?.join(endpoint)?)
    }

    /// Build headers, authenticating as `access_token` when given and as the
    /// anonymous role otherwise.
    pub(crate) fn build_headers(
        &self,
        access_token: Option<&str>,
    ) -> Result<HeaderMap, BackendError> {
        let bearer = access_token.unwrap_or(&self.anon_key);

        let mut headers = HeaderMap::new();
        headers.insert(
            "apikey",
            HeaderValue::from_str(&self.anon_key)
                .map_err(|e| BackendError::ConfigError(e.to_string()))?,
        );
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", bearer))
                .map_err(|e| BackendError::ConfigError(e.to_string()))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        Ok(headers)
    }

    /// Get the HTTP client.
    pub(crate) fn http_client(&self) -> &reqwest::Client {
        &self.http_client
    }

    /// Get the project base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }
}

/// Turn a non-success response into `BackendError::ApiError`.
///
/// Both services report errors as JSON objects but disagree on the field
/// name, so the first of `message`, `msg`, `error_description` and `error`
/// wins. A body that is not JSON is reported verbatim.
pub(crate) async fn check_status(
    response: reqwest::Response,
) -> Result<reqwest::Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|json| {
            ["message", "msg", "error_description", "error"]
                .iter()
                .find_map(|key| json.get(*key).and_then(|v| v.as_str()).map(str::to_string))
        })
        .unwrap_or(body);

    tracing::debug!(status = status.as_u16(), %message, "backend request rejected");

    Err(BackendError::ApiError {
        status: status.as_u16(),
        message,
    })
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(url: &str) -> BackendConfig {
        BackendConfig {
            url: url.to_string(),
            anon_key: "anon".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_urls_join_under_base_without_trailing_slash() {
        let client = Client::new(config("https://project.supabase.co")).unwrap();
        assert_eq!(
            client.rest_url("goals").unwrap().as_str(),
            "https://project.supabase.co/rest/v1/goals"
        );
        assert_eq!(
            client.auth_url("otp").unwrap().as_str(),
            "https://project.supabase.co/auth/v1/otp"
        );
    }

    #[test]
    fn test_urls_keep_base_path() {
        let client = Client::new(config("http://localhost:54321/proxy")).unwrap();
        assert_eq!(
            client.rest_url("entries").unwrap().as_str(),
            "http://localhost:54321/proxy/rest/v1/entries"
        );
    }

    #[test]
    fn test_empty_anon_key_is_rejected() {
        let mut cfg = config("https://project.supabase.co");
        cfg.anon_key = "  ".to_string();
        assert!(matches!(
            Client::new(cfg),
            Err(BackendError::ConfigError(_))
        ));
    }

    #[test]
    fn test_headers_fall_back_to_anon_key() {
        let client = Client::new(config("https://project.supabase.co")).unwrap();

        let headers = client.build_headers(None).unwrap();
        assert_eq!(headers["apikey"], "anon");
        assert_eq!(headers[AUTHORIZATION], "Bearer anon");

        let headers = client.build_headers(Some("user-token")).unwrap();
        assert_eq!(headers[AUTHORIZATION], "Bearer user-token");
    }
}
