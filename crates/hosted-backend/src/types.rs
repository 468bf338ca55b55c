//! Request and response types for the hosted backend.

use serde::{Deserialize, Serialize};

/// Default request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Connection settings for a hosted backend project.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Project base URL (e.g. "https://abc.supabase.co")
    pub url: String,
    /// Public anonymous API key
    pub anon_key: String,
    /// Per-request timeout
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            anon_key: String::new(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Authenticated user as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Session issued by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub expires_in: i64,
    /// Absolute expiry as a unix timestamp, when the provider reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    pub refresh_token: String,
    pub user: User,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

impl Session {
    /// Whether the access token has expired at `now` (unix seconds).
    ///
    /// Sessions without an absolute expiry are treated as valid; the backend
    /// will reject them if they are not.
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Body of a one-time sign-in request.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct OtpRequest<'a> {
    pub email: &'a str,
    pub create_user: bool,
}

/// Body of a one-time code verification.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct VerifyRequest<'a> {
    #[serde(rename = "type")]
    pub verify_type: &'a str,
    pub email: &'a str,
    pub token: &'a str,
}

/// Body of a refresh-token grant.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct RefreshRequest<'a> {
    pub refresh_token: &'a str,
}
