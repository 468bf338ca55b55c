//! Identity provider endpoints.

use crate::client::{check_status, Client};
use crate::error::BackendError;
use crate::types::{OtpRequest, RefreshRequest, Session, VerifyRequest};

/// Email one-time-password flow and session maintenance.
pub struct AuthApi<'a> {
    client: &'a Client,
}

impl<'a> AuthApi<'a> {
    pub(crate) fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// Request a one-time sign-in link (and code) for `email`.
    ///
    /// `redirect_to` is where the link lands after the user follows it.
    pub async fn send_otp(&self, email: &str, redirect_to: Option<&str>) -> Result<(), BackendError> {
        let mut url = self.client.auth_url("otp")?;
        if let Some(redirect) = redirect_to {
            url.query_pairs_mut().append_pair("redirect_to", redirect);
        }

        tracing::debug!(%url, "requesting one-time sign-in");

        let response = self
            .client
            .http_client()
            .post(url)
            .headers(self.client.build_headers(None)?)
            .json(&OtpRequest {
                email,
                create_user: true,
            })
            .send()
            .await?;

        check_status(response).await?;
        Ok(())
    }

    /// Exchange the emailed one-time code for a session.
    pub async fn verify_otp(&self, email: &str, code: &str) -> Result<Session, BackendError> {
        let url = self.client.auth_url("verify")?;

        let response = self
            .client
            .http_client()
            .post(url)
            .headers(self.client.build_headers(None)?)
            .json(&VerifyRequest {
                verify_type: "email",
                email,
                token: code.trim(),
            })
            .send()
            .await?;

        let response = check_status(response).await?;
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Obtain a fresh session from a refresh token.
    pub async fn refresh(&self, refresh_token: &str) -> Result<Session, BackendError> {
        let mut url = self.client.auth_url("token")?;
        url.query_pairs_mut()
            .append_pair("grant_type", "refresh_token");

        let response = self
            .client
            .http_client()
            .post(url)
            .headers(self.client.build_headers(None)?)
            .json(&RefreshRequest { refresh_token })
            .send()
            .await?;

        let response = check_status(response).await?;
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Revoke the session behind `access_token`.
    pub async fn sign_out(&self, access_token: &str) -> Result<(), BackendError> {
        let url = self.client.auth_url("logout")?;

        let response = self
            .client
            .http_client()
            .post(url)
            .headers(self.client.build_headers(Some(access_token))?)
            .send()
            .await?;

        check_status(response).await?;
        Ok(())
    }
}
