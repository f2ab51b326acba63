use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use std::time::Duration;

use super::models::{ErrorDetail, ErrorEnvelope, TokenResponse};
use crate::catalog::{AuthError, CredentialRefresher};
use crate::config::{ACCOUNTS_URL, REQUEST_TIMEOUT_SECONDS};
use crate::models::{AccessToken, Member};

/// Refresh-token grant against the accounts service.
pub struct SpotifyTokenRefresher {
    client: Client,
    token_url: String,
    basic_auth: String,
}

impl SpotifyTokenRefresher {
    pub fn new(client_id: &str, client_secret: &str) -> Result<Self, AuthError> {
        Self::with_token_url(client_id, client_secret, ACCOUNTS_URL)
    }

    pub fn with_token_url(
        client_id: &str,
        client_secret: &str,
        token_url: &str,
    ) -> Result<Self, AuthError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECONDS))
            .build()?;

        Ok(Self {
            client,
            token_url: token_url.to_string(),
            basic_auth: basic_auth_header(client_id, client_secret),
        })
    }
}

pub(crate) fn basic_auth_header(client_id: &str, client_secret: &str) -> String {
    let raw = format!("{}:{}", client_id, client_secret);
    format!(
        "Basic {}",
        base64::engine::general_purpose::STANDARD.encode(raw)
    )
}

#[async_trait]
impl CredentialRefresher for SpotifyTokenRefresher {
    async fn refresh(&self, member: &Member) -> Result<AccessToken, AuthError> {
        let refresh_token = member
            .refresh_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AuthError::MissingRefreshToken(member.user_id.clone()))?;

        let response = self
            .client
            .post(&self.token_url)
            .header(reqwest::header::AUTHORIZATION, &self.basic_auth)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .map(|envelope| match envelope.error {
                    ErrorDetail::Api { message } => message,
                    ErrorDetail::Code(code) => code,
                })
                .unwrap_or(body);
            return Err(AuthError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let token: TokenResponse = response.json().await?;
        if token.access_token.is_empty() {
            return Err(AuthError::InvalidResponse(
                "Empty access token".to_string(),
            ));
        }

        log::debug!(
            "Refreshed access token for {} (expires in {:?}s)",
            member.user_id,
            token.expires_in
        );
        Ok(AccessToken::new(token.access_token))
    }
}
