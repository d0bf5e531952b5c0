//! Federated identity verification
//!
//! Each provider turns a client-supplied token into a verified profile.
//! Handlers only see the [`FederatedVerifier`] trait, so tests swap in a
//! stub without network access.

use crate::errors::{GatewayError, Result};
use async_trait::async_trait;
use exchange_core::accounts::{FederatedProfile, FederatedProvider};
use serde::Deserialize;
use std::time::Duration;

#[async_trait]
pub trait FederatedVerifier: Send + Sync {
    /// Verify `token` with the provider and return the profile it vouches for
    async fn verify(&self, token: &str) -> Result<FederatedProfile>;
}

fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .map_err(|e| GatewayError::Internal(format!("Failed to build HTTP client: {}", e)))
}

/// Google ID token verification via the tokeninfo endpoint
pub struct GoogleVerifier {
    client: reqwest::Client,
    tokeninfo_url: String,
    client_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleTokenInfo {
    sub: String,
    aud: String,
    email: Option<String>,
    #[serde(default)]
    email_verified: Option<String>,
    name: Option<String>,
}

impl GoogleVerifier {
    pub fn new(tokeninfo_url: String, client_id: Option<String>) -> Result<Self> {
        Ok(Self {
            client: http_client()?,
            tokeninfo_url,
            client_id,
        })
    }
}

#[async_trait]
impl FederatedVerifier for GoogleVerifier {
    async fn verify(&self, token: &str) -> Result<FederatedProfile> {
        let response = self
            .client
            .get(&self.tokeninfo_url)
            .query(&[("id_token", token)])
            .send()
            .await?;

        if !response.status().is_success() {
            tracing::warn!(status = %response.status(), "Google rejected ID token");
            return Err(GatewayError::Unauthorized("Invalid Google token".to_string()));
        }

        let info: GoogleTokenInfo = response.json().await?;

        if let Some(expected) = &self.client_id {
            if &info.aud != expected {
                tracing::warn!(aud = %info.aud, "Google token issued for another client");
                return Err(GatewayError::Unauthorized("Invalid Google token".to_string()));
            }
        }
        if info.email_verified.as_deref() == Some("false") {
            return Err(GatewayError::Unauthorized("Google e-mail not verified".to_string()));
        }
        let email = info
            .email
            .ok_or_else(|| GatewayError::Unauthorized("Google token has no e-mail".to_string()))?;

        Ok(FederatedProfile {
            provider: FederatedProvider::Google,
            subject: info.sub,
            name: info.name.unwrap_or_else(|| email.clone()),
            email,
        })
    }
}

/// Facebook access token verification via the Graph API
pub struct FacebookVerifier {
    client: reqwest::Client,
    graph_url: String,
}

#[derive(Debug, Deserialize)]
struct FacebookProfile {
    id: String,
    name: Option<String>,
    email: Option<String>,
}

impl FacebookVerifier {
    pub fn new(graph_url: String) -> Result<Self> {
        Ok(Self {
            client: http_client()?,
            graph_url,
        })
    }
}

#[async_trait]
impl FederatedVerifier for FacebookVerifier {
    async fn verify(&self, token: &str) -> Result<FederatedProfile> {
        let response = self
            .client
            .get(&self.graph_url)
            .query(&[("fields", "id,name,email"), ("access_token", token)])
            .send()
            .await?;

        if !response.status().is_success() {
            tracing::warn!(status = %response.status(), "Facebook rejected access token");
            return Err(GatewayError::Unauthorized("Invalid Facebook token".to_string()));
        }

        let profile: FacebookProfile = response.json().await?;
        let email = profile.email.ok_or_else(|| {
            GatewayError::Unauthorized("Facebook account has no e-mail".to_string())
        })?;

        Ok(FederatedProfile {
            provider: FederatedProvider::Facebook,
            subject: profile.id,
            name: profile.name.unwrap_or_else(|| email.clone()),
            email,
        })
    }
}
