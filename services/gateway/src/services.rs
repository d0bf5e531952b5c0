use crate::auth::{random_credential, CredentialHasher, FederatedVerifier, TokenIssuer};
use crate::errors::{GatewayError, Result};
use crate::metrics::LOGINS_TOTAL;
use crate::models::{
    AuthResponse, FacebookLoginRequest, GoogleLoginRequest, LoginRequest, RegisterRequest,
    UpdateProfileRequest,
};
use actix_web::web;
use exchange_core::{accounts::AccountView, Account, Exchange, Identity};
use std::sync::Arc;
use tracing::{info, warn};
use validator::Validate;

/// Identity issuance on top of the exchange
///
/// Owns credential hashing, federated verification and token signing so the
/// exchange core only ever sees opaque credential hashes and identities.
pub struct AuthService {
    exchange: Arc<Exchange>,
    tokens: TokenIssuer,
    hasher: Arc<dyn CredentialHasher>,
    google: Arc<dyn FederatedVerifier>,
    facebook: Arc<dyn FederatedVerifier>,
}

impl AuthService {
    pub fn new(
        exchange: Arc<Exchange>,
        tokens: TokenIssuer,
        hasher: Arc<dyn CredentialHasher>,
        google: Arc<dyn FederatedVerifier>,
        facebook: Arc<dyn FederatedVerifier>,
    ) -> Self {
        AuthService {
            exchange,
            tokens,
            hasher,
            google,
            facebook,
        }
    }

    fn respond(&self, account: Account) -> Result<AuthResponse> {
        let token = self.tokens.issue(&account)?;
        Ok(AuthResponse {
            token,
            user: AccountView::from(account),
        })
    }

    /// Create a credential account and issue its first token
    pub async fn register(&self, request: RegisterRequest) -> Result<AuthResponse> {
        request.validate()?;

        // Fail fast before paying for a hash
        if self.exchange.account_by_email(&request.email).is_some() {
            return Err(exchange_core::Error::InvalidOperation("User already exists".to_string()).into());
        }

        let hasher = self.hasher.clone();
        let password = request.password.clone();
        let credential_hash = web::block(move || hasher.hash(&password)).await??;

        let account = self
            .exchange
            .register(request.into_new_account(credential_hash))
            .await?;

        info!(account_id = %account.id, "Issued token for new account");
        self.respond(account)
    }

    /// Check a credential and issue a token
    pub async fn login(&self, request: LoginRequest) -> Result<AuthResponse> {
        request.validate()?;

        let invalid = || GatewayError::Unauthorized("Invalid Credentials".to_string());
        let account = self
            .exchange
            .account_by_email(&request.email)
            .ok_or_else(invalid)?;

        let hasher = self.hasher.clone();
        let stored = account.credential_hash.clone();
        let password = request.password;
        let matches = web::block(move || hasher.verify(&password, &stored)).await??;

        if !matches {
            warn!(account_id = %account.id, "Credential login rejected");
            return Err(invalid());
        }

        LOGINS_TOTAL.with_label_values(&["password"]).inc();
        self.respond(account)
    }

    pub async fn google_login(&self, request: GoogleLoginRequest) -> Result<AuthResponse> {
        request.validate()?;
        let profile = self.google.verify(&request.token).await?;
        let account = self.federated(profile).await?;

        LOGINS_TOTAL.with_label_values(&["google"]).inc();
        self.respond(account)
    }

    pub async fn facebook_login(&self, request: FacebookLoginRequest) -> Result<AuthResponse> {
        request.validate()?;
        let profile = self.facebook.verify(&request.access_token).await?;
        let account = self.federated(profile).await?;

        LOGINS_TOTAL.with_label_values(&["facebook"]).inc();
        self.respond(account)
    }

    async fn federated(
        &self,
        profile: exchange_core::accounts::FederatedProfile,
    ) -> Result<Account> {
        // New federated accounts get an unguessable credential
        let hasher = self.hasher.clone();
        let fallback = web::block(move || hasher.hash(&random_credential())).await??;

        Ok(self.exchange.federated_login(profile, fallback).await?)
    }

    /// Apply a profile update and issue a refreshed token
    pub async fn update_profile(
        &self,
        identity: &Identity,
        request: UpdateProfileRequest,
    ) -> Result<AuthResponse> {
        request.validate()?;
        let account = self
            .exchange
            .update_profile(identity, request.into())
            .await?;

        self.respond(account)
    }
}
