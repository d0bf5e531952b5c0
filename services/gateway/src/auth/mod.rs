//! Authentication for the gateway
//!
//! Provides:
//! - JWT token issuance and validation
//! - Bearer middleware and identity extractors
//! - Credential hashing with Argon2
//! - Google and Facebook federated verification

pub mod federated;
pub mod jwt;
pub mod middleware;
pub mod password;

pub use federated::{FacebookVerifier, FederatedVerifier, GoogleVerifier};
pub use jwt::{Claims, TokenIssuer};
pub use middleware::{Authenticated, JwtAuth, MaybeAuthenticated};
pub use password::{random_credential, Argon2Hasher, CredentialHasher};
