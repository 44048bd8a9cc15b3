use async_trait::async_trait;
use thiserror::Error;

use crate::core::identity::{ApiPrincipal, SessionUser};

/// Error type for identity store operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum IdentityStoreError {
    /// The backing store could not be reached
    #[error("Identity store unavailable: {0}")]
    Unavailable(String),

    /// The referenced account does not exist
    #[error("Unknown account: {0}")]
    UnknownAccount(String),
}

/// Result type for identity store operations
pub type IdentityStoreResult<T> = Result<T, IdentityStoreError>;

/// Session credentials for private routes.
#[async_trait]
pub trait SessionStore: Send + Sync + 'static {
    /// Resolve a session token to its user. Expired or unknown tokens
    /// resolve to `None`.
    async fn lookup_session(&self, token: &str) -> IdentityStoreResult<Option<SessionUser>>;

    /// Open a session for `user`, returning the opaque token.
    async fn create_session(&self, user: &SessionUser) -> IdentityStoreResult<String>;

    /// Revoke a session. Returns whether it existed.
    async fn revoke_session(&self, token: &str) -> IdentityStoreResult<bool>;
}

/// API key credentials for public routes.
#[async_trait]
pub trait ApiKeyStore: Send + Sync + 'static {
    async fn lookup_key(&self, key: &str) -> IdentityStoreResult<Option<ApiPrincipal>>;

    /// Issue a new key for `owner`, returning `(secret, principal)`.
    async fn issue_key(&self, owner: &SessionUser)
    -> IdentityStoreResult<(String, ApiPrincipal)>;
}

/// Password check used by the sign-in handler.
#[async_trait]
pub trait CredentialVerifier: Send + Sync + 'static {
    async fn verify_password(
        &self,
        email: &str,
        password: &str,
    ) -> IdentityStoreResult<Option<SessionUser>>;
}
