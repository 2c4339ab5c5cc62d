//! Identity backend port
//!
//! The external service of record for credentials and token issuance. The
//! facade and its adapters consume the backend only through this trait; the
//! crate bundles a REST implementation ([`rest`](crate::backend::rest)) and
//! an in-memory one ([`memory`](crate::backend::memory)) for tests and local
//! development.

use crate::error::BackendError;
use async_trait::async_trait;

/// Snapshot of the backend's view of an account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendUser {
    /// Stable account identifier, unique and never reused
    pub uid: String,
    /// Email as held by the backend, if any
    pub email: Option<String>,
    /// Display name as held by the backend, if any
    pub display_name: Option<String>,
    /// Avatar URL as held by the backend, if any
    pub photo_url: Option<String>,
    /// Whether the backend considers the email verified
    pub email_verified: bool,
}

/// A credential presented to the backend for authentication.
#[derive(Debug, Clone)]
pub enum Credential {
    /// Email and password pair
    EmailPassword {
        /// Account email
        email: String,
        /// Account password
        password: String,
    },

    /// Federated credential from an external identity provider
    OAuth {
        /// Provider identifier, e.g. `google.com` or `apple.com`
        provider_id: String,
        /// OIDC identity token, if the provider issued one
        id_token: Option<String>,
        /// OAuth access token, if the provider issued one
        access_token: Option<String>,
        /// Raw nonce bound into the signed token, for replay protection
        raw_nonce: Option<String>,
    },
}

impl Credential {
    /// Provider identifier for this credential
    pub fn provider_id(&self) -> &str {
        match self {
            Credential::EmailPassword { .. } => "password",
            Credential::OAuth { provider_id, .. } => provider_id,
        }
    }
}

/// Backend-side profile mutation; `None` fields are left unchanged.
#[derive(Debug, Default, Clone)]
pub struct BackendProfileUpdate {
    /// Display name to set
    pub display_name: Option<String>,
    /// Avatar URL to set
    pub photo_url: Option<String>,
}

/// Operations the identity backend exposes to the facade.
///
/// Implementations own the active connection handle (session token); the
/// account-scoped operations (`reauthenticate`, `update_password`,
/// `update_profile`, `delete_current_account`) act on the account behind
/// that handle and fail with a backend error when none is held.
#[async_trait]
pub trait IdentityBackend: Send + Sync {
    /// Verify a credential and open a session for the matching account.
    async fn authenticate(&self, credential: Credential) -> Result<BackendUser, BackendError>;

    /// Create a password account and open a session for it.
    async fn create_account(&self, email: &str, password: &str)
        -> Result<BackendUser, BackendError>;

    /// Send a password reset message to `email`.
    async fn send_password_reset(&self, email: &str) -> Result<(), BackendError>;

    /// Re-verify a credential for the currently held account without
    /// replacing the session.
    async fn reauthenticate(&self, credential: Credential) -> Result<(), BackendError>;

    /// Replace the current account's password.
    async fn update_password(&self, new_password: &str) -> Result<(), BackendError>;

    /// Apply profile fields to the current account.
    async fn update_profile(&self, update: BackendProfileUpdate) -> Result<(), BackendError>;

    /// Permanently delete the current account and drop the session.
    async fn delete_current_account(&self) -> Result<(), BackendError>;

    /// Drop the session. Always succeeds.
    async fn sign_out(&self);

    /// Snapshot of the account behind the active session, if any.
    async fn current_user(&self) -> Option<BackendUser>;
}
