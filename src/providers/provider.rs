//! Provider adapter contract
//!
//! One adapter per identity method, all behind [`AuthProvider`]. Adapters
//! advertise the operations they support through a capability table; every
//! trait method defaults to an unsupported-operation failure so an adapter
//! implements only its subset.

use crate::backend::backend::{BackendProfileUpdate, IdentityBackend};
use crate::error::AuthError;
use crate::session::types::{ProfileUpdate, User};
use crate::store::store::{ProfilePatch, ProfileStore};
use async_trait::async_trait;
use chrono::Utc;

/// Identity methods the facade can dispatch to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    /// Email/password accounts
    Password,
    /// Google OAuth
    Google,
    /// Apple platform credential
    Apple,
    /// Device biometrics (stub)
    Biometric,
}

impl ProviderKind {
    /// Canonical provider identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Password => "password",
            Self::Google => "google.com",
            Self::Apple => "apple.com",
            Self::Biometric => "biometric",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operations an adapter may support.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Sign in to an existing identity
    SignIn,
    /// Register a new identity
    SignUp,
    /// End the current session
    SignOut,
    /// Trigger a password reset message
    ResetPassword,
    /// Change the account password
    UpdatePassword,
    /// Mutate profile fields
    UpdateProfile,
    /// Permanently delete the account
    DeleteAccount,
}

impl Capability {
    /// Operation name used in diagnostics
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SignIn => "sign_in",
            Self::SignUp => "sign_up",
            Self::SignOut => "sign_out",
            Self::ResetPassword => "reset_password",
            Self::UpdatePassword => "update_password",
            Self::UpdateProfile => "update_profile",
            Self::DeleteAccount => "delete_account",
        }
    }
}

/// Credential material handed to an adapter's `sign_in`.
#[derive(Debug, Clone)]
pub enum SignInCredential {
    /// Email/password pair for the password adapter
    Password {
        /// Account email
        email: String,
        /// Account password
        password: String,
    },
    /// The adapter drives its own interactive flow to obtain a credential
    Interactive,
}

pub(crate) fn unsupported(kind: ProviderKind, capability: Capability) -> AuthError {
    AuthError::unknown(format!(
        "the {} provider does not support {}",
        kind,
        capability.as_str()
    ))
}

/// A provider adapter: translates one identity flow into the unified
/// session contract.
///
/// Implementations are stateless apart from shared collaborator handles and
/// an in-flight guard for interactive attempts; session state belongs to
/// the facade.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Which identity method this adapter implements
    fn kind(&self) -> ProviderKind;

    /// The operations this adapter supports
    fn capabilities(&self) -> &'static [Capability];

    /// Whether `capability` is in this adapter's table
    fn supports(&self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }

    /// Authenticate and return the reconciled user record.
    async fn sign_in(&self, credential: SignInCredential) -> Result<User, AuthError> {
        let _ = credential;
        Err(unsupported(self.kind(), Capability::SignIn))
    }

    /// Register a new identity and return its user record.
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<User, AuthError> {
        let _ = (email, password, display_name);
        Err(unsupported(self.kind(), Capability::SignUp))
    }

    /// End the backend session.
    async fn sign_out(&self) -> Result<(), AuthError> {
        Err(unsupported(self.kind(), Capability::SignOut))
    }

    /// Trigger a password reset message for `email`.
    async fn reset_password(&self, email: &str) -> Result<(), AuthError> {
        let _ = email;
        Err(unsupported(self.kind(), Capability::ResetPassword))
    }

    /// Re-authenticate with the current credential, then apply the new one.
    /// Re-authentication failure must leave the password unchanged.
    async fn update_password(
        &self,
        user: &User,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let _ = (user, current_password, new_password);
        Err(unsupported(self.kind(), Capability::UpdatePassword))
    }

    /// Apply a profile mutation and return the refreshed user record.
    async fn update_profile(&self, user: &User, update: ProfileUpdate) -> Result<User, AuthError> {
        let _ = (user, update);
        Err(unsupported(self.kind(), Capability::UpdateProfile))
    }

    /// Permanently delete the current account.
    async fn delete_account(&self) -> Result<(), AuthError> {
        Err(unsupported(self.kind(), Capability::DeleteAccount))
    }
}

/// Apply a profile mutation to both the backend and the profile store, then
/// reconcile the refreshed record from the store. Shared by every adapter
/// that supports [`Capability::UpdateProfile`].
pub(crate) async fn apply_profile_update(
    backend: &dyn IdentityBackend,
    store: &dyn ProfileStore,
    user: &User,
    update: ProfileUpdate,
) -> Result<User, AuthError> {
    backend
        .update_profile(BackendProfileUpdate {
            display_name: update.display_name.clone(),
            photo_url: update.profile_image_url.clone(),
        })
        .await?;

    let mut patch = ProfilePatch::touch(Utc::now());
    patch.display_name = update.display_name;
    patch.profile_image_url = update.profile_image_url;
    store.update(&user.id, &patch).await?;

    // The record is reconciled from the store, never assumed
    let document = match store.get(&user.id).await? {
        None => {
            return Err(AuthError::unknown(format!(
                "profile record missing for account {} after update",
                user.id
            )))
        }
        Some(document) => document,
    };

    let mut refreshed = User::from_profile(user.id.as_str(), &document);
    refreshed.is_email_verified = document.is_email_verified || user.is_email_verified;
    Ok(refreshed)
}

/// Idempotent profile upsert for federated sign-ins: create the record if
/// absent, otherwise merge-update it, refreshing `updated_at` and leaving
/// `created_at` untouched. Repeating the upsert for the same id never
/// produces a second record.
pub(crate) async fn upsert_profile(
    store: &dyn ProfileStore,
    uid: &str,
    email: String,
    display_name: String,
    photo_url: Option<String>,
    mark_email_verified: bool,
) -> Result<crate::store::store::ProfileDocument, AuthError> {
    use crate::store::store::ProfileDocument;

    let now = Utc::now();
    match store.get(uid).await? {
        Some(mut document) => {
            let mut patch = ProfilePatch::touch(now)
                .email(email)
                .display_name(display_name);
            if let Some(url) = photo_url {
                patch = patch.profile_image_url(url);
            }
            if mark_email_verified {
                patch = patch.email_verified(true);
            }
            store.update(uid, &patch).await?;
            document.apply(&patch);
            Ok(document)
        }
        None => {
            let document = ProfileDocument {
                email,
                display_name,
                created_at: now,
                updated_at: now,
                profile_image_url: photo_url,
                is_email_verified: mark_email_verified,
            };
            store.set(uid, &document).await?;
            Ok(document)
        }
    }
}

/// Fallback display name when neither the provider nor the backend supplied
/// one: the email's local part, or the provider name as a last resort.
pub(crate) fn default_display_name(email: &str, kind: ProviderKind) -> String {
    let local = email.split('@').next().unwrap_or("");
    if local.is_empty() {
        format!("{} user", kind.as_str())
    } else {
        local.to_string()
    }
}
