//! Email/password adapter
//!
//! Registration creates the backend account, sets its display name, then
//! creates the profile record keyed by the backend-issued id. Sign-in
//! authenticates and then fetches (never recreates) the existing profile
//! record: a missing record for an existing account indicates drift between
//! the store and the backend and is surfaced as a data-integrity failure.

use super::provider::{
    apply_profile_update, AuthProvider, Capability, ProviderKind, SignInCredential,
};
use crate::backend::backend::{BackendProfileUpdate, Credential, IdentityBackend};
use crate::error::AuthError;
use crate::session::types::{ProfileUpdate, User};
use crate::store::store::{ProfileDocument, ProfileStore};
use crate::validation;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};

const CAPABILITIES: &[Capability] = &[
    Capability::SignIn,
    Capability::SignUp,
    Capability::SignOut,
    Capability::ResetPassword,
    Capability::UpdatePassword,
    Capability::UpdateProfile,
    Capability::DeleteAccount,
];

/// Email/password provider adapter.
pub struct PasswordProvider {
    backend: Arc<dyn IdentityBackend>,
    store: Arc<dyn ProfileStore>,
}

impl PasswordProvider {
    /// Create an adapter over the shared collaborator handles.
    pub fn new(backend: Arc<dyn IdentityBackend>, store: Arc<dyn ProfileStore>) -> Self {
        Self { backend, store }
    }
}

#[async_trait]
impl AuthProvider for PasswordProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Password
    }

    fn capabilities(&self) -> &'static [Capability] {
        CAPABILITIES
    }

    async fn sign_in(&self, credential: SignInCredential) -> Result<User, AuthError> {
        // This adapter only takes explicit credentials (error case first)
        let SignInCredential::Password { email, password } = credential else {
            return Err(AuthError::unknown(
                "the password provider requires an email/password credential",
            ));
        };
        if email.is_empty() {
            return Err(AuthError::InvalidEmail);
        }
        if password.is_empty() {
            return Err(AuthError::WrongPassword);
        }

        debug!(%email, "password sign-in");
        let backend_user = self
            .backend
            .authenticate(Credential::EmailPassword { email, password })
            .await?;

        // Fetch, never recreate: an account without its profile record means
        // the store and the backend have drifted apart.
        let document = match self.store.get(&backend_user.uid).await? {
            None => {
                return Err(AuthError::unknown(format!(
                    "profile record missing for account {}",
                    backend_user.uid
                )))
            }
            Some(document) => document,
        };

        info!(uid = %backend_user.uid, "password sign-in succeeded");
        Ok(User::from_parts(&backend_user, &document))
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<User, AuthError> {
        // Server-side re-validation (error case first)
        if !validation::is_valid_email(email) {
            return Err(AuthError::InvalidEmail);
        }
        if password.is_empty() {
            return Err(AuthError::WeakPassword);
        }

        let display_name = {
            let trimmed = display_name.trim();
            if trimmed.is_empty() {
                super::provider::default_display_name(email, ProviderKind::Password)
            } else {
                trimmed.to_string()
            }
        };

        debug!(%email, "creating password account");
        let backend_user = self.backend.create_account(email, password).await?;

        self.backend
            .update_profile(BackendProfileUpdate {
                display_name: Some(display_name.clone()),
                photo_url: None,
            })
            .await?;

        let now = Utc::now();
        let document = ProfileDocument {
            email: backend_user.email.clone().unwrap_or_else(|| email.to_string()),
            display_name,
            created_at: now,
            updated_at: now,
            profile_image_url: None,
            is_email_verified: backend_user.email_verified,
        };
        self.store.set(&backend_user.uid, &document).await?;

        info!(uid = %backend_user.uid, "password account created");
        Ok(User::from_parts(&backend_user, &document))
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.backend.sign_out().await;
        Ok(())
    }

    async fn reset_password(&self, email: &str) -> Result<(), AuthError> {
        if email.is_empty() {
            return Err(AuthError::InvalidEmail);
        }
        self.backend.send_password_reset(email).await?;
        Ok(())
    }

    async fn update_password(
        &self,
        user: &User,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        // Two-step transaction: re-authenticate first; if that fails, the
        // password must not change.
        self.backend
            .reauthenticate(Credential::EmailPassword {
                email: user.email.clone(),
                password: current_password.to_string(),
            })
            .await?;

        self.backend.update_password(new_password).await?;
        info!(uid = %user.id, "password updated");
        Ok(())
    }

    async fn update_profile(&self, user: &User, update: ProfileUpdate) -> Result<User, AuthError> {
        apply_profile_update(self.backend.as_ref(), self.store.as_ref(), user, update).await
    }

    async fn delete_account(&self) -> Result<(), AuthError> {
        self.backend.delete_current_account().await?;
        info!("account deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::MemoryIdentityBackend;
    use crate::store::memory::MemoryProfileStore;

    fn provider() -> (
        PasswordProvider,
        Arc<MemoryIdentityBackend>,
        Arc<MemoryProfileStore>,
    ) {
        let backend = Arc::new(MemoryIdentityBackend::new());
        let store = Arc::new(MemoryProfileStore::new());
        let provider = PasswordProvider::new(
            Arc::clone(&backend) as Arc<dyn IdentityBackend>,
            Arc::clone(&store) as Arc<dyn ProfileStore>,
        );
        (provider, backend, store)
    }

    #[tokio::test]
    async fn test_sign_up_creates_profile_record() {
        let (provider, _backend, store) = provider();

        let user = provider
            .sign_up("alice@example.com", "password123", "Alice")
            .await
            .unwrap();

        let document = store.get(&user.id).await.unwrap().unwrap();
        assert_eq!(document.email, "alice@example.com");
        assert_eq!(document.display_name, "Alice");
        assert!(document.created_at <= document.updated_at);
    }

    #[tokio::test]
    async fn test_sign_up_defaults_blank_display_name() {
        let (provider, _backend, _store) = provider();
        let user = provider
            .sign_up("alice@example.com", "password123", "   ")
            .await
            .unwrap();
        assert_eq!(user.display_name, "alice");
    }

    #[tokio::test]
    async fn test_sign_up_rejects_bad_email() {
        let (provider, _backend, _store) = provider();
        let err = provider
            .sign_up("not-an-email", "password123", "Alice")
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::InvalidEmail);
    }

    #[tokio::test]
    async fn test_sign_in_fetches_existing_profile() {
        let (provider, _backend, store) = provider();
        let created = provider
            .sign_up("alice@example.com", "password123", "Alice")
            .await
            .unwrap();

        let signed_in = provider
            .sign_in(SignInCredential::Password {
                email: "alice@example.com".to_string(),
                password: "password123".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(signed_in.id, created.id);
        assert_eq!(signed_in.display_name, "Alice");
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_missing_profile_is_data_integrity_error() {
        let (provider, _backend, store) = provider();
        let created = provider
            .sign_up("alice@example.com", "password123", "Alice")
            .await
            .unwrap();

        // Simulate store/backend drift
        store.remove(&created.id).await;

        let err = provider
            .sign_in(SignInCredential::Password {
                email: "alice@example.com".to_string(),
                password: "password123".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Unknown(msg) if msg.contains("profile record missing")));
        // And nothing was silently recreated
        assert!(store.get(&created.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_password_requires_reauthentication() {
        let (provider, _backend, _store) = provider();
        let user = provider
            .sign_up("alice@example.com", "password123", "Alice")
            .await
            .unwrap();

        let err = provider
            .update_password(&user, "wrong-password", "new-password")
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::WrongPassword);

        // Old password still works: nothing was partially applied
        provider
            .sign_in(SignInCredential::Password {
                email: "alice@example.com".to_string(),
                password: "password123".to_string(),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_update_password_applies_after_reauth() {
        let (provider, _backend, _store) = provider();
        let user = provider
            .sign_up("alice@example.com", "password123", "Alice")
            .await
            .unwrap();

        provider
            .update_password(&user, "password123", "new-password")
            .await
            .unwrap();

        provider
            .sign_in(SignInCredential::Password {
                email: "alice@example.com".to_string(),
                password: "new-password".to_string(),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_update_profile_refreshes_timestamp() {
        let (provider, _backend, store) = provider();
        let user = provider
            .sign_up("alice@example.com", "password123", "Alice")
            .await
            .unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let refreshed = provider
            .update_profile(&user, ProfileUpdate::default().display_name("Alice Smith"))
            .await
            .unwrap();

        assert_eq!(refreshed.display_name, "Alice Smith");
        assert!(refreshed.updated_at > user.updated_at);
        assert_eq!(refreshed.created_at, user.created_at);

        let document = store.get(&user.id).await.unwrap().unwrap();
        assert_eq!(document.display_name, "Alice Smith");
    }

    #[tokio::test]
    async fn test_network_failure_maps_to_network_error() {
        let (provider, backend, _store) = provider();
        backend.fail_next_call();
        let err = provider
            .sign_up("alice@example.com", "password123", "Alice")
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::NetworkError);
    }
}
