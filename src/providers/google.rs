//! Google OAuth adapter
//!
//! Registration and sign-in collapse into one operation: the adapter
//! obtains provider tokens from the OAuth flow collaborator, exchanges
//! them with the identity backend, then idempotently upserts the profile
//! record, so the same identity signing in twice never duplicates a record.

use super::provider::{
    apply_profile_update, default_display_name, upsert_profile, AuthProvider, Capability,
    ProviderKind, SignInCredential,
};
use crate::backend::backend::{Credential, IdentityBackend};
use crate::error::AuthError;
use crate::interactive::OAuthFlow;
use crate::session::types::{ProfileUpdate, User};
use crate::store::store::ProfileStore;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};
use url::Url;

const CAPABILITIES: &[Capability] = &[
    Capability::SignIn,
    Capability::SignOut,
    Capability::UpdateProfile,
    Capability::DeleteAccount,
];

/// Google OAuth provider adapter.
pub struct GoogleProvider {
    backend: Arc<dyn IdentityBackend>,
    store: Arc<dyn ProfileStore>,
    flow: Arc<dyn OAuthFlow>,
    in_flight: AtomicBool,
}

impl GoogleProvider {
    /// Create an adapter over the shared collaborator handles and the
    /// host-supplied OAuth flow.
    pub fn new(
        backend: Arc<dyn IdentityBackend>,
        store: Arc<dyn ProfileStore>,
        flow: Arc<dyn OAuthFlow>,
    ) -> Self {
        Self {
            backend,
            store,
            flow,
            in_flight: AtomicBool::new(false),
        }
    }

    /// Forward a host-received redirect URL to the flow.
    pub fn handle_callback(&self, url: &Url) -> bool {
        self.flow.handle_callback(url)
    }
}

#[async_trait]
impl AuthProvider for GoogleProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Google
    }

    fn capabilities(&self) -> &'static [Capability] {
        CAPABILITIES
    }

    async fn sign_in(&self, credential: SignInCredential) -> Result<User, AuthError> {
        // This adapter drives its own interactive flow (error case first)
        if !matches!(credential, SignInCredential::Interactive) {
            return Err(AuthError::unknown(
                "the google.com provider obtains its own credential interactively",
            ));
        }

        // One interactive attempt in flight at a time; a second concurrent
        // call is a caller error, not a race to resolve.
        if self.in_flight.swap(true, Ordering::AcqRel) {
            return Err(AuthError::unknown(
                "another interactive sign-in attempt is already in progress",
            ));
        }
        let result = self.run_flow().await;
        self.in_flight.store(false, Ordering::Release);
        result
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.backend.sign_out().await;
        Ok(())
    }

    async fn update_profile(&self, user: &User, update: ProfileUpdate) -> Result<User, AuthError> {
        apply_profile_update(self.backend.as_ref(), self.store.as_ref(), user, update).await
    }

    async fn delete_account(&self) -> Result<(), AuthError> {
        self.backend.delete_current_account().await?;
        Ok(())
    }
}

impl GoogleProvider {
    async fn run_flow(&self) -> Result<User, AuthError> {
        let tokens = match self.flow.begin().await {
            Err(prompt_err) => {
                warn!(%prompt_err, "google flow did not produce tokens");
                return Err(AuthError::GoogleSignInFailed);
            }
            Ok(tokens) => tokens,
        };
        if tokens.is_empty() {
            return Err(AuthError::GoogleSignInFailed);
        }

        let backend_user = self
            .backend
            .authenticate(Credential::OAuth {
                provider_id: ProviderKind::Google.as_str().to_string(),
                id_token: tokens.id_token,
                access_token: tokens.access_token,
                raw_nonce: None,
            })
            .await?;

        let email = backend_user
            .email
            .clone()
            .unwrap_or_else(|| format!("{}@privaterelay.invalid", backend_user.uid));
        let display_name = backend_user
            .display_name
            .clone()
            .unwrap_or_else(|| default_display_name(&email, ProviderKind::Google));

        // Google-class providers assert ownership of the email they hand
        // over, so the record is created verified.
        let document = upsert_profile(
            self.store.as_ref(),
            &backend_user.uid,
            email,
            display_name,
            backend_user.photo_url.clone(),
            true,
        )
        .await?;

        info!(uid = %backend_user.uid, "google sign-in succeeded");
        Ok(User::from_parts(&backend_user, &document))
    }
}
