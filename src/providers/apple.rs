//! Apple platform-credential adapter
//!
//! Each attempt generates a fresh cryptographically secure nonce, binds its
//! SHA-256 digest into the prompt request, and presents the raw nonce back
//! to the identity backend at exchange time; the backend checks it against
//! the digest embedded in the signed token, so a captured token cannot be
//! replayed. The interactive wait is bounded; the user dismissing the
//! prompt, the capability being absent, and an outright failure surface as
//! three distinct error kinds.

use super::provider::{
    apply_profile_update, default_display_name, upsert_profile, AuthProvider, Capability,
    ProviderKind, SignInCredential,
};
use crate::backend::backend::{Credential, IdentityBackend};
use crate::error::{AuthError, PromptError};
use crate::interactive::{CredentialPrompt, CredentialRequest};
use crate::session::types::{ProfileUpdate, User};
use crate::store::store::ProfileStore;
use async_trait::async_trait;
use base64::Engine as _;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const CAPABILITIES: &[Capability] = &[
    Capability::SignIn,
    Capability::SignOut,
    Capability::UpdateProfile,
    Capability::DeleteAccount,
];

/// Default bound on the interactive wait.
pub const DEFAULT_PROMPT_TIMEOUT: Duration = Duration::from_secs(120);

/// Apple platform-credential provider adapter.
pub struct AppleProvider {
    backend: Arc<dyn IdentityBackend>,
    store: Arc<dyn ProfileStore>,
    prompt: Arc<dyn CredentialPrompt>,
    prompt_timeout: Duration,
    in_flight: AtomicBool,
}

impl AppleProvider {
    /// Create an adapter over the shared collaborator handles and the
    /// host-supplied credential prompt.
    pub fn new(
        backend: Arc<dyn IdentityBackend>,
        store: Arc<dyn ProfileStore>,
        prompt: Arc<dyn CredentialPrompt>,
    ) -> Self {
        Self {
            backend,
            store,
            prompt,
            prompt_timeout: DEFAULT_PROMPT_TIMEOUT,
            in_flight: AtomicBool::new(false),
        }
    }

    /// Override the bound on the interactive wait.
    pub fn with_prompt_timeout(mut self, timeout: Duration) -> Self {
        self.prompt_timeout = timeout;
        self
    }

    /// Fresh raw nonce: 32 bytes from the OS CSPRNG, base64url-encoded.
    /// Never reused across attempts.
    fn generate_nonce() -> String {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
    }

    fn nonce_digest(raw_nonce: &str) -> String {
        hex::encode(Sha256::digest(raw_nonce.as_bytes()))
    }
}

#[async_trait]
impl AuthProvider for AppleProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Apple
    }

    fn capabilities(&self) -> &'static [Capability] {
        CAPABILITIES
    }

    async fn sign_in(&self, credential: SignInCredential) -> Result<User, AuthError> {
        // This adapter drives its own interactive flow (error case first)
        if !matches!(credential, SignInCredential::Interactive) {
            return Err(AuthError::unknown(
                "the apple.com provider obtains its own credential interactively",
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

impl AppleProvider {
    async fn run_flow(&self) -> Result<User, AuthError> {
        let raw_nonce = Self::generate_nonce();
        let request = CredentialRequest {
            nonce_digest: Self::nonce_digest(&raw_nonce),
            requests_email: true,
            requests_full_name: true,
        };

        // Bounded wait: if the prompt never resolves, fail deterministically
        // instead of hanging the caller.
        let outcome =
            match tokio::time::timeout(self.prompt_timeout, self.prompt.request_credential(request))
                .await
            {
                Err(_elapsed) => {
                    warn!("apple credential prompt timed out");
                    return Err(AuthError::AppleSignInFailed);
                }
                Ok(outcome) => outcome,
            };

        let credential = match outcome {
            Err(PromptError::Cancelled) => return Err(AuthError::AppleSignInCancelled),
            Err(PromptError::NotAvailable) => return Err(AuthError::AppleSignInNotAvailable),
            Err(PromptError::Failed(detail)) => {
                warn!(%detail, "apple credential prompt failed");
                return Err(AuthError::AppleSignInFailed);
            }
            Ok(credential) => credential,
        };

        let provider_email = credential.email.clone();
        let backend_user = self
            .backend
            .authenticate(Credential::OAuth {
                provider_id: ProviderKind::Apple.as_str().to_string(),
                id_token: Some(credential.identity_token),
                access_token: None,
                raw_nonce: Some(raw_nonce),
            })
            .await?;

        // Email fallback order: provider-supplied, backend-echoed, then a
        // placeholder synthesized from the stable account id.
        let email = provider_email
            .clone()
            .or_else(|| backend_user.email.clone())
            .unwrap_or_else(|| format!("{}@privaterelay.invalid", backend_user.uid));
        let display_name = credential
            .full_name
            .or_else(|| backend_user.display_name.clone())
            .unwrap_or_else(|| default_display_name(&email, ProviderKind::Apple));

        let document = upsert_profile(
            self.store.as_ref(),
            &backend_user.uid,
            email,
            display_name,
            backend_user.photo_url.clone(),
            provider_email.is_some() || backend_user.email_verified,
        )
        .await?;

        info!(uid = %backend_user.uid, "apple sign-in succeeded");
        Ok(User::from_parts(&backend_user, &document))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::MemoryIdentityBackend;
    use crate::interactive::PlatformCredential;
    use crate::store::memory::MemoryProfileStore;
    use std::sync::Mutex;

    /// Prompt double that returns a scripted outcome and records requests.
    struct ScriptedPrompt {
        outcome: Mutex<Option<Result<PlatformCredential, PromptError>>>,
        seen_digests: Mutex<Vec<String>>,
    }

    impl ScriptedPrompt {
        fn returning(outcome: Result<PlatformCredential, PromptError>) -> Arc<Self> {
            Arc::new(Self {
                outcome: Mutex::new(Some(outcome)),
                seen_digests: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl CredentialPrompt for ScriptedPrompt {
        async fn request_credential(
            &self,
            request: CredentialRequest,
        ) -> Result<PlatformCredential, PromptError> {
            self.seen_digests
                .lock()
                .expect("prompt lock")
                .push(request.nonce_digest);
            self.outcome
                .lock()
                .expect("prompt lock")
                .take()
                .unwrap_or(Err(PromptError::Failed("prompt exhausted".to_string())))
        }
    }

    /// Prompt double that never resolves.
    struct HangingPrompt;

    #[async_trait]
    impl CredentialPrompt for HangingPrompt {
        async fn request_credential(
            &self,
            _request: CredentialRequest,
        ) -> Result<PlatformCredential, PromptError> {
            std::future::pending().await
        }
    }

    fn provider_with_prompt(
        prompt: Arc<dyn CredentialPrompt>,
    ) -> (AppleProvider, Arc<MemoryIdentityBackend>, Arc<MemoryProfileStore>) {
        let backend = Arc::new(MemoryIdentityBackend::new());
        let store = Arc::new(MemoryProfileStore::new());
        let provider = AppleProvider::new(
            Arc::clone(&backend) as Arc<dyn IdentityBackend>,
            Arc::clone(&store) as Arc<dyn ProfileStore>,
            prompt,
        );
        (provider, backend, store)
    }

    fn credential(token: &str, email: Option<&str>) -> PlatformCredential {
        PlatformCredential {
            identity_token: token.to_string(),
            email: email.map(str::to_string),
            full_name: None,
        }
    }

    #[tokio::test]
    async fn test_cancellation_is_distinct_from_failure() {
        let (provider, _backend, _store) =
            provider_with_prompt(ScriptedPrompt::returning(Err(PromptError::Cancelled)));
        let err = provider
            .sign_in(SignInCredential::Interactive)
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::AppleSignInCancelled);

        let (provider, _backend, _store) =
            provider_with_prompt(ScriptedPrompt::returning(Err(PromptError::NotAvailable)));
        let err = provider
            .sign_in(SignInCredential::Interactive)
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::AppleSignInNotAvailable);

        let (provider, _backend, _store) = provider_with_prompt(ScriptedPrompt::returning(Err(
            PromptError::Failed("boom".to_string()),
        )));
        let err = provider
            .sign_in(SignInCredential::Interactive)
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::AppleSignInFailed);
    }

    #[tokio::test]
    async fn test_hanging_prompt_times_out_deterministically() {
        let (provider, _backend, _store) = provider_with_prompt(Arc::new(HangingPrompt));
        let provider = provider.with_prompt_timeout(Duration::from_millis(20));

        let err = provider
            .sign_in(SignInCredential::Interactive)
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::AppleSignInFailed);
    }

    #[tokio::test]
    async fn test_withheld_email_falls_back_to_placeholder() {
        let prompt = ScriptedPrompt::returning(Ok(credential("apple-tok", None)));
        let (provider, _backend, _store) = provider_with_prompt(prompt);

        // The backend mints a federated account with no email for this token
        let user = provider
            .sign_in(SignInCredential::Interactive)
            .await
            .unwrap();
        assert_eq!(user.email, format!("{}@privaterelay.invalid", user.id));
        assert!(!user.is_email_verified);
    }

    #[tokio::test]
    async fn test_provider_email_wins_over_backend() {
        let prompt = ScriptedPrompt::returning(Ok(credential("apple-tok", Some("real@me.com"))));
        let (provider, backend, _store) = provider_with_prompt(prompt);
        backend
            .register_federated("apple-tok", Some("relay@appleid.example"), None, false)
            .await;

        let user = provider
            .sign_in(SignInCredential::Interactive)
            .await
            .unwrap();
        assert_eq!(user.email, "real@me.com");
        assert!(user.is_email_verified);
    }

    #[tokio::test]
    async fn test_nonce_digest_is_fresh_per_attempt() {
        let prompt = ScriptedPrompt::returning(Ok(credential("apple-tok", None)));
        let (provider, _backend, _store) = provider_with_prompt(Arc::clone(&prompt) as _);

        provider
            .sign_in(SignInCredential::Interactive)
            .await
            .unwrap();
        // Second attempt: prompt is exhausted and fails, but still records
        // the digest it was asked to bind.
        let _ = provider.sign_in(SignInCredential::Interactive).await;

        let digests = prompt.seen_digests.lock().expect("prompt lock").clone();
        assert_eq!(digests.len(), 2);
        assert_ne!(digests[0], digests[1]);
        // SHA-256 hex
        assert_eq!(digests[0].len(), 64);
        assert!(digests[0].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_nonce_digest_matches_sha256() {
        let digest = AppleProvider::nonce_digest("fixed-nonce");
        assert_eq!(digest, hex::encode(Sha256::digest(b"fixed-nonce")));
    }
}
