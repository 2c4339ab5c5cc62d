//! Session facade
//!
//! [`AuthSession`] is the single entry point applications call. It owns the
//! current-session cell, dispatches each operation to the adapter for the
//! right identity method behind the configured enabled-provider flags, and
//! guarantees one error taxonomy and one user-record shape across all
//! methods. State transitions are applied atomically: readers observe the
//! pre- or post-transition state, never a partial one.

use crate::backend::backend::IdentityBackend;
use crate::config::AuthConfig;
use crate::error::{AuthError, ConfigError};
use crate::interactive::{CredentialPrompt, OAuthFlow};
use crate::providers::apple::AppleProvider;
use crate::providers::biometric::BiometricProvider;
use crate::providers::google::GoogleProvider;
use crate::providers::password::PasswordProvider;
use crate::providers::provider::{AuthProvider, Capability, ProviderKind, SignInCredential};
use crate::session::types::{ProfileUpdate, SessionState, User};
use crate::store::store::ProfileStore;
use crate::validation;
use async_stream::stream;
use futures::Stream;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info};
use url::Url;

/// Global map of registered session facades, keyed by name.
static SESSION_REGISTRY: Lazy<RwLock<HashMap<String, AuthSession>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

#[derive(Clone)]
struct ActiveSession {
    user: Arc<User>,
    provider: ProviderKind,
}

struct SessionInner {
    config: AuthConfig,
    password: PasswordProvider,
    google: Option<GoogleProvider>,
    apple: Option<AppleProvider>,
    biometric: BiometricProvider,
    state: RwLock<Option<ActiveSession>>,
    state_tx: broadcast::Sender<SessionState>,
}

/// Provider-agnostic authentication session facade.
///
/// Cheap to clone; clones share the same session state.
///
/// # Example
/// ```no_run
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// use authkit::{AuthConfig, AuthSession};
/// use authkit::backend::rest::RestIdentityBackend;
/// use authkit::store::rest::RestProfileStore;
/// use std::sync::Arc;
///
/// let config = AuthConfig::builder("YOUR_API_KEY", "your-project").build()?;
/// let session = AuthSession::builder(config)
///     .backend(Arc::new(RestIdentityBackend::new("YOUR_API_KEY")?))
///     .store(Arc::new(RestProfileStore::new("your-project")?))
///     .build()?;
///
/// let user = session.sign_in("user@example.com", "password").await?;
/// println!("signed in: {}", user.id);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct AuthSession {
    inner: Arc<SessionInner>,
}

impl AuthSession {
    /// Start building a facade for the given configuration.
    pub fn builder(config: AuthConfig) -> AuthSessionBuilder {
        AuthSessionBuilder {
            config,
            backend: None,
            store: None,
            google_flow: None,
            apple_prompt: None,
            apple_prompt_timeout: None,
        }
    }

    /// Register this facade under a process-wide name.
    pub async fn register(&self, name: impl Into<String>) {
        let mut registry = SESSION_REGISTRY.write().await;
        registry.insert(name.into(), self.clone());
    }

    /// Look up a previously registered facade. Looking up a name that was
    /// never registered is a wiring error and fails loudly.
    pub async fn instance(name: &str) -> Result<AuthSession, ConfigError> {
        let registry = SESSION_REGISTRY.read().await;
        registry
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::InstanceNotRegistered(name.to_string()))
    }

    /// The configuration this facade was built with.
    pub fn config(&self) -> &AuthConfig {
        &self.inner.config
    }

    /// The signed-in user, if any.
    pub async fn current_user(&self) -> Option<Arc<User>> {
        let state = self.inner.state.read().await;
        state.as_ref().map(|active| Arc::clone(&active.user))
    }

    /// Snapshot of the session state machine.
    pub async fn current_state(&self) -> SessionState {
        let state = self.inner.state.read().await;
        match state.as_ref() {
            None => SessionState::Unauthenticated,
            Some(active) => SessionState::Authenticated(Arc::clone(&active.user)),
        }
    }

    /// Subscribe to session state changes.
    ///
    /// The stream immediately yields the current state, then every
    /// transition: sign-in, sign-out, profile refresh, account deletion.
    pub async fn state_changes(
        &self,
    ) -> std::pin::Pin<Box<dyn Stream<Item = SessionState> + Send>> {
        let initial = self.current_state().await;
        let mut rx = self.inner.state_tx.subscribe();

        Box::pin(stream! {
            yield initial;

            loop {
                let state = match rx.recv().await {
                    Err(_) => break, // Channel closed
                    Ok(state) => state,
                };
                yield state;
            }
        })
    }

    /// Sign in with email and password.
    pub async fn sign_in(
        &self,
        email: impl AsRef<str>,
        password: impl AsRef<str>,
    ) -> Result<Arc<User>, AuthError> {
        let email = email.as_ref();
        let password = password.as_ref();
        self.require_enabled(ProviderKind::Password)?;

        // Validate inputs (error case first)
        if !validation::is_valid_email(email) {
            return Err(AuthError::InvalidEmail);
        }
        if password.is_empty() {
            return Err(AuthError::WrongPassword);
        }

        let user = self
            .inner
            .password
            .sign_in(SignInCredential::Password {
                email: email.to_string(),
                password: password.to_string(),
            })
            .await?;
        Ok(self.install_session(user, ProviderKind::Password).await)
    }

    /// Register a new email/password account.
    pub async fn sign_up(
        &self,
        email: impl AsRef<str>,
        password: impl AsRef<str>,
        display_name: impl AsRef<str>,
    ) -> Result<Arc<User>, AuthError> {
        let email = email.as_ref();
        let password = password.as_ref();
        self.require_enabled(ProviderKind::Password)?;

        // Validate inputs (error case first)
        if !validation::is_valid_email(email) {
            return Err(AuthError::InvalidEmail);
        }
        if !validation::is_valid_password(password, self.inner.config.password_policy()) {
            return Err(AuthError::WeakPassword);
        }

        let user = self
            .inner
            .password
            .sign_up(email, password, display_name.as_ref())
            .await?;
        Ok(self.install_session(user, ProviderKind::Password).await)
    }

    /// Sign in through the Google OAuth flow.
    pub async fn sign_in_with_google(&self) -> Result<Arc<User>, AuthError> {
        self.require_enabled(ProviderKind::Google)?;
        let Some(google) = self.inner.google.as_ref() else {
            return Err(AuthError::unknown("the google.com provider is not wired"));
        };

        let user = google.sign_in(SignInCredential::Interactive).await?;
        Ok(self.install_session(user, ProviderKind::Google).await)
    }

    /// Sign in through the Apple platform-credential flow.
    pub async fn sign_in_with_apple(&self) -> Result<Arc<User>, AuthError> {
        // A disabled Apple provider is capability absence, not failure
        if !self.inner.config.providers().apple {
            return Err(AuthError::AppleSignInNotAvailable);
        }
        let Some(apple) = self.inner.apple.as_ref() else {
            return Err(AuthError::AppleSignInNotAvailable);
        };

        let user = apple.sign_in(SignInCredential::Interactive).await?;
        Ok(self.install_session(user, ProviderKind::Apple).await)
    }

    /// Authenticate with device biometrics.
    ///
    /// The biometric adapter is a stub: this always fails with a clearly
    /// labeled error rather than silently succeeding.
    pub async fn authenticate_with_biometrics(&self) -> Result<Arc<User>, AuthError> {
        self.require_enabled(ProviderKind::Biometric)?;
        let user = self
            .inner
            .biometric
            .sign_in(SignInCredential::Interactive)
            .await?;
        Ok(self.install_session(user, ProviderKind::Biometric).await)
    }

    /// Sign out. Always transitions to `Unauthenticated`.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        let provider = {
            let state = self.inner.state.read().await;
            state.as_ref().map(|active| active.provider)
        };

        if let Some(kind) = provider {
            self.adapter(kind)?.sign_out().await?;
        } else {
            // No session to end on the backend; clearing is still fine
            self.inner.password.sign_out().await?;
        }

        self.clear_session().await;
        info!("signed out");
        Ok(())
    }

    /// Send a password reset message to `email`.
    pub async fn reset_password(&self, email: impl AsRef<str>) -> Result<(), AuthError> {
        let email = email.as_ref();
        self.require_enabled(ProviderKind::Password)?;
        if !validation::is_valid_email(email) {
            return Err(AuthError::InvalidEmail);
        }
        self.inner.password.reset_password(email).await
    }

    /// Change the current account's password.
    ///
    /// Two-step from the caller's perspective: re-authenticate with the
    /// current password, then apply the new one. If re-authentication fails
    /// the password does not change.
    pub async fn update_password(
        &self,
        current_password: impl AsRef<str>,
        new_password: impl AsRef<str>,
    ) -> Result<(), AuthError> {
        let current_password = current_password.as_ref();
        let new_password = new_password.as_ref();

        // Precondition: an authenticated session (error case first)
        let Some(active) = self.active().await else {
            return Err(AuthError::UserNotFound);
        };

        if current_password.is_empty() {
            return Err(AuthError::WrongPassword);
        }
        if !validation::is_valid_password(new_password, self.inner.config.password_policy()) {
            return Err(AuthError::WeakPassword);
        }

        let adapter = self.adapter(active.provider)?;
        if !adapter.supports(Capability::UpdatePassword) {
            return Err(AuthError::unknown(format!(
                "the {} provider does not support update_password",
                active.provider
            )));
        }
        adapter
            .update_password(&active.user, current_password, new_password)
            .await
    }

    /// Mutate the current user's profile and return the refreshed record.
    pub async fn update_profile(&self, update: ProfileUpdate) -> Result<Arc<User>, AuthError> {
        // Precondition: an authenticated session (error case first)
        let Some(active) = self.active().await else {
            return Err(AuthError::UserNotFound);
        };

        if let Some(ref name) = update.display_name {
            if !validation::is_valid_display_name(name) {
                return Err(AuthError::unknown(
                    "display name must be 1-64 characters after trimming",
                ));
            }
        }
        if let Some(ref url) = update.profile_image_url {
            if !validation::is_valid_url(url) {
                return Err(AuthError::unknown(
                    "profile image URL must include a scheme and host",
                ));
            }
        }
        if update.is_empty() {
            return Ok(active.user);
        }

        let adapter = self.adapter(active.provider)?;
        let refreshed = adapter.update_profile(&active.user, update).await?;
        Ok(self.install_session(refreshed, active.provider).await)
    }

    /// Permanently delete the current account and end the session.
    pub async fn delete_account(&self) -> Result<(), AuthError> {
        // Precondition: an authenticated session (error case first)
        let Some(active) = self.active().await else {
            return Err(AuthError::UserNotFound);
        };

        self.adapter(active.provider)?.delete_account().await?;
        self.clear_session().await;
        info!(uid = %active.user.id, "account deleted");
        Ok(())
    }

    /// Deliver a host-received OAuth redirect URL into the pending flow.
    /// Returns `true` when the URL was consumed.
    pub fn handle_callback(&self, url: &Url) -> bool {
        match self.inner.google.as_ref() {
            None => false,
            Some(google) => google.handle_callback(url),
        }
    }

    async fn active(&self) -> Option<ActiveSession> {
        let state = self.inner.state.read().await;
        state.clone()
    }

    fn require_enabled(&self, kind: ProviderKind) -> Result<(), AuthError> {
        let providers = self.inner.config.providers();
        let enabled = match kind {
            ProviderKind::Password => providers.password,
            ProviderKind::Google => providers.google,
            ProviderKind::Apple => providers.apple,
            ProviderKind::Biometric => providers.biometric,
        };
        if !enabled {
            return Err(AuthError::unknown(format!(
                "the {} provider is not enabled",
                kind
            )));
        }
        Ok(())
    }

    fn adapter(&self, kind: ProviderKind) -> Result<&dyn AuthProvider, AuthError> {
        match kind {
            ProviderKind::Password => Ok(&self.inner.password),
            ProviderKind::Google => match self.inner.google.as_ref() {
                None => Err(AuthError::unknown("the google.com provider is not wired")),
                Some(google) => Ok(google),
            },
            ProviderKind::Apple => match self.inner.apple.as_ref() {
                None => Err(AuthError::AppleSignInNotAvailable),
                Some(apple) => Ok(apple),
            },
            ProviderKind::Biometric => Ok(&self.inner.biometric),
        }
    }

    async fn install_session(&self, user: User, provider: ProviderKind) -> Arc<User> {
        let user = Arc::new(user);
        {
            let mut state = self.inner.state.write().await;
            *state = Some(ActiveSession {
                user: Arc::clone(&user),
                provider,
            });
        }
        debug!(uid = %user.id, provider = %provider, "session installed");
        // Broadcast the transition (ignore error if no listeners)
        let _ = self
            .inner
            .state_tx
            .send(SessionState::Authenticated(Arc::clone(&user)));
        user
    }

    async fn clear_session(&self) {
        {
            let mut state = self.inner.state.write().await;
            *state = None;
        }
        let _ = self.inner.state_tx.send(SessionState::Unauthenticated);
    }
}

impl std::fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSession")
            .field("project_id", &self.inner.config.project_id())
            .finish()
    }
}

/// Builder for [`AuthSession`].
///
/// The backend and store are always required; the Google flow and Apple
/// prompt are required exactly when the matching provider is enabled in the
/// configuration. Missing collaborators are wiring errors reported at build
/// time.
pub struct AuthSessionBuilder {
    config: AuthConfig,
    backend: Option<Arc<dyn IdentityBackend>>,
    store: Option<Arc<dyn ProfileStore>>,
    google_flow: Option<Arc<dyn OAuthFlow>>,
    apple_prompt: Option<Arc<dyn CredentialPrompt>>,
    apple_prompt_timeout: Option<Duration>,
}

impl AuthSessionBuilder {
    /// Set the identity backend.
    pub fn backend(mut self, backend: Arc<dyn IdentityBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Set the profile store.
    pub fn store(mut self, store: Arc<dyn ProfileStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the Google OAuth flow collaborator.
    pub fn google_flow(mut self, flow: Arc<dyn OAuthFlow>) -> Self {
        self.google_flow = Some(flow);
        self
    }

    /// Set the Apple credential prompt collaborator.
    pub fn apple_prompt(mut self, prompt: Arc<dyn CredentialPrompt>) -> Self {
        self.apple_prompt = Some(prompt);
        self
    }

    /// Bound the Apple interactive wait.
    pub fn apple_prompt_timeout(mut self, timeout: Duration) -> Self {
        self.apple_prompt_timeout = Some(timeout);
        self
    }

    /// Build the facade.
    pub fn build(self) -> Result<AuthSession, ConfigError> {
        // Required collaborators (error case first)
        let Some(backend) = self.backend else {
            return Err(ConfigError::MissingCollaborator("identity backend"));
        };
        let Some(store) = self.store else {
            return Err(ConfigError::MissingCollaborator("profile store"));
        };

        let providers = self.config.providers();

        let google = if providers.google {
            let Some(flow) = self.google_flow else {
                return Err(ConfigError::MissingCollaborator("google OAuth flow"));
            };
            Some(GoogleProvider::new(
                Arc::clone(&backend),
                Arc::clone(&store),
                flow,
            ))
        } else {
            None
        };

        let apple = if providers.apple {
            let Some(prompt) = self.apple_prompt else {
                return Err(ConfigError::MissingCollaborator("apple credential prompt"));
            };
            let mut adapter =
                AppleProvider::new(Arc::clone(&backend), Arc::clone(&store), prompt);
            if let Some(timeout) = self.apple_prompt_timeout {
                adapter = adapter.with_prompt_timeout(timeout);
            }
            Some(adapter)
        } else {
            None
        };

        let password = PasswordProvider::new(Arc::clone(&backend), Arc::clone(&store));

        // Broadcast channel for session state changes (capacity: 16)
        let (state_tx, _) = broadcast::channel(16);

        Ok(AuthSession {
            inner: Arc::new(SessionInner {
                config: self.config,
                password,
                google,
                apple,
                biometric: BiometricProvider::new(),
                state: RwLock::new(None),
                state_tx,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::MemoryIdentityBackend;
    use crate::store::memory::MemoryProfileStore;

    fn minimal_session() -> AuthSession {
        let config = AuthConfig::builder("test-key", "test-project")
            .build()
            .unwrap();
        AuthSession::builder(config)
            .backend(Arc::new(MemoryIdentityBackend::new()))
            .store(Arc::new(MemoryProfileStore::new()))
            .build()
            .unwrap()
    }

    #[test]
    fn test_build_requires_backend_and_store() {
        let config = AuthConfig::builder("test-key", "test-project")
            .build()
            .unwrap();
        let result = AuthSession::builder(config.clone()).build();
        assert_eq!(
            result.err(),
            Some(ConfigError::MissingCollaborator("identity backend"))
        );

        let result = AuthSession::builder(config)
            .backend(Arc::new(MemoryIdentityBackend::new()))
            .build();
        assert_eq!(
            result.err(),
            Some(ConfigError::MissingCollaborator("profile store"))
        );
    }

    #[test]
    fn test_build_requires_flow_for_enabled_google() {
        let config = AuthConfig::builder("test-key", "test-project")
            .providers(crate::config::EnabledProviders {
                google: true,
                ..Default::default()
            })
            .build()
            .unwrap();
        let result = AuthSession::builder(config)
            .backend(Arc::new(MemoryIdentityBackend::new()))
            .store(Arc::new(MemoryProfileStore::new()))
            .build();
        assert_eq!(
            result.err(),
            Some(ConfigError::MissingCollaborator("google OAuth flow"))
        );
    }

    #[tokio::test]
    async fn test_initially_unauthenticated() {
        let session = minimal_session();
        assert!(session.current_user().await.is_none());
        assert_eq!(session.current_state().await, SessionState::Unauthenticated);
    }

    #[tokio::test]
    async fn test_registry_round_trip() {
        let session = minimal_session();
        session.register("registry-test").await;

        let found = AuthSession::instance("registry-test").await.unwrap();
        assert!(Arc::ptr_eq(&session.inner, &found.inner));
    }

    #[tokio::test]
    async fn test_unregistered_instance_fails_loudly() {
        let result = AuthSession::instance("never-registered").await;
        assert_eq!(
            result.err(),
            Some(ConfigError::InstanceNotRegistered(
                "never-registered".to_string()
            ))
        );
    }

    #[tokio::test]
    async fn test_disabled_google_is_reported() {
        let session = minimal_session();
        let err = session.sign_in_with_google().await.unwrap_err();
        assert!(matches!(err, AuthError::Unknown(msg) if msg.contains("not enabled")));
    }

    #[tokio::test]
    async fn test_disabled_apple_is_capability_absence() {
        let session = minimal_session();
        let err = session.sign_in_with_apple().await.unwrap_err();
        assert_eq!(err, AuthError::AppleSignInNotAvailable);
    }

    #[tokio::test]
    async fn test_sign_in_validates_email_shape() {
        let session = minimal_session();
        let err = session.sign_in("not-an-email", "password123").await.unwrap_err();
        assert_eq!(err, AuthError::InvalidEmail);
    }

    #[tokio::test]
    async fn test_sign_up_enforces_password_policy() {
        let session = minimal_session();
        let err = session
            .sign_up("user@example.com", "short", "User")
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::WeakPassword);
    }
}
