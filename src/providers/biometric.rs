//! Biometric adapter (stub)
//!
//! Device-level biometric gating is not implemented. Every call fails with
//! a clearly labeled error so callers relying on biometric protection are
//! never misled into believing they are covered by a silent success.

use super::provider::{AuthProvider, Capability, ProviderKind, SignInCredential};
use crate::error::AuthError;
use crate::session::types::User;
use async_trait::async_trait;

const CAPABILITIES: &[Capability] = &[Capability::SignIn];

pub(crate) const NOT_IMPLEMENTED: &str = "biometric authentication is not implemented";

/// Biometric provider stub.
#[derive(Debug, Default)]
pub struct BiometricProvider;

impl BiometricProvider {
    /// Create the stub adapter.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AuthProvider for BiometricProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Biometric
    }

    fn capabilities(&self) -> &'static [Capability] {
        CAPABILITIES
    }

    async fn sign_in(&self, _credential: SignInCredential) -> Result<User, AuthError> {
        Err(AuthError::unknown(NOT_IMPLEMENTED))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sign_in_never_silently_succeeds() {
        let provider = BiometricProvider::new();
        let err = provider
            .sign_in(SignInCredential::Interactive)
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::Unknown(NOT_IMPLEMENTED.to_string()));
    }

    #[tokio::test]
    async fn test_other_operations_are_unsupported() {
        let provider = BiometricProvider::new();
        assert!(!provider.supports(Capability::SignUp));
        let err = provider.delete_account().await.unwrap_err();
        assert!(matches!(err, AuthError::Unknown(_)));
    }
}
