//! In-memory identity backend
//!
//! Deterministic [`IdentityBackend`] for tests and local development.
//! Accounts live in a map behind an async lock; federated credentials are
//! resolved through a token-to-account table so repeated sign-ins with the
//! same provider token land on the same account. A `fail_next_call` switch
//! makes the next operation fail with a network error, for exercising the
//! caller's error mapping.

use super::backend::{BackendProfileUpdate, BackendUser, Credential, IdentityBackend};
use crate::error::BackendError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct MemoryAccount {
    uid: String,
    email: Option<String>,
    password: Option<String>,
    display_name: Option<String>,
    photo_url: Option<String>,
    email_verified: bool,
}

impl MemoryAccount {
    fn snapshot(&self) -> BackendUser {
        BackendUser {
            uid: self.uid.clone(),
            email: self.email.clone(),
            display_name: self.display_name.clone(),
            photo_url: self.photo_url.clone(),
            email_verified: self.email_verified,
        }
    }
}

/// In-memory identity backend.
#[derive(Default)]
pub struct MemoryIdentityBackend {
    accounts: RwLock<HashMap<String, MemoryAccount>>,
    /// provider token -> account uid
    federated: RwLock<HashMap<String, String>>,
    session: RwLock<Option<String>>,
    fail_next: AtomicBool,
}

impl MemoryIdentityBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next operation fail with a network error.
    pub fn fail_next_call(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    /// Pre-register a federated identity so that authenticating with
    /// `token` resolves to a fixed account. Returns the new account's uid.
    pub async fn register_federated(
        &self,
        token: impl Into<String>,
        email: Option<&str>,
        display_name: Option<&str>,
        email_verified: bool,
    ) -> String {
        let uid = Uuid::new_v4().to_string();
        let account = MemoryAccount {
            uid: uid.clone(),
            email: email.map(str::to_string),
            password: None,
            display_name: display_name.map(str::to_string),
            photo_url: None,
            email_verified,
        };
        self.accounts.write().await.insert(uid.clone(), account);
        self.federated.write().await.insert(token.into(), uid.clone());
        uid
    }

    fn take_failure(&self) -> Result<(), BackendError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(BackendError::Network("injected network failure".to_string()));
        }
        Ok(())
    }

    async fn current_uid(&self) -> Result<String, BackendError> {
        let session = self.session.read().await;
        match session.as_ref() {
            None => Err(BackendError::Code {
                code: "USER_NOT_FOUND".to_string(),
                message: "no active backend session".to_string(),
            }),
            Some(uid) => Ok(uid.clone()),
        }
    }

    fn federated_token(credential: &Credential) -> Option<&str> {
        match credential {
            Credential::OAuth {
                id_token,
                access_token,
                ..
            } => id_token.as_deref().or(access_token.as_deref()),
            Credential::EmailPassword { .. } => None,
        }
    }

    async fn verify(&self, credential: &Credential) -> Result<String, BackendError> {
        match credential {
            Credential::EmailPassword { email, password } => {
                let accounts = self.accounts.read().await;
                let account = accounts
                    .values()
                    .find(|account| account.email.as_deref() == Some(email.as_str()));
                let Some(account) = account else {
                    return Err(BackendError::Code {
                        code: "EMAIL_NOT_FOUND".to_string(),
                        message: "EMAIL_NOT_FOUND".to_string(),
                    });
                };
                if account.password.as_deref() != Some(password.as_str()) {
                    return Err(BackendError::Code {
                        code: "INVALID_PASSWORD".to_string(),
                        message: "INVALID_PASSWORD".to_string(),
                    });
                }
                Ok(account.uid.clone())
            }
            oauth @ Credential::OAuth { .. } => {
                let Some(token) = Self::federated_token(oauth) else {
                    return Err(BackendError::Malformed(
                        "federated credential requires id_token or access_token".to_string(),
                    ));
                };

                if let Some(uid) = self.federated.read().await.get(token) {
                    return Ok(uid.clone());
                }

                // First sign-in with this provider token mints an account;
                // later sign-ins resolve to the same uid.
                let uid = self
                    .register_federated(token.to_string(), None, None, false)
                    .await;
                Ok(uid)
            }
        }
    }
}

#[async_trait]
impl IdentityBackend for MemoryIdentityBackend {
    async fn authenticate(&self, credential: Credential) -> Result<BackendUser, BackendError> {
        self.take_failure()?;
        let uid = self.verify(&credential).await?;

        let accounts = self.accounts.read().await;
        let Some(account) = accounts.get(&uid) else {
            return Err(BackendError::Code {
                code: "USER_NOT_FOUND".to_string(),
                message: "USER_NOT_FOUND".to_string(),
            });
        };
        let snapshot = account.snapshot();
        drop(accounts);

        let mut session = self.session.write().await;
        *session = Some(uid);
        Ok(snapshot)
    }

    async fn create_account(
        &self,
        email: &str,
        password: &str,
    ) -> Result<BackendUser, BackendError> {
        self.take_failure()?;

        let mut accounts = self.accounts.write().await;
        // Duplicate email check (error case first)
        if accounts
            .values()
            .any(|account| account.email.as_deref() == Some(email))
        {
            return Err(BackendError::Code {
                code: "EMAIL_EXISTS".to_string(),
                message: "EMAIL_EXISTS".to_string(),
            });
        }

        let uid = Uuid::new_v4().to_string();
        let account = MemoryAccount {
            uid: uid.clone(),
            email: Some(email.to_string()),
            password: Some(password.to_string()),
            display_name: None,
            photo_url: None,
            email_verified: false,
        };
        let snapshot = account.snapshot();
        accounts.insert(uid.clone(), account);
        drop(accounts);

        let mut session = self.session.write().await;
        *session = Some(uid);
        Ok(snapshot)
    }

    async fn send_password_reset(&self, email: &str) -> Result<(), BackendError> {
        self.take_failure()?;
        let accounts = self.accounts.read().await;
        if !accounts
            .values()
            .any(|account| account.email.as_deref() == Some(email))
        {
            return Err(BackendError::Code {
                code: "EMAIL_NOT_FOUND".to_string(),
                message: "EMAIL_NOT_FOUND".to_string(),
            });
        }
        Ok(())
    }

    async fn reauthenticate(&self, credential: Credential) -> Result<(), BackendError> {
        self.take_failure()?;
        let current = self.current_uid().await?;
        let verified = self.verify(&credential).await?;
        if verified != current {
            return Err(BackendError::Code {
                code: "USER_MISMATCH".to_string(),
                message: "credential belongs to a different account".to_string(),
            });
        }
        Ok(())
    }

    async fn update_password(&self, new_password: &str) -> Result<(), BackendError> {
        self.take_failure()?;
        let uid = self.current_uid().await?;
        let mut accounts = self.accounts.write().await;
        match accounts.get_mut(&uid) {
            None => Err(BackendError::Code {
                code: "USER_NOT_FOUND".to_string(),
                message: "USER_NOT_FOUND".to_string(),
            }),
            Some(account) => {
                account.password = Some(new_password.to_string());
                Ok(())
            }
        }
    }

    async fn update_profile(&self, update: BackendProfileUpdate) -> Result<(), BackendError> {
        self.take_failure()?;
        let uid = self.current_uid().await?;
        let mut accounts = self.accounts.write().await;
        match accounts.get_mut(&uid) {
            None => Err(BackendError::Code {
                code: "USER_NOT_FOUND".to_string(),
                message: "USER_NOT_FOUND".to_string(),
            }),
            Some(account) => {
                if let Some(display_name) = update.display_name {
                    account.display_name = Some(display_name);
                }
                if let Some(photo_url) = update.photo_url {
                    account.photo_url = Some(photo_url);
                }
                Ok(())
            }
        }
    }

    async fn delete_current_account(&self) -> Result<(), BackendError> {
        self.take_failure()?;
        let uid = self.current_uid().await?;

        let mut accounts = self.accounts.write().await;
        accounts.remove(&uid);
        drop(accounts);

        let mut federated = self.federated.write().await;
        federated.retain(|_, mapped| mapped != &uid);
        drop(federated);

        let mut session = self.session.write().await;
        *session = None;
        Ok(())
    }

    async fn sign_out(&self) {
        let mut session = self.session.write().await;
        *session = None;
    }

    async fn current_user(&self) -> Option<BackendUser> {
        let uid = self.session.read().await.clone()?;
        let accounts = self.accounts.read().await;
        accounts.get(&uid).map(MemoryAccount::snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_then_authenticate() {
        let backend = MemoryIdentityBackend::new();
        let created = backend
            .create_account("user@example.com", "password1")
            .await
            .unwrap();

        backend.sign_out().await;
        assert!(backend.current_user().await.is_none());

        let signed_in = backend
            .authenticate(Credential::EmailPassword {
                email: "user@example.com".to_string(),
                password: "password1".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(signed_in.uid, created.uid);
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let backend = MemoryIdentityBackend::new();
        backend
            .create_account("user@example.com", "password1")
            .await
            .unwrap();
        let result = backend.create_account("user@example.com", "password2").await;
        assert!(matches!(
            result,
            Err(BackendError::Code { code, .. }) if code == "EMAIL_EXISTS"
        ));
    }

    #[tokio::test]
    async fn test_wrong_password_code() {
        let backend = MemoryIdentityBackend::new();
        backend
            .create_account("user@example.com", "password1")
            .await
            .unwrap();
        let result = backend
            .authenticate(Credential::EmailPassword {
                email: "user@example.com".to_string(),
                password: "wrong".to_string(),
            })
            .await;
        assert!(matches!(
            result,
            Err(BackendError::Code { code, .. }) if code == "INVALID_PASSWORD"
        ));
    }

    #[tokio::test]
    async fn test_federated_token_is_stable() {
        let backend = MemoryIdentityBackend::new();
        let credential = || Credential::OAuth {
            provider_id: "google.com".to_string(),
            id_token: Some("token-1".to_string()),
            access_token: None,
            raw_nonce: None,
        };

        let first = backend.authenticate(credential()).await.unwrap();
        let second = backend.authenticate(credential()).await.unwrap();
        assert_eq!(first.uid, second.uid);
    }

    #[tokio::test]
    async fn test_fail_next_call_is_one_shot() {
        let backend = MemoryIdentityBackend::new();
        backend.fail_next_call();

        let result = backend.create_account("user@example.com", "password1").await;
        assert!(matches!(result, Err(BackendError::Network(_))));

        // Switch resets after the failure
        backend
            .create_account("user@example.com", "password1")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_reauthenticate_checks_account_identity() {
        let backend = MemoryIdentityBackend::new();
        backend
            .create_account("a@example.com", "password1")
            .await
            .unwrap();
        backend
            .create_account("b@example.com", "password2")
            .await
            .unwrap();

        // Session currently belongs to b; a's credential must be rejected
        let result = backend
            .reauthenticate(Credential::EmailPassword {
                email: "a@example.com".to_string(),
                password: "password1".to_string(),
            })
            .await;
        assert!(matches!(
            result,
            Err(BackendError::Code { code, .. }) if code == "USER_MISMATCH"
        ));
    }

    #[tokio::test]
    async fn test_delete_removes_account_and_session() {
        let backend = MemoryIdentityBackend::new();
        backend
            .create_account("user@example.com", "password1")
            .await
            .unwrap();
        backend.delete_current_account().await.unwrap();

        assert!(backend.current_user().await.is_none());
        let result = backend
            .authenticate(Credential::EmailPassword {
                email: "user@example.com".to_string(),
                password: "password1".to_string(),
            })
            .await;
        assert!(matches!(
            result,
            Err(BackendError::Code { code, .. }) if code == "EMAIL_NOT_FOUND"
        ));
    }
}
