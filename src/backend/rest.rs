//! REST identity backend
//!
//! Bundled [`IdentityBackend`] implementation speaking an identity-toolkit
//! style REST surface. The active session token is the backend connection
//! handle: account-scoped operations send it as `idToken` and fail with
//! `USER_NOT_FOUND` when no session is held.

use super::backend::{BackendProfileUpdate, BackendUser, Credential, IdentityBackend};
use crate::error::BackendError;
use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, warn};

const DEFAULT_BASE_URL: &str = "https://identitytoolkit.googleapis.com/v1";

/// Identity backend over the identity-toolkit REST API.
///
/// # Example
/// ```no_run
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// use authkit::backend::rest::RestIdentityBackend;
/// use authkit::backend::backend::{Credential, IdentityBackend};
///
/// let backend = RestIdentityBackend::new("YOUR_API_KEY")?;
/// let user = backend
///     .authenticate(Credential::EmailPassword {
///         email: "user@example.com".to_string(),
///         password: "password".to_string(),
///     })
///     .await?;
/// println!("signed in: {}", user.uid);
/// # Ok(())
/// # }
/// ```
pub struct RestIdentityBackend {
    api_key: String,
    base_url: String,
    http_client: reqwest::Client,
    session: RwLock<Option<RestSession>>,
}

struct RestSession {
    id_token: String,
    user: BackendUser,
}

/// REST sign-in response shared by the password, sign-up and IdP endpoints.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInResponse {
    local_id: String,
    email: Option<String>,
    display_name: Option<String>,
    photo_url: Option<String>,
    id_token: String,
    #[serde(default)]
    email_verified: bool,
}

impl SignInResponse {
    fn into_parts(self) -> (String, BackendUser) {
        let user = BackendUser {
            uid: self.local_id,
            email: self.email,
            display_name: self.display_name,
            photo_url: self.photo_url,
            email_verified: self.email_verified,
        };
        (self.id_token, user)
    }
}

impl RestIdentityBackend {
    /// Create a backend client for the given API key.
    pub fn new(api_key: impl Into<String>) -> Result<Self, BackendError> {
        let api_key = api_key.into();

        // Validate API key (error case first)
        if api_key.is_empty() {
            return Err(BackendError::Malformed("API key cannot be empty".to_string()));
        }

        let http_client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| BackendError::Network(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            http_client,
            session: RwLock::new(None),
        })
    }

    /// Point the client at a different REST endpoint, e.g. a local emulator.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/accounts:{}?key={}", self.base_url, method, self.api_key)
    }

    async fn post(
        &self,
        method: &str,
        body: serde_json::Value,
    ) -> Result<serde_json::Value, BackendError> {
        let response = self
            .http_client
            .post(self.endpoint(method))
            .json(&body)
            .send()
            .await
            .map_err(|e| BackendError::Network(e.to_string()))?;

        // Handle error responses first
        if !response.status().is_success() {
            let error_body: serde_json::Value = response
                .json()
                .await
                .map_err(|e| BackendError::Malformed(format!("failed to parse error body: {}", e)))?;
            let message = error_body["error"]["message"].as_str().unwrap_or("UNKNOWN_ERROR");
            warn!(method, code = message, "backend rejected request");
            return Err(BackendError::from_error_message(message));
        }

        response
            .json()
            .await
            .map_err(|e| BackendError::Malformed(format!("failed to parse response: {}", e)))
    }

    async fn sign_in_request(
        &self,
        method: &str,
        body: serde_json::Value,
    ) -> Result<BackendUser, BackendError> {
        let value = self.post(method, body).await?;
        let parsed: SignInResponse = serde_json::from_value(value)
            .map_err(|e| BackendError::Malformed(format!("unexpected sign-in response: {}", e)))?;
        let (id_token, user) = parsed.into_parts();

        let mut session = self.session.write().await;
        *session = Some(RestSession {
            id_token,
            user: user.clone(),
        });

        Ok(user)
    }

    async fn current_token(&self) -> Result<String, BackendError> {
        let session = self.session.read().await;
        match session.as_ref() {
            None => Err(BackendError::Code {
                code: "USER_NOT_FOUND".to_string(),
                message: "no active backend session".to_string(),
            }),
            Some(active) => Ok(active.id_token.clone()),
        }
    }

    fn idp_post_body(
        provider_id: &str,
        id_token: Option<&str>,
        access_token: Option<&str>,
        raw_nonce: Option<&str>,
    ) -> String {
        let mut post_body = format!("providerId={}", provider_id);
        if let Some(token) = id_token {
            post_body.push_str(&format!("&id_token={}", token));
        }
        if let Some(token) = access_token {
            post_body.push_str(&format!("&access_token={}", token));
        }
        if let Some(nonce) = raw_nonce {
            post_body.push_str(&format!("&nonce={}", nonce));
        }
        post_body
    }
}

#[async_trait]
impl IdentityBackend for RestIdentityBackend {
    async fn authenticate(&self, credential: Credential) -> Result<BackendUser, BackendError> {
        match credential {
            Credential::EmailPassword { email, password } => {
                debug!(%email, "authenticating with password");
                self.sign_in_request(
                    "signInWithPassword",
                    serde_json::json!({
                        "email": email,
                        "password": password,
                        "returnSecureToken": true
                    }),
                )
                .await
            }
            Credential::OAuth {
                provider_id,
                id_token,
                access_token,
                raw_nonce,
            } => {
                // Error-first: a federated credential needs at least one token
                if id_token.is_none() && access_token.is_none() {
                    return Err(BackendError::Malformed(
                        "federated credential requires id_token or access_token".to_string(),
                    ));
                }
                let post_body = Self::idp_post_body(
                    &provider_id,
                    id_token.as_deref(),
                    access_token.as_deref(),
                    raw_nonce.as_deref(),
                );
                debug!(provider = %provider_id, "authenticating with IdP");
                self.sign_in_request(
                    "signInWithIdp",
                    serde_json::json!({
                        "postBody": post_body,
                        "requestUri": "http://localhost",
                        "returnSecureToken": true,
                        "returnIdpCredential": true
                    }),
                )
                .await
            }
        }
    }

    async fn create_account(
        &self,
        email: &str,
        password: &str,
    ) -> Result<BackendUser, BackendError> {
        debug!(%email, "creating account");
        self.sign_in_request(
            "signUp",
            serde_json::json!({
                "email": email,
                "password": password,
                "returnSecureToken": true
            }),
        )
        .await
    }

    async fn send_password_reset(&self, email: &str) -> Result<(), BackendError> {
        self.post(
            "sendOobCode",
            serde_json::json!({
                "requestType": "PASSWORD_RESET",
                "email": email
            }),
        )
        .await?;
        Ok(())
    }

    async fn reauthenticate(&self, credential: Credential) -> Result<(), BackendError> {
        let current_uid = {
            let session = self.session.read().await;
            match session.as_ref() {
                None => {
                    return Err(BackendError::Code {
                        code: "USER_NOT_FOUND".to_string(),
                        message: "no active backend session".to_string(),
                    })
                }
                Some(active) => active.user.uid.clone(),
            }
        };

        // Re-verify the credential through the normal sign-in endpoints, then
        // check it resolved to the same account.
        let user = self.authenticate(credential).await?;
        if user.uid != current_uid {
            return Err(BackendError::Code {
                code: "USER_MISMATCH".to_string(),
                message: "credential belongs to a different account".to_string(),
            });
        }
        Ok(())
    }

    async fn update_password(&self, new_password: &str) -> Result<(), BackendError> {
        let id_token = self.current_token().await?;
        let value = self
            .post(
                "update",
                serde_json::json!({
                    "idToken": id_token,
                    "password": new_password,
                    "returnSecureToken": true
                }),
            )
            .await?;

        // The endpoint rotates the session token on password change
        if let Some(new_token) = value["idToken"].as_str() {
            let mut session = self.session.write().await;
            if let Some(active) = session.as_mut() {
                active.id_token = new_token.to_string();
            }
        }
        Ok(())
    }

    async fn update_profile(&self, update: BackendProfileUpdate) -> Result<(), BackendError> {
        let id_token = self.current_token().await?;

        let mut body = serde_json::json!({
            "idToken": id_token,
            "returnSecureToken": true
        });
        if let Some(ref display_name) = update.display_name {
            body["displayName"] = serde_json::json!(display_name);
        }
        if let Some(ref photo_url) = update.photo_url {
            body["photoUrl"] = serde_json::json!(photo_url);
        }

        self.post("update", body).await?;

        let mut session = self.session.write().await;
        if let Some(active) = session.as_mut() {
            if let Some(display_name) = update.display_name {
                active.user.display_name = Some(display_name);
            }
            if let Some(photo_url) = update.photo_url {
                active.user.photo_url = Some(photo_url);
            }
        }
        Ok(())
    }

    async fn delete_current_account(&self) -> Result<(), BackendError> {
        let id_token = self.current_token().await?;
        self.post("delete", serde_json::json!({ "idToken": id_token }))
            .await?;

        let mut session = self.session.write().await;
        *session = None;
        Ok(())
    }

    async fn sign_out(&self) {
        let mut session = self.session.write().await;
        *session = None;
    }

    async fn current_user(&self) -> Option<BackendUser> {
        let session = self.session.read().await;
        session.as_ref().map(|active| active.user.clone())
    }
}

impl std::fmt::Debug for RestIdentityBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestIdentityBackend")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}
