//! Error types for the authentication facade
//!
//! # Design
//! The public surface exposes exactly one closed taxonomy, [`AuthError`].
//! Collaborator boundaries (identity backend, profile store, interactive
//! prompts) have their own internal error types which adapters map into the
//! taxonomy before anything reaches a caller; backend-native errors never
//! leak past an adapter.
//!
//! Uses thiserror for ergonomic error definitions. All errors implement
//! std::error::Error.

use thiserror::Error;

/// Closed set of authentication failure kinds surfaced to applications.
///
/// Every public operation either returns a valid user or fails with exactly
/// one of these kinds. Equality compares the kind (and the carried message
/// for [`AuthError::Unknown`]), not the display text.
///
/// # Example
/// ```
/// use authkit::AuthError;
///
/// let err = AuthError::from_backend_code("EMAIL_NOT_FOUND", "EMAIL_NOT_FOUND");
/// assert_eq!(err, AuthError::UserNotFound);
/// ```
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Email address is malformed or rejected by the backend
    #[error("Invalid email address")]
    InvalidEmail,

    /// Password does not match the account
    #[error("Wrong password")]
    WrongPassword,

    /// No account exists for the given identity, or the operation requires
    /// an authenticated session and none is active
    #[error("User not found")]
    UserNotFound,

    /// Email already in use by another account
    #[error("Email already in use")]
    EmailAlreadyInUse,

    /// Password does not satisfy the configured policy
    #[error("Password is too weak")]
    WeakPassword,

    /// Google sign-in flow failed
    #[error("Google sign-in failed")]
    GoogleSignInFailed,

    /// Apple sign-in flow failed outright
    #[error("Apple sign-in failed")]
    AppleSignInFailed,

    /// The user dismissed the Apple sign-in prompt
    #[error("Apple sign-in was cancelled")]
    AppleSignInCancelled,

    /// Apple sign-in is not available in this environment or configuration
    #[error("Apple sign-in is not available")]
    AppleSignInNotAvailable,

    /// Network request failed; retry policy belongs to the caller
    #[error("Network error, please check your connection")]
    NetworkError,

    /// Anything the taxonomy does not name; carries the original diagnostic
    #[error("{0}")]
    Unknown(String),
}

impl AuthError {
    /// Create an `Unknown` error from a diagnostic message
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::Unknown(message.into())
    }

    /// Translate an identity-backend error code into the taxonomy.
    ///
    /// Recognized codes map 1:1; anything else becomes [`AuthError::Unknown`]
    /// carrying the backend's original message.
    pub fn from_backend_code(code: &str, message: &str) -> Self {
        match code {
            "EMAIL_NOT_FOUND" | "USER_NOT_FOUND" | "USER_DELETED" => Self::UserNotFound,
            "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" => Self::WrongPassword,
            "EMAIL_EXISTS" => Self::EmailAlreadyInUse,
            "INVALID_EMAIL" | "MISSING_EMAIL" => Self::InvalidEmail,
            "WEAK_PASSWORD" => Self::WeakPassword,
            "NETWORK_REQUEST_FAILED" => Self::NetworkError,
            _ => {
                let detail = if message.is_empty() { code } else { message };
                Self::Unknown(detail.to_string())
            }
        }
    }

    /// Whether the failure came from the user dismissing an interactive flow
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::AppleSignInCancelled)
    }

    /// Whether retrying the same operation could plausibly succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NetworkError)
    }
}

/// Identity-backend native failure.
///
/// Produced by [`IdentityBackend`](crate::backend::backend::IdentityBackend)
/// implementations; adapters map it into [`AuthError`] via `From`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Backend rejected the request with a named error code
    #[error("backend error {code}: {message}")]
    Code {
        /// Backend error code, e.g. `EMAIL_NOT_FOUND`
        code: String,
        /// Original backend message, preserved verbatim
        message: String,
    },

    /// Transport-level failure reaching the backend
    #[error("network request failed: {0}")]
    Network(String),

    /// Response arrived but could not be interpreted
    #[error("malformed backend response: {0}")]
    Malformed(String),
}

impl BackendError {
    /// Build a `Code` error from a backend error-body message.
    ///
    /// Backend messages arrive either as a bare code (`EMAIL_NOT_FOUND`) or
    /// as `CODE : human detail`; the code is the first whitespace-separated
    /// token either way.
    pub fn from_error_message(message: &str) -> Self {
        let code = message.split_whitespace().next().unwrap_or("UNKNOWN_ERROR");
        Self::Code {
            code: code.to_string(),
            message: message.to_string(),
        }
    }
}

impl From<BackendError> for AuthError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Code { code, message } => Self::from_backend_code(&code, &message),
            BackendError::Network(_) => Self::NetworkError,
            BackendError::Malformed(detail) => Self::Unknown(detail),
        }
    }
}

/// Profile-store failure.
///
/// Data-integrity problems (missing or malformed persisted documents) map to
/// [`AuthError::Unknown`] with a descriptive message, never silently coerced
/// into defaults that could mask corruption.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Document does not exist
    #[error("document not found")]
    NotFound,

    /// Transport-level failure reaching the store
    #[error("store request failed: {0}")]
    Network(String),

    /// Stored data did not match the expected document shape
    #[error("invalid document data: {0}")]
    Serialization(String),

    /// Store-side failure with no further classification
    #[error("store internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => Self::Unknown("profile record not found".to_string()),
            StoreError::Network(_) => Self::NetworkError,
            StoreError::Serialization(detail) => {
                Self::Unknown(format!("invalid profile data: {}", detail))
            }
            StoreError::Internal(detail) => Self::Unknown(detail),
        }
    }
}

/// Outcome of an interactive credential request that did not produce a
/// credential.
///
/// The three variants are deliberately distinct and must never be conflated:
/// `Cancelled` is the user dismissing the prompt, `NotAvailable` means the
/// capability is absent in this environment, `Failed` is an outright failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PromptError {
    /// The user dismissed the prompt
    #[error("the user cancelled the request")]
    Cancelled,

    /// The capability is absent on this device or environment
    #[error("interactive credentials are not available in this environment")]
    NotAvailable,

    /// The flow failed outright
    #[error("credential request failed: {0}")]
    Failed(String),
}

/// Configuration and wiring errors.
///
/// These are programming errors in host setup, reported loudly at
/// construction time rather than surfacing as runtime auth failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// API key missing or empty
    #[error("API key is not configured")]
    ApiKeyNotConfigured,

    /// Project identifier missing or empty
    #[error("project ID is not configured")]
    ProjectIdNotConfigured,

    /// A required collaborator was not supplied to the builder
    #[error("missing collaborator: {0}")]
    MissingCollaborator(&'static str),

    /// No session was registered under the requested name
    #[error("no session named '{0}' is registered; call AuthSession::register() first")]
    InstanceNotRegistered(String),
}
