//! AuthKit
//!
//! Provider-agnostic authentication session facade: one async client
//! surface over heterogeneous identity providers (email/password, Google
//! OAuth, Apple platform credential, biometric stub), with a single closed
//! error taxonomy, one user-record shape, and pluggable collaborator ports
//! for the identity backend and the profile document store.
//!
//! # Example (Email/Password)
//! ```no_run
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! use authkit::{AuthConfig, AuthSession};
//! use authkit::backend::rest::RestIdentityBackend;
//! use authkit::store::rest::RestProfileStore;
//! use std::sync::Arc;
//!
//! let config = AuthConfig::builder("YOUR_API_KEY", "your-project").build()?;
//! let session = AuthSession::builder(config)
//!     .backend(Arc::new(RestIdentityBackend::new("YOUR_API_KEY")?))
//!     .store(Arc::new(RestProfileStore::new("your-project")?))
//!     .build()?;
//!
//! let user = session.sign_in("user@example.com", "password").await?;
//! println!("Signed in: {}", user.id);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod interactive;
pub mod validation;

// Identity backend port and bundled implementations
pub mod backend {
    //! Identity backend port

    pub mod backend;
    pub mod memory;
    pub mod rest;

    pub use backend::{BackendProfileUpdate, BackendUser, Credential, IdentityBackend};
}

// Profile store port and bundled implementations
pub mod store {
    //! Profile store port

    pub mod memory;
    pub mod rest;
    pub mod store;

    pub use store::{ProfileDocument, ProfilePatch, ProfileStore};
}

// One adapter per identity method
pub mod providers {
    //! Provider adapters

    pub mod apple;
    pub mod biometric;
    pub mod google;
    pub mod password;
    pub mod provider;

    pub use provider::{AuthProvider, Capability, ProviderKind, SignInCredential};
}

// Session facade and user model
pub mod session {
    //! Session facade

    pub mod session;
    pub mod types;

    pub use session::AuthSession;
}

// Re-exports for convenience
pub use config::{AuthConfig, Branding, EnabledProviders, PasswordPolicy};
pub use error::{AuthError, BackendError, ConfigError, PromptError, StoreError};
pub use session::session::{AuthSession, AuthSessionBuilder};
pub use session::types::{ProfileUpdate, SessionState, User};
