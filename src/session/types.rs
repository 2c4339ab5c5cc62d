//! Session types
//!
//! The user record and the session state machine's states.

use crate::backend::backend::BackendUser;
use crate::store::store::ProfileDocument;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// An authenticated identity, immutable once constructed.
///
/// The record is always reconciled from the profile store and the identity
/// backend, never assumed. Two records with the same `id` are the same
/// identity regardless of other field drift, so equality and hashing are
/// defined over `id` alone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Opaque stable identifier issued by the identity backend
    pub id: String,

    /// Email address; may be a synthesized placeholder when the provider
    /// withholds the real one
    pub email: String,

    /// Human-readable name, never empty
    pub display_name: String,

    /// Set once at first profile creation
    pub created_at: DateTime<Utc>,

    /// Refreshed on every profile mutation
    pub updated_at: DateTime<Utc>,

    /// Optional avatar reference
    pub profile_image_url: Option<String>,

    /// Provider-asserted email verification state
    pub is_email_verified: bool,
}

impl User {
    /// Reconcile a user record from the backend snapshot and its profile
    /// document. The profile document is authoritative for profile fields;
    /// the backend is authoritative for the identifier and asserts email
    /// verification.
    pub(crate) fn from_parts(backend_user: &BackendUser, document: &ProfileDocument) -> Self {
        Self {
            id: backend_user.uid.clone(),
            email: document.email.clone(),
            display_name: document.display_name.clone(),
            created_at: document.created_at,
            updated_at: document.updated_at,
            profile_image_url: document.profile_image_url.clone(),
            is_email_verified: document.is_email_verified || backend_user.email_verified,
        }
    }

    /// Build a user record from a stored profile document alone.
    pub fn from_profile(id: impl Into<String>, document: &ProfileDocument) -> Self {
        Self {
            id: id.into(),
            email: document.email.clone(),
            display_name: document.display_name.clone(),
            created_at: document.created_at,
            updated_at: document.updated_at,
            profile_image_url: document.profile_image_url.clone(),
            is_email_verified: document.is_email_verified,
        }
    }
}

impl PartialEq for User {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for User {}

impl Hash for User {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// The facade's session state: exactly one of these at any time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SessionState {
    /// No identity is signed in
    #[default]
    Unauthenticated,
    /// An identity is signed in
    Authenticated(Arc<User>),
}

impl SessionState {
    /// The signed-in user, if any
    pub fn user(&self) -> Option<Arc<User>> {
        match self {
            Self::Authenticated(user) => Some(Arc::clone(user)),
            Self::Unauthenticated => None,
        }
    }

    /// Whether an identity is signed in
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }
}

/// Profile mutation request; `None` fields are left unchanged.
///
/// # Example
/// ```
/// use authkit::ProfileUpdate;
///
/// let update = ProfileUpdate::default()
///     .display_name("Alice Smith")
///     .profile_image_url("https://example.com/avatar.png");
/// assert!(update.display_name.is_some());
/// ```
#[derive(Debug, Default, Clone)]
pub struct ProfileUpdate {
    /// Display name to set (None = no change)
    pub display_name: Option<String>,

    /// Avatar URL to set (None = no change)
    pub profile_image_url: Option<String>,
}

impl ProfileUpdate {
    /// Set the display name
    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Set the avatar URL
    pub fn profile_image_url(mut self, url: impl Into<String>) -> Self {
        self.profile_image_url = Some(url.into());
        self
    }

    /// Whether the update changes anything at all
    pub fn is_empty(&self) -> bool {
        self.display_name.is_none() && self.profile_image_url.is_none()
    }
}
