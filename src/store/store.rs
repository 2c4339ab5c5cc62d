//! Profile store port
//!
//! Document-oriented persistence for profile records, keyed by the backend
//! user id. `set` is a full replace; `update` is a merge that fails when the
//! document is absent, so callers choose the create-vs-update path with an
//! existence check.

use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Application-level user metadata, distinct from backend-held credential
/// state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProfileDocument {
    /// Email recorded at profile creation or last refresh
    pub email: String,
    /// Display name, never empty
    pub display_name: String,
    /// Set once when the record is first created
    pub created_at: DateTime<Utc>,
    /// Refreshed on every mutation
    pub updated_at: DateTime<Utc>,
    /// Optional avatar reference
    pub profile_image_url: Option<String>,
    /// Whether the identity's email is considered verified
    pub is_email_verified: bool,
}

/// Merge patch for a profile document. `updated_at` is mandatory: every
/// mutation refreshes the timestamp; `created_at` is never touched.
#[derive(Debug, Clone)]
pub struct ProfilePatch {
    /// Email to set, if any
    pub email: Option<String>,
    /// Display name to set, if any
    pub display_name: Option<String>,
    /// Avatar URL to set, if any
    pub profile_image_url: Option<String>,
    /// Verification flag to set, if any
    pub is_email_verified: Option<bool>,
    /// New mutation timestamp
    pub updated_at: DateTime<Utc>,
}

impl ProfilePatch {
    /// A patch that only refreshes the mutation timestamp.
    pub fn touch(updated_at: DateTime<Utc>) -> Self {
        Self {
            email: None,
            display_name: None,
            profile_image_url: None,
            is_email_verified: None,
            updated_at,
        }
    }

    /// Set the email
    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

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

    /// Set the verification flag
    pub fn email_verified(mut self, verified: bool) -> Self {
        self.is_email_verified = Some(verified);
        self
    }
}

impl ProfileDocument {
    /// Apply a merge patch in place.
    pub fn apply(&mut self, patch: &ProfilePatch) {
        if let Some(ref email) = patch.email {
            self.email = email.clone();
        }
        if let Some(ref display_name) = patch.display_name {
            self.display_name = display_name.clone();
        }
        if let Some(ref url) = patch.profile_image_url {
            self.profile_image_url = Some(url.clone());
        }
        if let Some(verified) = patch.is_email_verified {
            self.is_email_verified = verified;
        }
        self.updated_at = patch.updated_at;
    }
}

/// Operations the profile store exposes to the facade.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Fetch the document for `id`, or `None` when absent.
    async fn get(&self, id: &str) -> Result<Option<ProfileDocument>, StoreError>;

    /// Create or fully replace the document for `id`.
    async fn set(&self, id: &str, document: &ProfileDocument) -> Result<(), StoreError>;

    /// Merge `patch` into the existing document for `id`; fails with
    /// [`StoreError::NotFound`] when the document is absent.
    async fn update(&self, id: &str, patch: &ProfilePatch) -> Result<(), StoreError>;

    /// Whether a document exists for `id`.
    async fn exists(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self.get(id).await?.is_some())
    }
}
