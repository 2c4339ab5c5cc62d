//! In-memory profile store
//!
//! Deterministic [`ProfileStore`] for tests and local development, with the
//! same fail-next switch as the in-memory backend.

use super::store::{ProfileDocument, ProfilePatch, ProfileStore};
use crate::error::StoreError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

/// In-memory document store keyed by backend user id.
#[derive(Default)]
pub struct MemoryProfileStore {
    documents: RwLock<HashMap<String, ProfileDocument>>,
    fail_next: AtomicBool,
}

impl MemoryProfileStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next operation fail with a network error.
    pub fn fail_next_call(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    /// Number of stored documents.
    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    /// Whether the store holds no documents.
    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }

    /// Remove the document for `id`, if present. Test convenience for
    /// simulating store/backend drift.
    pub async fn remove(&self, id: &str) -> Option<ProfileDocument> {
        self.documents.write().await.remove(id)
    }

    fn take_failure(&self) -> Result<(), StoreError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Network("injected network failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn get(&self, id: &str) -> Result<Option<ProfileDocument>, StoreError> {
        self.take_failure()?;
        Ok(self.documents.read().await.get(id).cloned())
    }

    async fn set(&self, id: &str, document: &ProfileDocument) -> Result<(), StoreError> {
        self.take_failure()?;
        self.documents
            .write()
            .await
            .insert(id.to_string(), document.clone());
        Ok(())
    }

    async fn update(&self, id: &str, patch: &ProfilePatch) -> Result<(), StoreError> {
        self.take_failure()?;
        let mut documents = self.documents.write().await;
        match documents.get_mut(id) {
            None => Err(StoreError::NotFound),
            Some(document) => {
                document.apply(patch);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_document() -> ProfileDocument {
        let now = Utc::now();
        ProfileDocument {
            email: "user@example.com".to_string(),
            display_name: "User".to_string(),
            created_at: now,
            updated_at: now,
            profile_image_url: None,
            is_email_verified: false,
        }
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let store = MemoryProfileStore::new();
        let doc = sample_document();
        store.set("uid-1", &doc).await.unwrap();

        let fetched = store.get("uid-1").await.unwrap().unwrap();
        assert_eq!(fetched, doc);
        assert!(store.exists("uid-1").await.unwrap());
        assert!(!store.exists("uid-2").await.unwrap());
    }

    #[tokio::test]
    async fn test_update_absent_document_is_not_found() {
        let store = MemoryProfileStore::new();
        let patch = ProfilePatch::touch(Utc::now());
        let result = store.update("missing", &patch).await;
        assert_eq!(result.unwrap_err(), StoreError::NotFound);
    }

    #[tokio::test]
    async fn test_update_merges_into_existing() {
        let store = MemoryProfileStore::new();
        let doc = sample_document();
        store.set("uid-1", &doc).await.unwrap();

        let later = doc.updated_at + chrono::Duration::seconds(3);
        let patch = ProfilePatch::touch(later).display_name("Renamed");
        store.update("uid-1", &patch).await.unwrap();

        let fetched = store.get("uid-1").await.unwrap().unwrap();
        assert_eq!(fetched.display_name, "Renamed");
        assert_eq!(fetched.created_at, doc.created_at);
        assert_eq!(fetched.updated_at, later);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_fail_next_call() {
        let store = MemoryProfileStore::new();
        store.fail_next_call();
        assert!(matches!(
            store.get("uid-1").await,
            Err(StoreError::Network(_))
        ));
        // One-shot
        assert!(store.get("uid-1").await.unwrap().is_none());
    }
}
