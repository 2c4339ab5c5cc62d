//! REST profile store
//!
//! Bundled [`ProfileStore`] implementation over a Firestore-style REST
//! documents endpoint. Documents are addressed as
//! `projects/{project}/databases/(default)/documents/{collection}/{id}`;
//! a set is an unmasked patch (full replace), an update sends a field mask
//! plus an existence precondition so merging into an absent document fails
//! instead of creating one.

use super::store::{ProfileDocument, ProfilePatch, ProfileStore};
use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::json;
use tokio::sync::RwLock;
use tracing::{debug, warn};

const DEFAULT_BASE_URL: &str = "https://firestore.googleapis.com/v1";
const DEFAULT_COLLECTION: &str = "users";

/// Profile store over the Firestore REST documents API.
pub struct RestProfileStore {
    project_id: String,
    collection: String,
    base_url: String,
    http_client: reqwest::Client,
    /// Bearer token attached to requests when the store is authenticated
    auth_token: RwLock<Option<String>>,
}

impl RestProfileStore {
    /// Create a store for the given project, using the `users` collection.
    pub fn new(project_id: impl Into<String>) -> Result<Self, StoreError> {
        let project_id = project_id.into();

        // Validate project id (error case first)
        if project_id.is_empty() {
            return Err(StoreError::Internal("project ID cannot be empty".to_string()));
        }

        let http_client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| StoreError::Network(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            project_id,
            collection: DEFAULT_COLLECTION.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            http_client,
            auth_token: RwLock::new(None),
        })
    }

    /// Use a different collection name.
    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    /// Point the store at a different REST endpoint, e.g. a local emulator.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Attach the identity backend's session token to subsequent requests.
    pub async fn set_auth_token(&self, token: Option<String>) {
        let mut auth_token = self.auth_token.write().await;
        *auth_token = token;
    }

    fn document_url(&self, id: &str) -> String {
        format!(
            "{}/projects/{}/databases/(default)/documents/{}/{}",
            self.base_url, self.project_id, self.collection, id
        )
    }

    async fn request(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Response, StoreError> {
        let builder = {
            let auth_token = self.auth_token.read().await;
            match auth_token.as_ref() {
                Some(token) => builder.bearer_auth(token),
                None => builder,
            }
        };
        builder
            .send()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))
    }

    async fn error_from_response(response: reqwest::Response) -> StoreError {
        let status = response.status();
        let body: serde_json::Value = match response.json().await {
            Err(_) => json!({}),
            Ok(body) => body,
        };
        let error_status = body["error"]["status"].as_str().unwrap_or("");
        let message = body["error"]["message"].as_str().unwrap_or("").to_string();

        if status == reqwest::StatusCode::NOT_FOUND || error_status == "NOT_FOUND" {
            return StoreError::NotFound;
        }
        warn!(%status, error_status, "store rejected request");
        StoreError::Internal(if message.is_empty() {
            format!("store request failed with status {}", status)
        } else {
            message
        })
    }
}

fn timestamp_value(ts: DateTime<Utc>) -> serde_json::Value {
    json!({ "timestampValue": ts.to_rfc3339_opts(SecondsFormat::Micros, true) })
}

fn encode_document(document: &ProfileDocument) -> serde_json::Value {
    let mut fields = json!({
        "email": { "stringValue": document.email },
        "displayName": { "stringValue": document.display_name },
        "createdAt": timestamp_value(document.created_at),
        "updatedAt": timestamp_value(document.updated_at),
        "isEmailVerified": { "booleanValue": document.is_email_verified },
    });
    if let Some(ref url) = document.profile_image_url {
        fields["profileImageUrl"] = json!({ "stringValue": url });
    }
    json!({ "fields": fields })
}

fn decode_string(fields: &serde_json::Value, name: &str) -> Result<String, StoreError> {
    fields[name]["stringValue"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| StoreError::Serialization(format!("missing field '{}'", name)))
}

fn decode_timestamp(fields: &serde_json::Value, name: &str) -> Result<DateTime<Utc>, StoreError> {
    let raw = fields[name]["timestampValue"]
        .as_str()
        .ok_or_else(|| StoreError::Serialization(format!("missing field '{}'", name)))?;
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| StoreError::Serialization(format!("bad timestamp in '{}': {}", name, e)))
}

fn decode_document(body: &serde_json::Value) -> Result<ProfileDocument, StoreError> {
    let fields = &body["fields"];
    Ok(ProfileDocument {
        email: decode_string(fields, "email")?,
        display_name: decode_string(fields, "displayName")?,
        created_at: decode_timestamp(fields, "createdAt")?,
        updated_at: decode_timestamp(fields, "updatedAt")?,
        profile_image_url: fields["profileImageUrl"]["stringValue"]
            .as_str()
            .map(str::to_string),
        is_email_verified: fields["isEmailVerified"]["booleanValue"]
            .as_bool()
            .unwrap_or(false),
    })
}

fn encode_patch(patch: &ProfilePatch) -> (serde_json::Value, Vec<&'static str>) {
    let mut fields = json!({ "updatedAt": timestamp_value(patch.updated_at) });
    let mut mask = vec!["updatedAt"];
    if let Some(ref email) = patch.email {
        fields["email"] = json!({ "stringValue": email });
        mask.push("email");
    }
    if let Some(ref display_name) = patch.display_name {
        fields["displayName"] = json!({ "stringValue": display_name });
        mask.push("displayName");
    }
    if let Some(ref url) = patch.profile_image_url {
        fields["profileImageUrl"] = json!({ "stringValue": url });
        mask.push("profileImageUrl");
    }
    if let Some(verified) = patch.is_email_verified {
        fields["isEmailVerified"] = json!({ "booleanValue": verified });
        mask.push("isEmailVerified");
    }
    (json!({ "fields": fields }), mask)
}

#[async_trait]
impl ProfileStore for RestProfileStore {
    async fn get(&self, id: &str) -> Result<Option<ProfileDocument>, StoreError> {
        debug!(id, "fetching profile document");
        let response = self
            .request(self.http_client.get(self.document_url(id)))
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        decode_document(&body).map(Some)
    }

    async fn set(&self, id: &str, document: &ProfileDocument) -> Result<(), StoreError> {
        debug!(id, "writing profile document");
        let response = self
            .request(
                self.http_client
                    .patch(self.document_url(id))
                    .json(&encode_document(document)),
            )
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }
        Ok(())
    }

    async fn update(&self, id: &str, patch: &ProfilePatch) -> Result<(), StoreError> {
        debug!(id, "patching profile document");
        let (body, mask) = encode_patch(patch);
        let mut url = format!("{}?currentDocument.exists=true", self.document_url(id));
        for path in mask {
            url.push_str("&updateMask.fieldPaths=");
            url.push_str(path);
        }

        let response = self
            .request(self.http_client.patch(url).json(&body))
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }
        Ok(())
    }
}

impl std::fmt::Debug for RestProfileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestProfileStore")
            .field("project_id", &self.project_id)
            .field("collection", &self.collection)
            .finish()
    }
}
