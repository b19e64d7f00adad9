//! Object storage for media uploads.

use std::time::Duration;

use async_trait::async_trait;
use axum::body::Bytes;
use reqwest::Client;
use thiserror::Error;
use uuid::Uuid;

use crate::config::StorageSettings;

pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;
pub const ALLOWED_MIME_TYPES: [&str; 5] = ["image/jpeg", "image/png", "image/webp", "image/gif", "image/avif"];

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage is not configured")]
    NotConfigured,
    #[error("storage request failed: {0}")]
    Network(String),
    #[error("storage returned {status}: {message}")]
    Api { status: u16, message: String },
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Api { status: 404, .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub path: String,
    pub public_url: String,
}

#[async_trait]
pub trait MediaStorage: Send + Sync {
    async fn upload(&self, path: &str, content_type: &str, body: Bytes) -> Result<StoredObject, StorageError>;

    async fn delete(&self, path: &str) -> Result<(), StorageError>;
}

/// Storage REST API of the hosted backend.
pub struct RestStorage {
    http: Client,
    api_base: Option<String>,
    api_key: Option<String>,
    bucket: String,
}

impl RestStorage {
    pub fn new(settings: &StorageSettings) -> Self {
        Self { http: Client::new(), api_base: settings.api_base.clone(), api_key: settings.api_key.clone(), bucket: settings.bucket.clone() }
    }

    fn endpoint(&self) -> Result<(&str, &str), StorageError> {
        match (&self.api_base, &self.api_key) {
            (Some(base), Some(key)) => Ok((base.as_str(), key.as_str())),
            _ => Err(StorageError::NotConfigured),
        }
    }
}

async fn check(response: reqwest::Response) -> Result<(), StorageError> {
    let status = response.status();
    if status.is_success() { return Ok(()); }
    let message = response.text().await.unwrap_or_default();
    Err(StorageError::Api { status: status.as_u16(), message })
}

#[async_trait]
impl MediaStorage for RestStorage {
    async fn upload(&self, path: &str, content_type: &str, body: Bytes) -> Result<StoredObject, StorageError> {
        let (base, key) = self.endpoint()?;
        let response = self
            .http
            .post(format!("{base}/object/{}/{path}", self.bucket))
            .bearer_auth(key)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .header("x-upsert", "false")
            .body(body)
            .timeout(Duration::from_secs(60))
            .send()
            .await
            .map_err(|e| StorageError::Network(e.to_string()))?;
        check(response).await?;
        Ok(StoredObject { path: path.to_string(), public_url: format!("{base}/object/public/{}/{path}", self.bucket) })
    }

    async fn delete(&self, path: &str) -> Result<(), StorageError> {
        let (base, key) = self.endpoint()?;
        let response = self
            .http
            .delete(format!("{base}/object/{}/{path}", self.bucket))
            .bearer_auth(key)
            .timeout(Duration::from_secs(30))
            .send()
            .await
            .map_err(|e| StorageError::Network(e.to_string()))?;
        match check(response).await {
            // Already gone is as good as deleted.
            Err(e) if e.is_not_found() => {
                tracing::warn!(%path, "object already missing from storage");
                Ok(())
            }
            result => result,
        }
    }
}

/// Normalised MIME type when it is one the shop accepts.
pub fn accepted_mime(content_type: &str) -> Option<&'static str> {
    let essence = content_type.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
    ALLOWED_MIME_TYPES.into_iter().find(|allowed| *allowed == essence)
}

/// `products/<uuid>-<name>` with the name reduced to `[a-z0-9._-]`.
pub fn object_path(id: Uuid, file_name: &str) -> String {
    let base = file_name.rsplit(&['/', '\\'][..]).next().unwrap_or_default();
    let mut cleaned: String = base
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' { c } else { '-' })
        .collect();
    while cleaned.contains("--") { cleaned = cleaned.replace("--", "-"); }
    let cleaned = cleaned.replace("-.", ".");
    let cleaned = cleaned.trim_matches(|c| c == '-' || c == '.');
    let name = if cleaned.is_empty() { "file" } else { cleaned };
    format!("products/{id}-{name}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepted_mime() {
        assert_eq!(accepted_mime("image/PNG"), Some("image/png"));
        assert_eq!(accepted_mime("image/jpeg; charset=binary"), Some("image/jpeg"));
        assert_eq!(accepted_mime("application/pdf"), None);
        assert_eq!(accepted_mime("image/svg+xml"), None);
    }

    #[test]
    fn test_object_path_sanitizes() {
        let id = Uuid::nil();
        assert_eq!(object_path(id, "Bague Été (1).JPG"), format!("products/{id}-bague-t-1.jpg"));
        assert_eq!(object_path(id, "../../etc/passwd"), format!("products/{id}-passwd"));
        assert_eq!(object_path(id, "..."), format!("products/{id}-file"));
    }

    #[tokio::test]
    async fn test_unconfigured_storage() {
        let storage = RestStorage::new(&StorageSettings { api_base: None, api_key: None, bucket: "media".into() });
        assert!(matches!(storage.delete("products/x").await, Err(StorageError::NotConfigured)));
    }

    /// Serves every request with `status` on a local port and returns the base URL.
    async fn storage_answering(status: axum::http::StatusCode) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = axum::Router::new().fallback(move || async move { (status, r#"{"message":"Object not found"}"#) });
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn test_delete_of_missing_object_succeeds() {
        let base = storage_answering(axum::http::StatusCode::NOT_FOUND).await;
        let storage = RestStorage::new(&StorageSettings { api_base: Some(base), api_key: Some("key".into()), bucket: "media".into() });
        assert!(storage.delete("products/gone.jpg").await.is_ok());
    }

    #[tokio::test]
    async fn test_delete_reports_other_failures() {
        let base = storage_answering(axum::http::StatusCode::INTERNAL_SERVER_ERROR).await;
        let storage = RestStorage::new(&StorageSettings { api_base: Some(base), api_key: Some("key".into()), bucket: "media".into() });
        assert!(matches!(storage.delete("products/x.jpg").await, Err(StorageError::Api { status: 500, .. })));
    }
}
