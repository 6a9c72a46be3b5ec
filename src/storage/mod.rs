//! Blob storage for entry attachments.
//!
//! The diary only keeps a reference (`external_ref`) and a public URL per
//! attachment; the bytes live behind a [`BlobStorage`] implementation.

pub mod http;
pub mod local;

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::StorageConfig;

pub use http::HttpBlobStorage;
pub use local::LocalBlobStorage;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("upload rejected by storage backend ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("storage request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid storage reference: {0}")]
    InvalidRef(String),
}

/// Where an uploaded blob ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub external_ref: String,
    pub public_url: String,
}

impl StoredBlob {
    /// Last path segment of the reference, used as the attachment's stored name.
    pub fn stored_name(&self) -> &str {
        self.external_ref
            .rsplit('/')
            .next()
            .unwrap_or(&self.external_ref)
    }
}

#[async_trait]
pub trait BlobStorage: Send + Sync {
    async fn upload(
        &self,
        bytes: Vec<u8>,
        original_name: &str,
        mime_type: &str,
    ) -> Result<StoredBlob, StorageError>;

    async fn delete(&self, external_ref: &str) -> Result<(), StorageError>;
}

pub fn from_config(config: &StorageConfig) -> Arc<dyn BlobStorage> {
    match config {
        StorageConfig::Local { root, public_url } => {
            Arc::new(LocalBlobStorage::new(root.clone(), public_url.clone()))
        }
        StorageConfig::Http {
            endpoint,
            bucket,
            api_key,
            public_url,
        } => Arc::new(HttpBlobStorage::new(
            endpoint.clone(),
            bucket.clone(),
            api_key.clone(),
            public_url.clone(),
        )),
    }
}

/// Generates a unique key of the form `uploads/{unix_millis}-{hex}.{ext}`.
pub fn generate_key(original_name: &str) -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    let ext = original_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| "bin".to_string());
    format!("uploads/{millis}-{}.{ext}", &suffix[..16])
}

/// Rejects keys that could escape the upload prefix.
pub(crate) fn validate_key(external_ref: &str) -> Result<(), StorageError> {
    let valid = external_ref.starts_with("uploads/")
        && !external_ref.contains("..")
        && !external_ref.contains('\\');
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidRef(external_ref.to_string()))
    }
}
