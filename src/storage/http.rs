use async_trait::async_trait;
use reqwest::{header, Client};
use std::time::Duration;

use super::{generate_key, validate_key, BlobStorage, StorageError, StoredBlob};

/// Object storage spoken to over HTTP:
/// `POST {endpoint}/object/{bucket}/{key}` to upload,
/// `DELETE {endpoint}/object/{bucket}/{key}` to remove.
#[derive(Clone)]
pub struct HttpBlobStorage {
    client: Client,
    endpoint: String,
    bucket: String,
    api_key: String,
    public_url: Option<String>,
}

impl HttpBlobStorage {
    pub fn new(endpoint: String, bucket: String, api_key: String, public_url: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            bucket,
            api_key,
            public_url: public_url.map(|u| u.trim_end_matches('/').to_string()),
        }
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/object/{}/{}", self.endpoint, self.bucket, key)
    }

    fn public_url_for(&self, key: &str) -> String {
        match &self.public_url {
            Some(base) => format!("{base}/{key}"),
            None => format!("{}/object/public/{}/{}", self.endpoint, self.bucket, key),
        }
    }
}

#[async_trait]
impl BlobStorage for HttpBlobStorage {
    async fn upload(
        &self,
        bytes: Vec<u8>,
        original_name: &str,
        mime_type: &str,
    ) -> Result<StoredBlob, StorageError> {
        let key = generate_key(original_name);
        let size = bytes.len();

        let resp = self
            .client
            .post(self.object_url(&key))
            .bearer_auth(&self.api_key)
            .header(header::CONTENT_TYPE, mime_type)
            .body(bytes)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            tracing::warn!(key = %key, status, "Blob upload rejected");
            return Err(StorageError::Rejected { status, body });
        }

        tracing::debug!(key = %key, size, "Uploaded blob");

        Ok(StoredBlob {
            public_url: self.public_url_for(&key),
            external_ref: key,
        })
    }

    async fn delete(&self, external_ref: &str) -> Result<(), StorageError> {
        validate_key(external_ref)?;

        let resp = self
            .client
            .delete(self.object_url(external_ref))
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        // already gone is fine
        if resp.status().is_success() || resp.status() == reqwest::StatusCode::NOT_FOUND {
            tracing::debug!(key = %external_ref, "Deleted blob");
            return Ok(());
        }

        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        Err(StorageError::Rejected { status, body })
    }
}
