use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::{generate_key, validate_key, BlobStorage, StorageError, StoredBlob};

/// Stores blobs under a local directory, for development setups.
#[derive(Clone)]
pub struct LocalBlobStorage {
    root: PathBuf,
    public_url: String,
}

impl LocalBlobStorage {
    pub fn new(root: PathBuf, public_url: String) -> Self {
        Self {
            root,
            public_url: public_url.trim_end_matches('/').to_string(),
        }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

#[async_trait]
impl BlobStorage for LocalBlobStorage {
    async fn upload(
        &self,
        bytes: Vec<u8>,
        original_name: &str,
        _mime_type: &str,
    ) -> Result<StoredBlob, StorageError> {
        let key = generate_key(original_name);
        let path = self.path_for(&key);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // write to a temp file, then rename into place
        let temp_path = path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(&bytes).await?;
        file.sync_all().await?;
        fs::rename(&temp_path, &path).await?;

        tracing::debug!(key = %key, size = bytes.len(), "Wrote blob to disk");

        Ok(StoredBlob {
            public_url: format!("{}/{}", self.public_url, key),
            external_ref: key,
        })
    }

    async fn delete(&self, external_ref: &str) -> Result<(), StorageError> {
        validate_key(external_ref)?;
        let path = self.path_for(external_ref);

        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
