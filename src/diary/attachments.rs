//! Moving attachment bytes in and out of blob storage.

use futures::future::join_all;
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

use crate::diary::models::{Attachment, AttachmentKind, NewAttachment, UploadFailure};
use crate::diary::multipart::UploadFile;
use crate::diary::store::insert_attachment;
use crate::storage::BlobStorage;

/// Uploads every file concurrently. One result per file, in input order.
pub async fn upload_files(
    storage: &dyn BlobStorage,
    files: Vec<UploadFile>,
    custom_names: &HashMap<String, String>,
) -> Vec<Result<NewAttachment, UploadFailure>> {
    let uploads = files.into_iter().map(|file| async move {
        let size_bytes = file.bytes.len() as i64;
        let display_name = custom_names
            .get(&file.file_name)
            .map(|n| n.trim())
            .filter(|n| !n.is_empty())
            .unwrap_or(&file.file_name)
            .to_string();

        match storage
            .upload(file.bytes, &file.file_name, &file.mime_type)
            .await
        {
            Ok(blob) => Ok(NewAttachment {
                kind: AttachmentKind::for_mime(&file.mime_type),
                stored_name: blob.stored_name().to_string(),
                display_name,
                external_ref: blob.external_ref,
                public_url: blob.public_url,
                mime_type: file.mime_type,
                size_bytes,
            }),
            Err(e) => {
                tracing::warn!(filename = %file.file_name, error = %e, "Attachment upload failed");
                Err(UploadFailure {
                    filename: file.file_name,
                    error: e.to_string(),
                })
            }
        }
    });
    join_all(uploads).await
}

/// Uploads and records attachments for `entry_id`. Failures are collected,
/// never propagated; successful ones stay recorded.
pub async fn attach_files(
    db: &PgPool,
    storage: &dyn BlobStorage,
    entry_id: Uuid,
    files: Vec<UploadFile>,
    custom_names: &HashMap<String, String>,
) -> (Vec<Attachment>, Vec<UploadFailure>) {
    let mut stored = Vec::new();
    let mut failures = Vec::new();

    for result in upload_files(storage, files, custom_names).await {
        let new = match result {
            Ok(new) => new,
            Err(failure) => {
                failures.push(failure);
                continue;
            }
        };
        match insert_attachment(db, entry_id, &new).await {
            Ok(attachment) => stored.push(attachment),
            Err(e) => {
                tracing::error!(
                    entry_id = %entry_id,
                    filename = %new.display_name,
                    error    = %e,
                    "Failed to record uploaded attachment"
                );
                delete_blobs(storage, std::slice::from_ref(&new.external_ref)).await;
                failures.push(UploadFailure {
                    filename: new.display_name,
                    error: "Failed to record attachment".to_string(),
                });
            }
        }
    }

    (stored, failures)
}

/// Best-effort: failures are logged and otherwise ignored.
pub async fn delete_blobs(storage: &dyn BlobStorage, refs: &[String]) {
    let deletes = refs.iter().map(|r| async move {
        if let Err(e) = storage.delete(r).await {
            tracing::warn!(external_ref = %r, error = %e, "Blob delete failed, leaving orphan");
        }
    });
    join_all(deletes).await;
}

pub fn blob_refs(attachments: &[Attachment]) -> Vec<String> {
    attachments.iter().map(|a| a.external_ref.clone()).collect()
}
