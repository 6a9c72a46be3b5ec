use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    auth::extractor::AuthenticatedUser,
    cache,
    diary::{
        attachments::{attach_files, blob_refs, delete_blobs},
        models::{
            Attachment, AttachmentResponse, EntryResponse, FavoriteResponse, ReindexResponse,
            RenameAttachmentRequest, SharedEntryResponse, UploadFailure, WriteOutcome,
        },
        multipart::EntryForm,
        store,
    },
    error::{AppError, AppResult},
    AppState,
};

fn outcome(
    verb: &str,
    entry: EntryResponse,
    attempted: usize,
    uploaded: Vec<Attachment>,
    upload_errors: Vec<UploadFailure>,
) -> WriteOutcome {
    let message = if upload_errors.is_empty() {
        format!("Diary entry {verb} successfully")
    } else if upload_errors.len() == attempted {
        format!("Entry {verb} but file uploads failed")
    } else {
        format!("Entry {verb} but some file uploads failed")
    };
    WriteOutcome {
        message,
        entry,
        uploaded_files: uploaded.len(),
        upload_errors,
    }
}

fn status_for(outcome: &WriteOutcome, full_success: StatusCode) -> StatusCode {
    if outcome.is_partial() {
        StatusCode::MULTI_STATUS
    } else {
        full_success
    }
}

pub async fn create_entry(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(claims): AuthenticatedUser,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<WriteOutcome>)> {
    let owner_id = claims.owner_id()?;

    let form = EntryForm::read(multipart, state.config.max_upload_bytes).await?;
    let draft = form.draft()?;
    let custom_names = form.custom_filenames()?;

    let entry = store::create_entry(&state.db, owner_id, &draft).await?;
    let entry_id = entry.id;

    let attempted = form.files.len();
    let (uploaded, upload_errors) =
        attach_files(&state.db, state.storage.as_ref(), entry_id, form.files, &custom_names).await;

    let response = store::with_attachments(&state.db, entry).await?;
    let outcome = outcome("created", response, attempted, uploaded, upload_errors);

    tracing::info!(
        user_id       = %owner_id,
        entry_id      = %entry_id,
        uploaded      = outcome.uploaded_files,
        upload_errors = outcome.upload_errors.len(),
        "Diary entry created"
    );

    Ok((status_for(&outcome, StatusCode::CREATED), Json(outcome)))
}

pub async fn update_entry(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<WriteOutcome>)> {
    let owner_id = claims.owner_id()?;

    let form = EntryForm::read(multipart, state.config.max_upload_bytes).await?;
    let draft = form.draft()?;
    let custom_names = form.custom_filenames()?;
    let deleted = form.deleted_attachments()?;
    let renamed = form.renamed_attachments()?;

    let updated = store::update_entry(&state.db, owner_id, id, &draft, &deleted, &renamed).await?;

    delete_blobs(state.storage.as_ref(), &blob_refs(&updated.removed)).await;

    let attempted = form.files.len();
    let (uploaded, upload_errors) =
        attach_files(&state.db, state.storage.as_ref(), id, form.files, &custom_names).await;

    // only once the new attachments are recorded
    cache::forget_shared(&state, updated.previous_token.as_deref()).await;

    let response = store::with_attachments(&state.db, updated.entry).await?;
    let outcome = outcome("updated", response, attempted, uploaded, upload_errors);

    tracing::info!(
        user_id       = %owner_id,
        entry_id      = %id,
        removed       = updated.removed.len(),
        uploaded      = outcome.uploaded_files,
        upload_errors = outcome.upload_errors.len(),
        "Diary entry updated"
    );

    Ok((status_for(&outcome, StatusCode::OK), Json(outcome)))
}

pub async fn get_entry(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<EntryResponse>> {
    let owner_id = claims.owner_id()?;
    let entry = store::fetch_owned(&state.db, owner_id, id).await?;
    Ok(Json(store::with_attachments(&state.db, entry).await?))
}

/// Blob cleanup never blocks the row delete.
pub async fn delete_entry(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let owner_id = claims.owner_id()?;

    let (entry, attachments) = store::delete_entry(&state.db, owner_id, id).await?;

    delete_blobs(state.storage.as_ref(), &blob_refs(&attachments)).await;
    cache::forget_shared(&state, entry.share_token.as_deref()).await;

    tracing::info!(
        user_id     = %owner_id,
        entry_id    = %id,
        attachments = attachments.len(),
        "Diary entry deleted"
    );

    Ok(StatusCode::NO_CONTENT)
}

pub async fn toggle_favorite(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<FavoriteResponse>> {
    let owner_id = claims.owner_id()?;
    let toggled = store::toggle_favorite(&state.db, owner_id, id).await?;

    tracing::debug!(
        user_id     = %owner_id,
        entry_id    = %id,
        is_favorite = toggled.is_favorite,
        "Favorite toggled"
    );

    Ok(Json(toggled))
}

pub async fn rename_attachment(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path((entry_id, attachment_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<RenameAttachmentRequest>,
) -> AppResult<Json<AttachmentResponse>> {
    let owner_id = claims.owner_id()?;
    let name = payload.display_name.trim();
    if name.is_empty() {
        return Err(AppError::validation("display_name cannot be empty"));
    }

    let renamed =
        store::rename_attachment(&state.db, owner_id, entry_id, attachment_id, name).await?;
    cache::forget_shared(&state, renamed.share_token.as_deref()).await;

    Ok(Json(renamed.attachment.into()))
}

pub async fn delete_attachment(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path((entry_id, attachment_id)): Path<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    let owner_id = claims.owner_id()?;

    let removed = store::delete_attachment(&state.db, owner_id, entry_id, attachment_id).await?;
    cache::forget_shared(&state, removed.share_token.as_deref()).await;
    delete_blobs(state.storage.as_ref(), &[removed.attachment.external_ref]).await;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn reindex(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<ReindexResponse>> {
    let owner_id = claims.owner_id()?;
    let reindexed = store::reindex_owner(&state.db, owner_id).await?;
    Ok(Json(ReindexResponse { reindexed }))
}

/// Public read through a share token; no owner scoping, reduced projection.
pub async fn get_shared_entry(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> AppResult<Json<SharedEntryResponse>> {
    if let Some(cached) = cache::lookup_shared::<SharedEntryResponse>(&state, &token).await {
        return Ok(Json(cached));
    }

    let (entry, attachments) = store::shared_entry(&state.db, &token).await?;
    let shared = SharedEntryResponse::new(entry, attachments);

    cache::store_shared(&state, &token, &shared).await;

    Ok(Json(shared))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diary::models::{DiaryEntry, Visibility};
    use crate::search::index::SearchIndex;
    use chrono::{NaiveDate, Utc};
    use sqlx::types::Json as SqlJson;

    fn response() -> EntryResponse {
        let entry = DiaryEntry {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            title: "t".into(),
            body_html: None,
            body_text: String::new(),
            mood: None,
            weather: None,
            tags: None,
            visibility: Visibility::Private.as_str().into(),
            share_token: None,
            is_favorite: false,
            category_id: None,
            search_index: SqlJson(SearchIndex::default()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        EntryResponse::new(entry, Vec::new())
    }

    fn failure(name: &str) -> UploadFailure {
        UploadFailure {
            filename: name.into(),
            error: "boom".into(),
        }
    }

    #[test]
    fn test_full_success_keeps_status() {
        let out = outcome("created", response(), 0, Vec::new(), Vec::new());
        assert_eq!(out.message, "Diary entry created successfully");
        assert_eq!(status_for(&out, StatusCode::CREATED), StatusCode::CREATED);
    }

    #[test]
    fn test_partial_failure_is_multi_status() {
        let out = outcome("created", response(), 3, Vec::new(), vec![failure("b.pdf")]);
        assert_eq!(out.message, "Entry created but some file uploads failed");
        assert_eq!(status_for(&out, StatusCode::CREATED), StatusCode::MULTI_STATUS);
    }

    #[test]
    fn test_all_uploads_failed_message() {
        let out = outcome("updated", response(), 1, Vec::new(), vec![failure("a.png")]);
        assert_eq!(out.message, "Entry updated but file uploads failed");
    }
}
