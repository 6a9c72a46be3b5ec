//! Entry and attachment persistence. Every query is scoped by owner except
//! the share-token lookup.

use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::categories::ensure_owned;
use crate::diary::models::{
    resolve_share_token, Attachment, DiaryEntry, EntryDraft, EntryResponse, FavoriteResponse,
    NewAttachment, RenamedAttachment, Visibility,
};
use crate::error::{AppError, AppResult};
use crate::search::index_for_write;

pub async fn fetch_owned(db: &PgPool, owner_id: Uuid, id: Uuid) -> AppResult<DiaryEntry> {
    sqlx::query_as::<_, DiaryEntry>("SELECT * FROM diary_entries WHERE id = $1 AND owner_id = $2")
        .bind(id)
        .bind(owner_id)
        .fetch_optional(db)
        .await
        .map_err(|e| {
            tracing::error!(
                query    = "SELECT * FROM diary_entries WHERE id = ? AND owner_id = ?",
                error    = %e,
                entry_id = %id,
                "DB error fetching diary entry"
            );
            AppError::from(e)
        })?
        .ok_or_else(|| AppError::not_found("Diary entry"))
}

pub async fn attachments_for(db: &PgPool, entry_ids: &[Uuid]) -> AppResult<Vec<Attachment>> {
    if entry_ids.is_empty() {
        return Ok(Vec::new());
    }
    let attachments = sqlx::query_as::<_, Attachment>(
        "SELECT * FROM attachments WHERE entry_id = ANY($1) ORDER BY created_at, id",
    )
    .bind(entry_ids)
    .fetch_all(db)
    .await?;
    Ok(attachments)
}

pub async fn with_attachments(db: &PgPool, entry: DiaryEntry) -> AppResult<EntryResponse> {
    let attachments = attachments_for(db, &[entry.id]).await?;
    Ok(EntryResponse::new(entry, attachments))
}

async fn check_category(
    tx: &mut Transaction<'_, Postgres>,
    owner_id: Uuid,
    category_id: Option<Uuid>,
) -> AppResult<()> {
    match category_id {
        Some(id) => ensure_owned(&mut **tx, owner_id, id).await,
        None => Ok(()),
    }
}

/// Inserts a new entry; content and search index land in one statement.
pub async fn create_entry(db: &PgPool, owner_id: Uuid, draft: &EntryDraft) -> AppResult<DiaryEntry> {
    let mut tx = db.begin().await?;
    check_category(&mut tx, owner_id, draft.category_id).await?;

    let visibility = draft.visibility.unwrap_or(Visibility::Private);
    let share_token = resolve_share_token(visibility, None);
    let index = index_for_write(
        &draft.title,
        &draft.body_text,
        draft.tags.as_deref().unwrap_or(""),
    );

    let entry = sqlx::query_as::<_, DiaryEntry>(
        r#"
        INSERT INTO diary_entries
            (id, owner_id, date, title, body_html, body_text, mood, weather, tags,
             visibility, share_token, is_favorite, category_id, search_index)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13,
                COALESCE($14, '{"tokens": {}}'::jsonb))
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(owner_id)
    .bind(draft.date)
    .bind(&draft.title)
    .bind(&draft.body_html)
    .bind(&draft.body_text)
    .bind(&draft.mood)
    .bind(&draft.weather)
    .bind(&draft.tags)
    .bind(visibility.as_str())
    .bind(&share_token)
    .bind(draft.is_favorite.unwrap_or(false))
    .bind(draft.category_id)
    .bind(index)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        tracing::error!(
            query   = "INSERT INTO diary_entries ... RETURNING *",
            error   = %e,
            user_id = %owner_id,
            "DB error creating diary entry"
        );
        AppError::from(e)
    })?;

    tx.commit().await?;
    Ok(entry)
}

/// What an update changed beyond the row itself.
#[derive(Debug)]
pub struct UpdatedEntry {
    pub entry: DiaryEntry,
    pub previous_token: Option<String>,
    pub removed: Vec<Attachment>,
}

/// Full replace of content fields, plus attachment deletions and renames,
/// in one transaction.
pub async fn update_entry(
    db: &PgPool,
    owner_id: Uuid,
    id: Uuid,
    draft: &EntryDraft,
    deleted: &[Uuid],
    renamed: &[RenamedAttachment],
) -> AppResult<UpdatedEntry> {
    let mut tx = db.begin().await?;

    let (current_visibility, previous_token): (String, Option<String>) = sqlx::query_as(
        "SELECT visibility, share_token FROM diary_entries WHERE id = $1 AND owner_id = $2 FOR UPDATE",
    )
    .bind(id)
    .bind(owner_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::not_found("Diary entry"))?;

    check_category(&mut tx, owner_id, draft.category_id).await?;

    let visibility = draft
        .visibility
        .or_else(|| Visibility::parse(&current_visibility))
        .unwrap_or(Visibility::Private);
    let share_token = resolve_share_token(visibility, previous_token.clone());
    let index = index_for_write(
        &draft.title,
        &draft.body_text,
        draft.tags.as_deref().unwrap_or(""),
    );

    let entry = sqlx::query_as::<_, DiaryEntry>(
        r#"
        UPDATE diary_entries
        SET date = $1,
            title = $2,
            body_html = $3,
            body_text = $4,
            mood = $5,
            weather = $6,
            tags = $7,
            visibility = $8,
            share_token = $9,
            is_favorite = COALESCE($10, is_favorite),
            category_id = $11,
            search_index = COALESCE($12, search_index),
            updated_at = NOW()
        WHERE id = $13 AND owner_id = $14
        RETURNING *
        "#,
    )
    .bind(draft.date)
    .bind(&draft.title)
    .bind(&draft.body_html)
    .bind(&draft.body_text)
    .bind(&draft.mood)
    .bind(&draft.weather)
    .bind(&draft.tags)
    .bind(visibility.as_str())
    .bind(&share_token)
    .bind(draft.is_favorite)
    .bind(draft.category_id)
    .bind(index)
    .bind(id)
    .bind(owner_id)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        tracing::error!(
            query    = "UPDATE diary_entries SET ... WHERE id = ? AND owner_id = ?",
            error    = %e,
            entry_id = %id,
            "DB error updating diary entry"
        );
        AppError::from(e)
    })?;

    let removed = if deleted.is_empty() {
        Vec::new()
    } else {
        sqlx::query_as::<_, Attachment>(
            "DELETE FROM attachments WHERE id = ANY($1) AND entry_id = $2 RETURNING *",
        )
        .bind(deleted)
        .bind(id)
        .fetch_all(&mut *tx)
        .await?
    };

    for rename in renamed {
        sqlx::query("UPDATE attachments SET display_name = $1 WHERE id = $2 AND entry_id = $3")
            .bind(rename.display_name.trim())
            .bind(rename.id)
            .bind(id)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;

    Ok(UpdatedEntry {
        entry,
        previous_token,
        removed,
    })
}

/// Removes the entry; attachment rows go with it. Returns both so the caller
/// can clean up blobs and caches.
pub async fn delete_entry(
    db: &PgPool,
    owner_id: Uuid,
    id: Uuid,
) -> AppResult<(DiaryEntry, Vec<Attachment>)> {
    let mut tx = db.begin().await?;

    let attachments =
        sqlx::query_as::<_, Attachment>("SELECT * FROM attachments WHERE entry_id = $1")
            .bind(id)
            .fetch_all(&mut *tx)
            .await?;

    let entry = sqlx::query_as::<_, DiaryEntry>(
        "DELETE FROM diary_entries WHERE id = $1 AND owner_id = $2 RETURNING *",
    )
    .bind(id)
    .bind(owner_id)
    .fetch_optional(&mut *tx)
    .await
    .map_err(|e| {
        tracing::error!(
            query    = "DELETE FROM diary_entries WHERE id = ? AND owner_id = ?",
            error    = %e,
            entry_id = %id,
            "DB error deleting diary entry"
        );
        AppError::from(e)
    })?
    .ok_or_else(|| AppError::not_found("Diary entry"))?;

    tx.commit().await?;
    Ok((entry, attachments))
}

/// Flips `is_favorite` and nothing else.
pub async fn toggle_favorite(db: &PgPool, owner_id: Uuid, id: Uuid) -> AppResult<FavoriteResponse> {
    let (id, is_favorite): (Uuid, bool) = sqlx::query_as(
        "UPDATE diary_entries SET is_favorite = NOT is_favorite WHERE id = $1 AND owner_id = $2 RETURNING id, is_favorite",
    )
    .bind(id)
    .bind(owner_id)
    .fetch_optional(db)
    .await?
    .ok_or_else(|| AppError::not_found("Diary entry"))?;

    Ok(FavoriteResponse { id, is_favorite })
}

pub async fn insert_attachment(
    db: &PgPool,
    entry_id: Uuid,
    new: &NewAttachment,
) -> AppResult<Attachment> {
    let attachment = sqlx::query_as::<_, Attachment>(
        r#"
        INSERT INTO attachments
            (id, entry_id, kind, stored_name, display_name, external_ref, public_url, mime_type, size_bytes)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(entry_id)
    .bind(new.kind.as_str())
    .bind(&new.stored_name)
    .bind(&new.display_name)
    .bind(&new.external_ref)
    .bind(&new.public_url)
    .bind(&new.mime_type)
    .bind(new.size_bytes)
    .fetch_one(db)
    .await?;
    Ok(attachment)
}

/// An attachment after a rename or delete, with its entry's share token so the
/// public projection can be invalidated.
#[derive(Debug, FromRow)]
pub struct AttachmentChange {
    #[sqlx(flatten)]
    pub attachment: Attachment,
    pub share_token: Option<String>,
}

pub async fn rename_attachment(
    db: &PgPool,
    owner_id: Uuid,
    entry_id: Uuid,
    attachment_id: Uuid,
    display_name: &str,
) -> AppResult<AttachmentChange> {
    sqlx::query_as::<_, AttachmentChange>(
        r#"
        UPDATE attachments a
        SET display_name = $1
        FROM diary_entries e
        WHERE a.id = $2 AND a.entry_id = $3 AND e.id = a.entry_id AND e.owner_id = $4
        RETURNING a.*, e.share_token
        "#,
    )
    .bind(display_name)
    .bind(attachment_id)
    .bind(entry_id)
    .bind(owner_id)
    .fetch_optional(db)
    .await?
    .ok_or_else(|| AppError::not_found("Attachment"))
}

pub async fn delete_attachment(
    db: &PgPool,
    owner_id: Uuid,
    entry_id: Uuid,
    attachment_id: Uuid,
) -> AppResult<AttachmentChange> {
    sqlx::query_as::<_, AttachmentChange>(
        r#"
        DELETE FROM attachments a
        USING diary_entries e
        WHERE a.id = $1 AND a.entry_id = $2 AND e.id = a.entry_id AND e.owner_id = $3
        RETURNING a.*, e.share_token
        "#,
    )
    .bind(attachment_id)
    .bind(entry_id)
    .bind(owner_id)
    .fetch_optional(db)
    .await?
    .ok_or_else(|| AppError::not_found("Attachment"))
}

/// The only lookup not scoped by owner.
pub async fn shared_entry(db: &PgPool, token: &str) -> AppResult<(DiaryEntry, Vec<Attachment>)> {
    let entry = sqlx::query_as::<_, DiaryEntry>(
        "SELECT * FROM diary_entries WHERE share_token = $1 AND visibility <> 'private'",
    )
    .bind(token)
    .fetch_optional(db)
    .await?
    .ok_or_else(|| AppError::not_found("Shared entry"))?;

    let attachments = attachments_for(db, &[entry.id]).await?;
    Ok((entry, attachments))
}

/// Recomputes every index of one owner from stored content.
pub async fn reindex_owner(db: &PgPool, owner_id: Uuid) -> AppResult<u64> {
    let rows: Vec<(Uuid, String, String, Option<String>)> = sqlx::query_as(
        "SELECT id, title, body_text, tags FROM diary_entries WHERE owner_id = $1",
    )
    .bind(owner_id)
    .fetch_all(db)
    .await?;

    let mut tx = db.begin().await?;
    let mut reindexed = 0;
    for (id, title, body_text, tags) in &rows {
        let Some(index) = index_for_write(title, body_text, tags.as_deref().unwrap_or("")) else {
            continue;
        };
        let result = sqlx::query(
            "UPDATE diary_entries SET search_index = $1 WHERE id = $2 AND owner_id = $3",
        )
        .bind(index)
        .bind(id)
        .bind(owner_id)
        .execute(&mut *tx)
        .await?;
        reindexed += result.rows_affected();
    }
    tx.commit().await?;

    tracing::info!(
        user_id   = %owner_id,
        entries   = rows.len(),
        reindexed = reindexed,
        "Search index rebuilt"
    );

    Ok(reindexed)
}
