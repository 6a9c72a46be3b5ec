use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

use crate::search::index::SearchIndex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Private,
    Unlisted,
    Public,
}

impl Visibility {
    pub fn as_str(self) -> &'static str {
        match self {
            Visibility::Private => "private",
            Visibility::Unlisted => "unlisted",
            Visibility::Public => "public",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "private" => Some(Visibility::Private),
            "unlisted" => Some(Visibility::Unlisted),
            "public" => Some(Visibility::Public),
            _ => None,
        }
    }

    pub fn is_shared(self) -> bool {
        self != Visibility::Private
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Share token for the visibility an entry is moving to.
///
/// Going private clears it; going shared keeps an existing token or mints one.
pub fn resolve_share_token(visibility: Visibility, existing: Option<String>) -> Option<String> {
    if visibility.is_shared() {
        Some(existing.unwrap_or_else(new_share_token))
    } else {
        None
    }
}

pub fn new_share_token() -> String {
    Uuid::new_v4().simple().to_string()
}

#[derive(Debug, Clone, FromRow)]
pub struct DiaryEntry {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub date: NaiveDate,
    pub title: String,
    pub body_html: Option<String>,
    pub body_text: String,
    pub mood: Option<String>,
    pub weather: Option<String>,
    pub tags: Option<String>,
    pub visibility: String,
    pub share_token: Option<String>,
    pub is_favorite: bool,
    pub category_id: Option<Uuid>,
    pub search_index: Json<SearchIndex>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DiaryEntry {
    pub fn visibility(&self) -> Visibility {
        Visibility::parse(&self.visibility).unwrap_or(Visibility::Private)
    }

    pub fn tags_str(&self) -> &str {
        self.tags.as_deref().unwrap_or("")
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct Attachment {
    pub id: Uuid,
    pub entry_id: Uuid,
    pub kind: String,
    pub stored_name: String,
    pub display_name: String,
    pub external_ref: String,
    pub public_url: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    Photo,
    Document,
}

impl AttachmentKind {
    pub fn for_mime(mime_type: &str) -> Self {
        if mime_type.starts_with("image/") {
            AttachmentKind::Photo
        } else {
            AttachmentKind::Document
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AttachmentKind::Photo => "photo",
            AttachmentKind::Document => "document",
        }
    }
}

/// Attachment row about to be inserted after a successful upload.
#[derive(Debug, Clone)]
pub struct NewAttachment {
    pub kind: AttachmentKind,
    pub stored_name: String,
    pub display_name: String,
    pub external_ref: String,
    pub public_url: String,
    pub mime_type: String,
    pub size_bytes: i64,
}

/// Validated entry content, ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryDraft {
    pub date: NaiveDate,
    pub title: String,
    pub body_html: Option<String>,
    pub body_text: String,
    pub mood: Option<String>,
    pub weather: Option<String>,
    pub tags: Option<String>,
    /// `None` keeps the current visibility on update, private on create.
    pub visibility: Option<Visibility>,
    pub category_id: Option<Uuid>,
    pub is_favorite: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AttachmentResponse {
    pub id: Uuid,
    pub kind: String,
    pub stored_name: String,
    pub display_name: String,
    pub url: String,
    pub mime_type: String,
    pub size_bytes: i64,
}

impl From<Attachment> for AttachmentResponse {
    fn from(att: Attachment) -> Self {
        AttachmentResponse {
            id: att.id,
            kind: att.kind,
            stored_name: att.stored_name,
            display_name: att.display_name,
            url: att.public_url,
            mime_type: att.mime_type,
            size_bytes: att.size_bytes,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct EntryResponse {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub date: NaiveDate,
    pub title: String,
    pub body_html: Option<String>,
    pub body_text: String,
    pub mood: Option<String>,
    pub weather: Option<String>,
    pub tags: Option<String>,
    pub visibility: Visibility,
    pub share_token: Option<String>,
    pub is_favorite: bool,
    pub category_id: Option<Uuid>,
    pub attachments: Vec<AttachmentResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EntryResponse {
    pub fn new(entry: DiaryEntry, attachments: Vec<Attachment>) -> Self {
        EntryResponse {
            visibility: entry.visibility(),
            id: entry.id,
            owner_id: entry.owner_id,
            date: entry.date,
            title: entry.title,
            body_html: entry.body_html,
            body_text: entry.body_text,
            mood: entry.mood,
            weather: entry.weather,
            tags: entry.tags,
            share_token: entry.share_token,
            is_favorite: entry.is_favorite,
            category_id: entry.category_id,
            attachments: attachments.into_iter().map(Into::into).collect(),
            created_at: entry.created_at,
            updated_at: entry.updated_at,
        }
    }
}

/// Pairs entries with their attachments, preserving entry order.
pub fn attach_all(entries: Vec<DiaryEntry>, attachments: Vec<Attachment>) -> Vec<EntryResponse> {
    let mut by_entry: HashMap<Uuid, Vec<Attachment>> = HashMap::new();
    for att in attachments {
        by_entry.entry(att.entry_id).or_default().push(att);
    }
    entries
        .into_iter()
        .map(|e| {
            let atts = by_entry.remove(&e.id).unwrap_or_default();
            EntryResponse::new(e, atts)
        })
        .collect()
}

/// Read-only projection served through a share token. Carries no owner information.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SharedEntryResponse {
    pub id: Uuid,
    pub date: NaiveDate,
    pub title: String,
    pub body_html: Option<String>,
    pub body_text: String,
    pub mood: Option<String>,
    pub weather: Option<String>,
    pub tags: Option<String>,
    pub attachments: Vec<AttachmentResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SharedEntryResponse {
    pub fn new(entry: DiaryEntry, attachments: Vec<Attachment>) -> Self {
        SharedEntryResponse {
            id: entry.id,
            date: entry.date,
            title: entry.title,
            body_html: entry.body_html,
            body_text: entry.body_text,
            mood: entry.mood,
            weather: entry.weather,
            tags: entry.tags,
            attachments: attachments.into_iter().map(Into::into).collect(),
            created_at: entry.created_at,
            updated_at: entry.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct UploadFailure {
    pub filename: String,
    pub error: String,
}

/// Result of a create/update. Non-empty `upload_errors` means partial success.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WriteOutcome {
    pub message: String,
    pub entry: EntryResponse,
    pub uploaded_files: usize,
    pub upload_errors: Vec<UploadFailure>,
}

impl WriteOutcome {
    pub fn is_partial(&self) -> bool {
        !self.upload_errors.is_empty()
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct RenameAttachmentRequest {
    pub display_name: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct RenamedAttachment {
    pub id: Uuid,
    #[serde(alias = "original_filename")]
    pub display_name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FavoriteResponse {
    pub id: Uuid,
    pub is_favorite: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReindexResponse {
    pub reindexed: u64,
}
