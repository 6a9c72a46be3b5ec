//! The multipart form carried by entry create and update.

use axum::extract::Multipart;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use uuid::Uuid;

use crate::diary::models::{EntryDraft, RenamedAttachment, Visibility};
use crate::diary::text::body_text_from;
use crate::error::{AppError, AppResult};
use crate::search::query::parse_date;

pub const MAX_FILES: usize = 10;
pub const FILE_FIELD: &str = "attachments";

const ALLOWED_MIME_TYPES: &[&str] = &[
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/gif",
    "image/webp",
    "application/pdf",
    "text/plain",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
];

const ALLOWED_EXTENSIONS: &[&str] = &[
    "jpeg", "jpg", "png", "gif", "webp", "pdf", "txt", "doc", "docx",
];

#[derive(Debug, Clone)]
pub struct UploadFile {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

fn extension(file_name: &str) -> Option<String> {
    file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
}

/// Accepted when either the MIME type or the file extension is on the allow-list.
pub fn check_upload(file: &UploadFile, max_bytes: usize) -> AppResult<()> {
    if file.bytes.len() > max_bytes {
        return Err(AppError::validation(format!(
            "{} exceeds the {} byte upload limit",
            file.file_name, max_bytes
        )));
    }
    let mime_ok = ALLOWED_MIME_TYPES.contains(&file.mime_type.as_str());
    let ext_ok = extension(&file.file_name).is_some_and(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()));
    if !(mime_ok || ext_ok) {
        return Err(AppError::validation(format!(
            "Invalid file type for {}. Only images and documents are allowed.",
            file.file_name
        )));
    }
    Ok(())
}

#[derive(Debug, Default)]
pub struct EntryForm {
    fields: HashMap<String, String>,
    pub files: Vec<UploadFile>,
}

impl EntryForm {
    /// Reads every part; uploads are checked here so a bad file fails
    /// the request before anything is written.
    pub async fn read(mut multipart: Multipart, max_upload_bytes: usize) -> AppResult<Self> {
        let mut form = EntryForm::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::validation(format!("Invalid multipart body: {e}")))?
        {
            let name = field.name().unwrap_or_default().to_string();

            if name == FILE_FIELD {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let mime_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::validation(format!("Failed to read upload: {e}")))?;

                // browsers submit an empty part for an untouched file input
                if file_name.is_empty() && bytes.is_empty() {
                    continue;
                }
                form.push_file(
                    UploadFile {
                        file_name,
                        mime_type,
                        bytes: bytes.to_vec(),
                    },
                    max_upload_bytes,
                )?;
            } else {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::validation(format!("Invalid field {name}: {e}")))?;
                form.fields.insert(name, value);
            }
        }

        Ok(form)
    }

    pub fn with_field(mut self, name: &str, value: &str) -> Self {
        self.fields.insert(name.to_string(), value.to_string());
        self
    }

    pub fn push_file(&mut self, file: UploadFile, max_upload_bytes: usize) -> AppResult<()> {
        if self.files.len() >= MAX_FILES {
            return Err(AppError::validation(format!(
                "At most {MAX_FILES} attachments per request"
            )));
        }
        check_upload(&file, max_upload_bytes)?;
        self.files.push(file);
        Ok(())
    }

    /// Trimmed, non-empty value of the first of `names` present.
    fn text(&self, names: &[&str]) -> Option<&str> {
        names
            .iter()
            .find_map(|n| self.fields.get(*n))
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    fn json<T: DeserializeOwned + Default>(&self, names: &[&str]) -> AppResult<T> {
        match self.text(names) {
            None => Ok(T::default()),
            Some(raw) => serde_json::from_str(raw)
                .map_err(|e| AppError::validation(format!("{} is not valid JSON: {e}", names[0]))),
        }
    }

    pub fn draft(&self) -> AppResult<EntryDraft> {
        let date = match self.text(&["date"]) {
            None => return Err(AppError::validation("date is required")),
            Some(raw) => parse_date("date", raw)?,
        };

        let visibility = match self.text(&["visibility"]) {
            None => None,
            Some(raw) => Some(Visibility::parse(raw).ok_or_else(|| {
                AppError::validation("visibility must be private, unlisted or public")
            })?),
        };

        let category_id = self
            .text(&["category_id", "categoryId"])
            .map(|raw| {
                Uuid::parse_str(raw).map_err(|_| AppError::validation("category_id must be a UUID"))
            })
            .transpose()?;

        let is_favorite = self
            .text(&["is_favorite", "isFavorite"])
            .map(|raw| matches!(raw, "true" | "1" | "on"));

        let body_html = self
            .fields
            .get("content_html")
            .filter(|h| !h.trim().is_empty())
            .cloned();
        let body_text = body_text_from(
            body_html.as_deref(),
            self.fields.get("content").map(String::as_str),
        );

        Ok(EntryDraft {
            date,
            title: self.text(&["title"]).unwrap_or_default().to_string(),
            body_html,
            body_text,
            mood: self.text(&["mood"]).map(str::to_string),
            weather: self.text(&["weather"]).map(str::to_string),
            tags: self.text(&["tags"]).map(str::to_string),
            visibility,
            category_id,
            is_favorite,
        })
    }

    /// Original file name to display name.
    pub fn custom_filenames(&self) -> AppResult<HashMap<String, String>> {
        self.json(&["custom_filenames", "customFilenames"])
    }

    pub fn deleted_attachments(&self) -> AppResult<Vec<Uuid>> {
        self.json(&["deleted_attachments", "deletedAttachments"])
    }

    pub fn renamed_attachments(&self) -> AppResult<Vec<RenamedAttachment>> {
        let renamed: Vec<RenamedAttachment> =
            self.json(&["renamed_attachments", "renamedAttachments"])?;
        if renamed.iter().any(|r| r.display_name.trim().is_empty()) {
            return Err(AppError::validation("display_name cannot be empty"));
        }
        Ok(renamed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAX: usize = 1024;

    fn file(name: &str, mime: &str, size: usize) -> UploadFile {
        UploadFile {
            file_name: name.into(),
            mime_type: mime.into(),
            bytes: vec![0; size],
        }
    }

    #[test]
    fn test_date_is_required() {
        let err = EntryForm::default().with_field("title", "x").draft().unwrap_err();
        assert_eq!(err.to_string(), "date is required");

        let err = EntryForm::default().with_field("date", "15/01/2024").draft().unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_date_outside_column_range() {
        for raw in ["0000-12-31", "-5000-01-01", "+262142-12-31"] {
            let err = EntryForm::default().with_field("date", raw).draft().unwrap_err();
            assert_eq!(err.to_string(), "date is out of range");
        }
        let draft = EntryForm::default().with_field("date", "9999-12-31").draft().unwrap();
        assert_eq!(draft.date.to_string(), "9999-12-31");
    }

    #[test]
    fn test_draft_from_html() {
        let draft = EntryForm::default()
            .with_field("date", "2024-01-15")
            .with_field("title", " Morning walk ")
            .with_field("content_html", "<p>Saw a <b>cat6</b></p><p>in the park</p>")
            .with_field("tags", "outdoors")
            .with_field("mood", "")
            .draft()
            .unwrap();
        assert_eq!(draft.title, "Morning walk");
        assert_eq!(draft.body_text, "Saw a cat6 in the park");
        assert_eq!(draft.tags.as_deref(), Some("outdoors"));
        assert_eq!(draft.mood, None);
        assert_eq!(draft.visibility, None);
        assert_eq!(draft.is_favorite, None);
    }

    #[test]
    fn test_legacy_content_field() {
        let draft = EntryForm::default()
            .with_field("date", "2024-01-15")
            .with_field("content", "plain   text")
            .draft()
            .unwrap();
        assert_eq!(draft.body_html, None);
        assert_eq!(draft.body_text, "plain text");
    }

    #[test]
    fn test_visibility_and_category() {
        let id = Uuid::new_v4();
        let draft = EntryForm::default()
            .with_field("date", "2024-01-15")
            .with_field("visibility", "Unlisted")
            .with_field("category_id", &id.to_string())
            .with_field("is_favorite", "true")
            .draft()
            .unwrap();
        assert_eq!(draft.visibility, Some(Visibility::Unlisted));
        assert_eq!(draft.category_id, Some(id));
        assert_eq!(draft.is_favorite, Some(true));

        let bad = EntryForm::default()
            .with_field("date", "2024-01-15")
            .with_field("visibility", "friends")
            .draft();
        assert!(bad.is_err());
    }

    #[test]
    fn test_json_fields() {
        let id = Uuid::new_v4();
        let form = EntryForm::default()
            .with_field("customFilenames", r#"{"IMG_1.jpg": "Beach"}"#)
            .with_field("deleted_attachments", &format!(r#"["{id}"]"#))
            .with_field(
                "renamed_attachments",
                &format!(r#"[{{"id": "{id}", "display_name": "Notes"}}]"#),
            );
        assert_eq!(form.custom_filenames().unwrap()["IMG_1.jpg"], "Beach");
        assert_eq!(form.deleted_attachments().unwrap(), vec![id]);
        assert_eq!(form.renamed_attachments().unwrap()[0].display_name, "Notes");

        let empty = EntryForm::default();
        assert!(empty.deleted_attachments().unwrap().is_empty());

        let broken = EntryForm::default().with_field("deleted_attachments", "[not json");
        assert!(broken.deleted_attachments().is_err());
    }

    #[test]
    fn test_upload_policy() {
        assert!(check_upload(&file("a.png", "image/png", 10), MAX).is_ok());
        // extension alone is enough
        assert!(check_upload(&file("notes.docx", "application/octet-stream", 10), MAX).is_ok());
        assert!(check_upload(&file("run.exe", "application/x-msdownload", 10), MAX).is_err());
        assert!(check_upload(&file("big.png", "image/png", MAX + 1), MAX).is_err());
    }

    #[test]
    fn test_file_count_limit() {
        let mut form = EntryForm::default();
        for i in 0..MAX_FILES {
            form.push_file(file(&format!("{i}.txt"), "text/plain", 1), MAX).unwrap();
        }
        assert!(form.push_file(file("extra.txt", "text/plain", 1), MAX).is_err());
    }
}
