use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

pub const PRIORITIES: &[&str] = &["low", "medium", "high"];
pub const DEFAULT_PRIORITY: &str = "medium";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Task {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub diary_entry_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub priority: String,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct TaskQuery {
    pub diary_entry_id: Option<Uuid>,
    pub completed: Option<bool>,
    pub due_date: Option<NaiveDate>,
}

/// Body of both create and update; update replaces every field.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct TaskRequest {
    pub diary_entry_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub priority: Option<String>,
    #[serde(default)]
    pub completed: bool,
}

impl TaskRequest {
    pub fn validate(&self) -> AppResult<()> {
        if self.title.trim().is_empty() {
            return Err(AppError::validation("Title is required"));
        }
        self.priority()?;
        Ok(())
    }

    pub fn priority(&self) -> AppResult<&str> {
        match self.priority.as_deref().map(str::trim) {
            None | Some("") => Ok(DEFAULT_PRIORITY),
            Some(p) if PRIORITIES.contains(&p) => Ok(p),
            Some(p) => Err(AppError::validation(format!("Unknown priority: {p}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_required() {
        let req = TaskRequest {
            title: "  ".into(),
            ..Default::default()
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_priority_defaults_to_medium() {
        let req = TaskRequest {
            title: "Water plants".into(),
            ..Default::default()
        };
        assert_eq!(req.priority().unwrap(), "medium");

        let urgent = TaskRequest {
            title: "x".into(),
            priority: Some("urgent".into()),
            ..Default::default()
        };
        assert!(urgent.validate().is_err());
    }
}
