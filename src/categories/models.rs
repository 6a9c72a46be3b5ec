use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Category {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct CategoryRequest {
    pub name: String,
}

impl CategoryRequest {
    pub fn name(&self) -> AppResult<&str> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(AppError::validation("Category name is required"));
        }
        Ok(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_is_trimmed_and_required() {
        let req = CategoryRequest {
            name: "  Travel ".into(),
        };
        assert_eq!(req.name().unwrap(), "Travel");

        let blank = CategoryRequest { name: "   ".into() };
        assert!(matches!(blank.name(), Err(AppError::Validation(_))));
    }
}
