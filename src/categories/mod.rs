pub mod handlers;
pub mod models;

use sqlx::PgExecutor;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// `NotFound` unless `category_id` belongs to `owner_id`.
pub async fn ensure_owned<'e, E>(exec: E, owner_id: Uuid, category_id: Uuid) -> AppResult<()>
where
    E: PgExecutor<'e>,
{
    let found: Option<Uuid> =
        sqlx::query_scalar("SELECT id FROM categories WHERE id = $1 AND owner_id = $2")
            .bind(category_id)
            .bind(owner_id)
            .fetch_optional(exec)
            .await?;

    match found {
        Some(_) => Ok(()),
        None => Err(AppError::not_found("Category")),
    }
}
