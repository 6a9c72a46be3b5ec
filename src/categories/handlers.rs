use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::extractor::AuthenticatedUser;
use crate::categories::models::{Category, CategoryRequest};
use crate::error::{AppError, AppResult};
use crate::AppState;

fn duplicate_name(e: sqlx::Error) -> AppError {
    if e.as_database_error()
        .is_some_and(|db| db.is_unique_violation())
    {
        return AppError::Conflict("A category with this name already exists".into());
    }
    AppError::from(e)
}

pub async fn list_categories(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<Category>>> {
    let owner_id = claims.owner_id()?;

    let categories = sqlx::query_as::<_, Category>(
        "SELECT * FROM categories WHERE owner_id = $1 ORDER BY LOWER(name), created_at",
    )
    .bind(owner_id)
    .fetch_all(&state.db)
    .await
    .map_err(|e| {
        tracing::error!(
            query   = "SELECT * FROM categories WHERE owner_id = ?",
            error   = %e,
            user_id = %owner_id,
            "DB error listing categories"
        );
        AppError::from(e)
    })?;

    Ok(Json(categories))
}

pub async fn create_category(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(payload): Json<CategoryRequest>,
) -> AppResult<(StatusCode, Json<Category>)> {
    let owner_id = claims.owner_id()?;
    let name = payload.name()?;

    let category = sqlx::query_as::<_, Category>(
        "INSERT INTO categories (id, owner_id, name) VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(owner_id)
    .bind(name)
    .fetch_one(&state.db)
    .await
    .map_err(duplicate_name)?;

    tracing::info!(user_id = %owner_id, category_id = %category.id, "Category created");

    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn rename_category(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<CategoryRequest>,
) -> AppResult<Json<Category>> {
    let owner_id = claims.owner_id()?;
    let name = payload.name()?;

    let category = sqlx::query_as::<_, Category>(
        "UPDATE categories SET name = $1 WHERE id = $2 AND owner_id = $3 RETURNING *",
    )
    .bind(name)
    .bind(id)
    .bind(owner_id)
    .fetch_optional(&state.db)
    .await
    .map_err(duplicate_name)?
    .ok_or_else(|| AppError::not_found("Category"))?;

    Ok(Json(category))
}

/// Entries in the category keep existing with `category_id` cleared.
pub async fn delete_category(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let owner_id = claims.owner_id()?;

    let mut tx = state.db.begin().await?;

    sqlx::query("UPDATE diary_entries SET category_id = NULL WHERE category_id = $1 AND owner_id = $2")
        .bind(id)
        .bind(owner_id)
        .execute(&mut *tx)
        .await?;

    let result = sqlx::query("DELETE FROM categories WHERE id = $1 AND owner_id = $2")
        .bind(id)
        .bind(owner_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            tracing::error!(
                query       = "DELETE FROM categories WHERE id = ? AND owner_id = ?",
                error       = %e,
                category_id = %id,
                "DB error deleting category"
            );
            AppError::from(e)
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found("Category"));
    }

    tx.commit().await?;

    tracing::info!(user_id = %owner_id, category_id = %id, "Category deleted");

    Ok(StatusCode::NO_CONTENT)
}
