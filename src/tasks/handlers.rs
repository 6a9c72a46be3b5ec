use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::extractor::AuthenticatedUser;
use crate::error::{AppError, AppResult};
use crate::tasks::models::{Task, TaskQuery, TaskRequest};
use crate::AppState;

async fn ensure_entry_owned(db: &PgPool, owner_id: Uuid, entry_id: Option<Uuid>) -> AppResult<()> {
    let Some(entry_id) = entry_id else {
        return Ok(());
    };
    let found: Option<Uuid> =
        sqlx::query_scalar("SELECT id FROM diary_entries WHERE id = $1 AND owner_id = $2")
            .bind(entry_id)
            .bind(owner_id)
            .fetch_optional(db)
            .await?;
    found
        .map(|_| ())
        .ok_or_else(|| AppError::not_found("Diary entry"))
}

pub async fn list_tasks(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<TaskQuery>,
) -> AppResult<Json<Vec<Task>>> {
    let owner_id = claims.owner_id()?;

    let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM tasks WHERE owner_id = ");
    qb.push_bind(owner_id);
    if let Some(entry_id) = query.diary_entry_id {
        qb.push(" AND diary_entry_id = ").push_bind(entry_id);
    }
    if let Some(completed) = query.completed {
        qb.push(" AND completed = ").push_bind(completed);
    }
    if let Some(due) = query.due_date {
        qb.push(" AND due_date = ").push_bind(due);
    }
    qb.push(" ORDER BY created_at DESC, id DESC");

    let tasks = qb
        .build_query_as::<Task>()
        .fetch_all(&state.db)
        .await
        .map_err(|e| {
            tracing::error!(
                query   = "SELECT * FROM tasks WHERE owner_id = ? ...",
                error   = %e,
                user_id = %owner_id,
                "DB error listing tasks"
            );
            AppError::from(e)
        })?;

    Ok(Json(tasks))
}

pub async fn get_task(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Task>> {
    let owner_id = claims.owner_id()?;

    let task = sqlx::query_as::<_, Task>("SELECT * FROM tasks WHERE id = $1 AND owner_id = $2")
        .bind(id)
        .bind(owner_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::not_found("Task"))?;

    Ok(Json(task))
}

pub async fn create_task(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(payload): Json<TaskRequest>,
) -> AppResult<(StatusCode, Json<Task>)> {
    let owner_id = claims.owner_id()?;
    payload.validate()?;
    ensure_entry_owned(&state.db, owner_id, payload.diary_entry_id).await?;

    let task = sqlx::query_as::<_, Task>(
        r#"
        INSERT INTO tasks (id, owner_id, diary_entry_id, title, description, due_date, priority, completed)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(owner_id)
    .bind(payload.diary_entry_id)
    .bind(payload.title.trim())
    .bind(&payload.description)
    .bind(payload.due_date)
    .bind(payload.priority()?)
    .bind(payload.completed)
    .fetch_one(&state.db)
    .await
    .map_err(|e| {
        tracing::error!(
            query   = "INSERT INTO tasks ... RETURNING *",
            error   = %e,
            user_id = %owner_id,
            "DB error creating task"
        );
        AppError::from(e)
    })?;

    tracing::info!(user_id = %owner_id, task_id = %task.id, "Task created");

    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn update_task(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<TaskRequest>,
) -> AppResult<Json<Task>> {
    let owner_id = claims.owner_id()?;
    payload.validate()?;
    ensure_entry_owned(&state.db, owner_id, payload.diary_entry_id).await?;

    let task = sqlx::query_as::<_, Task>(
        r#"
        UPDATE tasks
        SET diary_entry_id = $1,
            title = $2,
            description = $3,
            due_date = $4,
            priority = $5,
            completed = $6,
            updated_at = NOW()
        WHERE id = $7 AND owner_id = $8
        RETURNING *
        "#,
    )
    .bind(payload.diary_entry_id)
    .bind(payload.title.trim())
    .bind(&payload.description)
    .bind(payload.due_date)
    .bind(payload.priority()?)
    .bind(payload.completed)
    .bind(id)
    .bind(owner_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| AppError::not_found("Task"))?;

    Ok(Json(task))
}

pub async fn toggle_task(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Task>> {
    let owner_id = claims.owner_id()?;

    let task = sqlx::query_as::<_, Task>(
        "UPDATE tasks SET completed = NOT completed, updated_at = NOW() WHERE id = $1 AND owner_id = $2 RETURNING *",
    )
    .bind(id)
    .bind(owner_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| AppError::not_found("Task"))?;

    Ok(Json(task))
}

pub async fn delete_task(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let owner_id = claims.owner_id()?;

    let result = sqlx::query("DELETE FROM tasks WHERE id = $1 AND owner_id = $2")
        .bind(id)
        .bind(owner_id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found("Task"));
    }

    tracing::info!(user_id = %owner_id, task_id = %id, "Task deleted");

    Ok(StatusCode::NO_CONTENT)
}
