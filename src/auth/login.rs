use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::{
    extractor::AuthenticatedUser,
    models::{AuthResponse, LoginRequest, RegisterRequest, User, UserResponse},
    security::{create_jwt, hash_password, verify_password},
};
use crate::error::{AppError, AppResult};
use crate::AppState;

/// Client IP from proxy headers; we run behind a reverse proxy in prod.
fn client_ip(headers: &HeaderMap) -> String {
    if let Some(ip) = headers.get("X-Real-IP").and_then(|v| v.to_str().ok()) {
        return ip.to_string();
    }
    headers
        .get("X-Forwarded-For")
        .and_then(|v| v.to_str().ok())
        .and_then(|fwd| fwd.split(',').next())
        .map(|first| first.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn issue_token(state: &AppState, user: &User) -> AppResult<String> {
    create_jwt(user, &state.config.jwt_secret, state.config.jwt_expiry_hours).map_err(|e| {
        tracing::error!(error = %e, user_id = %user.id, "JWT generation failed");
        AppError::Dependency(format!("Token generation error: {e}"))
    })
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    let ip = client_ip(&headers);

    if let Err(e) = payload.validate() {
        tracing::warn!(ip = %ip, error = %e, "Registration validation failed");
        return Err(e);
    }

    let username = payload.username.trim();
    let email = payload.email.trim();

    let existing = sqlx::query_as::<_, User>(
        "SELECT * FROM users WHERE LOWER(username) = LOWER($1) OR LOWER(email) = LOWER($2)",
    )
    .bind(username)
    .bind(email)
    .fetch_optional(&state.db)
    .await
    .map_err(|e| {
        tracing::error!(
            query = "SELECT * FROM users WHERE username = ? OR email = ?",
            error = %e,
            ip    = %ip,
            "DB error during registration duplicate check"
        );
        AppError::from(e)
    })?;

    if existing.is_some() {
        tracing::warn!(username = %username, ip = %ip, "Registration failed - user already exists");
        return Err(AppError::Conflict(
            "Username or email already registered".into(),
        ));
    }

    let password_hash = hash_password(&payload.password).await?;

    let user = sqlx::query_as::<_, User>(
        "INSERT INTO users (id, username, email, password_hash) VALUES ($1, $2, $3, $4) RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(username)
    .bind(email)
    .bind(&password_hash)
    .fetch_one(&state.db)
    .await
    .map_err(|e| {
        if e
            .as_database_error()
            .is_some_and(|db| db.is_unique_violation())
        {
            return AppError::Conflict("Username or email already registered".into());
        }
        tracing::error!(
            query    = "INSERT INTO users ... RETURNING *",
            error    = %e,
            username = %username,
            "DB error while creating user"
        );
        AppError::from(e)
    })?;

    let token = issue_token(&state, &user)?;

    tracing::info!(
        user_id  = %user.id,
        username = %user.username,
        ip       = %ip,
        "New user registered"
    );

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            user: user.into(),
        }),
    ))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let ip = client_ip(&headers);
    let login = payload.username.trim();

    if login.is_empty() || payload.password.is_empty() {
        return Err(AppError::validation("Username and password are required"));
    }

    let user = sqlx::query_as::<_, User>(
        "SELECT * FROM users WHERE LOWER(username) = LOWER($1) OR LOWER(email) = LOWER($1) LIMIT 1",
    )
    .bind(login)
    .fetch_optional(&state.db)
    .await
    .map_err(|e| {
        tracing::error!(
            query = "SELECT * FROM users WHERE username = ? OR email = ?",
            error = %e,
            "DB error during login lookup"
        );
        AppError::from(e)
    })?
    .ok_or_else(|| {
        tracing::warn!(login = %login, ip = %ip, "Failed login attempt - user not found");
        AppError::Unauthorized("Invalid credentials".into())
    })?;

    if !verify_password(&payload.password, &user.password_hash).await? {
        tracing::warn!(
            user_id = %user.id,
            ip      = %ip,
            "Failed login attempt - wrong password"
        );
        return Err(AppError::Unauthorized("Invalid credentials".into()));
    }

    let token = issue_token(&state, &user)?;

    tracing::info!(
        user_id  = %user.id,
        username = %user.username,
        ip       = %ip,
        "Successful login"
    );

    Ok(Json(AuthResponse {
        token,
        user: user.into(),
    }))
}

pub async fn get_me(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<UserResponse>> {
    let user_id = claims.owner_id()?;

    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(&state.db)
        .await
        .map_err(|e| {
            tracing::error!(
                query   = "SELECT * FROM users WHERE id = ?",
                error   = %e,
                user_id = %user_id,
                "DB error in get_me"
            );
            AppError::from(e)
        })?
        .ok_or_else(|| AppError::not_found("User"))?;

    Ok(Json(user.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_ip_prefers_real_ip() {
        let mut headers = HeaderMap::new();
        headers.insert("X-Forwarded-For", "10.0.0.1, 10.0.0.2".parse().unwrap());
        assert_eq!(client_ip(&headers), "10.0.0.1");

        headers.insert("X-Real-IP", "192.168.1.9".parse().unwrap());
        assert_eq!(client_ip(&headers), "192.168.1.9");

        assert_eq!(client_ip(&HeaderMap::new()), "unknown");
    }
}
