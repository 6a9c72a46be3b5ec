use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use std::sync::Arc;

use crate::auth::models::{Claims, User};
use crate::error::{AppError, AppResult};
use crate::AppState;

/// bcrypt runs on the blocking pool so request workers stay free.
pub async fn hash_password(password: &str) -> AppResult<String> {
    let password = password.to_owned();
    tokio::task::spawn_blocking(move || bcrypt::hash(password, bcrypt::DEFAULT_COST))
        .await
        .map_err(|e| AppError::Dependency(format!("Password hashing task failed: {e}")))?
        .map_err(|e| AppError::Dependency(format!("Password hashing error: {e}")))
}

pub async fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    let password = password.to_owned();
    let hash = hash.to_owned();
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| AppError::Dependency(format!("Password verification task failed: {e}")))?
        .map_err(|e| AppError::Dependency(format!("Password verification error: {e}")))
}

pub fn create_jwt(
    user: &User,
    secret: &str,
    expiry_hours: i64,
) -> Result<String, jsonwebtoken::errors::Error> {
    let expiration = chrono::Utc::now()
        .checked_add_signed(chrono::Duration::hours(expiry_hours))
        .map(|t| t.timestamp())
        .unwrap_or(i64::MAX) as usize;

    let claims = Claims {
        sub: user.id.to_string(),
        username: user.username.clone(),
        email: user.email.clone(),
        exp: expiration,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

pub fn decode_jwt(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;

    Ok(token_data.claims)
}

pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = match req.headers().get(header::AUTHORIZATION) {
        Some(header) => header
            .to_str()
            .map_err(|_| AppError::Unauthorized("Invalid authorization header".into()))?,
        None => {
            return Err(AppError::Unauthorized(
                "Missing authorization header".into(),
            ));
        }
    };

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Unauthorized("Invalid authorization header format".into()))?;

    let claims = decode_jwt(token, &state.config.jwt_secret).map_err(|e| {
        tracing::debug!(error = %e, "Rejected bearer token");
        AppError::Unauthorized("Invalid or expired token".into())
    })?;

    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn user() -> User {
        User {
            id: Uuid::new_v4(),
            username: "ana".into(),
            email: "ana@example.com".into(),
            password_hash: String::new(),
            created_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_password_hashing_and_verification() {
        let password = "my_secure_password";
        let hash = hash_password(password).await.expect("hashing failed");

        assert_ne!(password, hash);
        assert!(verify_password(password, &hash).await.expect("verification failed"));
        assert!(!verify_password("wrong_password", &hash)
            .await
            .expect("verification failed"));
    }

    #[test]
    fn test_jwt_creation_and_decoding() {
        let secret = "super_secret_key";
        let user = user();

        let token = create_jwt(&user, secret, 1).expect("creation failed");
        let claims = decode_jwt(&token, secret).expect("decoding failed");

        assert_eq!(claims.sub, user.id.to_string());
        assert_eq!(claims.username, "ana");
        assert_eq!(claims.owner_id().unwrap(), user.id);
    }

    #[test]
    fn test_jwt_wrong_secret_is_rejected() {
        let token = create_jwt(&user(), "one", 1).unwrap();
        assert!(decode_jwt(&token, "two").is_err());
    }

    #[test]
    fn test_jwt_expiration_validation() {
        let secret = "super_secret_key";
        let claims = Claims {
            sub: Uuid::new_v4().to_string(),
            username: "test".to_string(),
            email: "test@example.com".to_string(),
            exp: (chrono::Utc::now().timestamp() - 3600) as usize, // 1 hour ago
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap();

        assert!(decode_jwt(&token, secret).is_err());
    }
}
