use axum::{extract::FromRequestParts, http::request::Parts};
use std::future::{ready, Future};

use crate::auth::models::Claims;
use crate::error::AppError;

/// Caller identity placed in request extensions by `auth_middleware`.
pub struct AuthenticatedUser(pub Claims);

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> impl Future<Output = Result<Self, Self::Rejection>> + Send {
        let result = parts
            .extensions
            .get::<Claims>()
            .cloned()
            .map(AuthenticatedUser)
            .ok_or_else(|| AppError::Unauthorized("No authentication information".into()));
        ready(result)
    }
}
