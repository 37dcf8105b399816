use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use crate::errors::AppError;

/// Header carrying the user id authenticated by the upstream gateway.
pub const USER_ID_HEADER: &str = "x-user-id";

/// The authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser(pub i64);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(USER_ID_HEADER)
            .ok_or_else(|| AppError::Unauthorized("missing caller identity".into()))?;

        value
            .to_str()
            .ok()
            .and_then(|v| v.trim().parse::<i64>().ok())
            .filter(|id| *id > 0)
            .map(AuthUser)
            .ok_or_else(|| AppError::Unauthorized("malformed caller identity".into()))
    }
}
