use axum::{extract::State, http::StatusCode, Json};

use crate::auth::AuthUser;
use crate::device::service::{RegisterWatch, TokenCommit, TokenCommitted};
use crate::errors::AppError;
use crate::models::watch::Watch;
use crate::state::AppState;

/// POST /api/watch/register
pub async fn handle_register_watch(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(req): Json<RegisterWatch>,
) -> Result<(StatusCode, Json<Watch>), AppError> {
    let watch = state.devices.register(user_id, req).await?;
    Ok((StatusCode::CREATED, Json(watch)))
}

/// GET /api/watch/me
pub async fn handle_my_watch(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Option<Watch>>, AppError> {
    Ok(Json(state.devices.my_watch(user_id).await?))
}

/// DELETE /api/watch/me
pub async fn handle_unregister_watch(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<StatusCode, AppError> {
    state.devices.unregister(user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/watch/token/commit (device-signed once a secret exists)
pub async fn handle_token_commit(
    State(state): State<AppState>,
    Json(req): Json<TokenCommit>,
) -> Result<Json<TokenCommitted>, AppError> {
    Ok(Json(state.devices.commit_token(req).await?))
}
