use axum::{extract::State, http::StatusCode, Json};

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::resume::service::{ResumeAccepted, SubmitResume};
use crate::state::AppState;

/// POST /api/resumes
/// Accepts the resume; interview questions are generated in the background.
pub async fn handle_submit_resume(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(req): Json<SubmitResume>,
) -> Result<(StatusCode, Json<ResumeAccepted>), AppError> {
    let accepted = state.resumes.submit(user_id, req).await?;
    Ok((StatusCode::CREATED, Json(accepted)))
}
