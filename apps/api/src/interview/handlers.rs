use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::interview::reply::{FollowUpQuestion, ReplyRequest};
use crate::interview::session::{DemoInterview, DemoRequest, EndRequest, QuestionAudio};
use crate::models::interview::Reply;
use crate::state::AppState;
use crate::storage::UploadTicket;

#[derive(Deserialize)]
pub struct UploadUrlRequest {
    pub file_name: String,
}

/// GET /api/interviews/:id/questions
/// Returns the question audio URLs and moves the interview to IN_PROGRESS.
pub async fn handle_question_urls(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(interview_id): Path<i64>,
) -> Result<Json<Vec<QuestionAudio>>, AppError> {
    Ok(Json(
        state.sessions.question_urls(user_id, interview_id).await?,
    ))
}

/// POST /api/interviews/audio/upload-url
pub async fn handle_audio_upload_url(
    State(state): State<AppState>,
    AuthUser(_): AuthUser,
    Json(req): Json<UploadUrlRequest>,
) -> Result<Json<UploadTicket>, AppError> {
    Ok(Json(state.sessions.audio_upload_url(&req.file_name).await?))
}

/// POST /api/interviews/reply
pub async fn handle_reply(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(req): Json<ReplyRequest>,
) -> Result<(StatusCode, Json<Reply>), AppError> {
    let reply = state.replies.register_reply(user_id, req).await?;
    Ok((StatusCode::CREATED, Json(reply)))
}

/// POST /api/interviews/reply/follow-up
pub async fn handle_reply_with_follow_up(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(req): Json<ReplyRequest>,
) -> Result<(StatusCode, Json<FollowUpQuestion>), AppError> {
    let follow_up = state
        .replies
        .register_reply_with_follow_up(user_id, req)
        .await?;
    Ok((StatusCode::CREATED, Json(follow_up)))
}

/// POST /api/interviews/end
/// Scoring continues in the background; the report shows up once it lands.
pub async fn handle_end_interview(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(req): Json<EndRequest>,
) -> Result<StatusCode, AppError> {
    state.sessions.end(user_id, req).await?;
    Ok(StatusCode::ACCEPTED)
}

/// POST /api/interviews/demo
pub async fn handle_create_demo(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(req): Json<DemoRequest>,
) -> Result<(StatusCode, Json<DemoInterview>), AppError> {
    let demo = state
        .sessions
        .create_demo(user_id, req.job_posting_id)
        .await?;
    Ok((StatusCode::CREATED, Json(demo)))
}
