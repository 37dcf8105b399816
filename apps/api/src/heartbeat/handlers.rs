use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::heartbeat::mapper::QuestionHeartbeat;
use crate::heartbeat::service::HeartbeatBatch;
use crate::state::AppState;

#[derive(Serialize)]
pub struct BatchStored {
    pub stored: u64,
}

/// POST /api/heartbeat/batch (device-signed)
pub async fn handle_heartbeat_batch(
    State(state): State<AppState>,
    Json(batch): Json<HeartbeatBatch>,
) -> Result<Json<BatchStored>, AppError> {
    let stored = state.heartbeats.ingest(batch).await?;
    Ok(Json(BatchStored { stored }))
}

/// GET /api/heartbeat/interviews/:id/questions-avg
pub async fn handle_question_averages(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(interview_id): Path<i64>,
) -> Result<Json<Vec<QuestionHeartbeat>>, AppError> {
    Ok(Json(
        state
            .heartbeats
            .question_averages_for(user_id, interview_id)
            .await?,
    ))
}
