use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::heartbeat::mapper::QuestionHeartbeat;
use crate::report::service::{ReportDetail, ReportSummary};
use crate::state::AppState;

/// GET /api/reports
pub async fn handle_list_reports(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<ReportSummary>>, AppError> {
    Ok(Json(state.reports.list_reports(user_id).await?))
}

/// GET /api/reports/:id
pub async fn handle_get_report(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(report_id): Path<Uuid>,
) -> Result<Json<ReportDetail>, AppError> {
    Ok(Json(state.reports.get_report(user_id, report_id).await?))
}

/// DELETE /api/reports/:id
pub async fn handle_delete_report(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(report_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.reports.delete_report(user_id, report_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/reports/:id/heartbeat/questions-avg
pub async fn handle_question_heartbeats(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(report_id): Path<Uuid>,
) -> Result<Json<Vec<QuestionHeartbeat>>, AppError> {
    Ok(Json(
        state.reports.question_heartbeats(user_id, report_id).await?,
    ))
}
