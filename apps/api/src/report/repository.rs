use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::is_unique_violation;
use crate::errors::AppError;
use crate::models::report::{QnaItem, Report, ReportCompletion, ReportRow, ReportStatus};

/// Report documents, one active report per interview.
#[async_trait]
pub trait ReportRepository: Send + Sync {
    async fn find(&self, id: Uuid) -> Result<Option<Report>, AppError>;

    async fn find_active_by_interview(&self, interview_id: i64)
        -> Result<Option<Report>, AppError>;

    /// Inserts a `CREATING` report. `None` when an active report for the
    /// interview already exists.
    async fn insert(
        &self,
        interview_id: i64,
        qna_list: Vec<QnaItem>,
    ) -> Result<Option<Report>, AppError>;

    /// Stores the final scoring and moves the report to `COMPLETED`.
    async fn complete(&self, id: Uuid, completion: ReportCompletion) -> Result<(), AppError>;

    async fn set_status(&self, id: Uuid, status: ReportStatus) -> Result<(), AppError>;

    /// Returns whether an active report was deleted.
    async fn soft_delete(&self, id: Uuid) -> Result<bool, AppError>;

    /// Active reports of the given interviews, in one query.
    async fn active_for_interviews(&self, interview_ids: &[i64]) -> Result<Vec<Report>, AppError>;
}

const REPORT_COLUMNS: &str =
    "id, interview_id, status, scores, narrative, qna_list, deleted_at, created_at, updated_at";

#[derive(Clone)]
pub struct PgReportRepository {
    pool: PgPool,
}

impl PgReportRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReportRepository for PgReportRepository {
    async fn find(&self, id: Uuid) -> Result<Option<Report>, AppError> {
        let row: Option<ReportRow> =
            sqlx::query_as(&format!("SELECT {REPORT_COLUMNS} FROM reports WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(Report::try_from).transpose()?)
    }

    async fn find_active_by_interview(
        &self,
        interview_id: i64,
    ) -> Result<Option<Report>, AppError> {
        let row: Option<ReportRow> = sqlx::query_as(&format!(
            "SELECT {REPORT_COLUMNS} FROM reports \
             WHERE interview_id = $1 AND deleted_at IS NULL"
        ))
        .bind(interview_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Report::try_from).transpose()?)
    }

    async fn insert(
        &self,
        interview_id: i64,
        qna_list: Vec<QnaItem>,
    ) -> Result<Option<Report>, AppError> {
        let result: Result<ReportRow, sqlx::Error> = sqlx::query_as(&format!(
            r#"
            INSERT INTO reports (id, interview_id, status, scores, narrative, qna_list)
            VALUES ($1, $2, $3, '{{}}'::jsonb, '', $4)
            RETURNING {REPORT_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(interview_id)
        .bind(ReportStatus::Creating.as_str())
        .bind(Json(qna_list))
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(row) => Ok(Some(Report::try_from(row)?)),
            Err(err) if is_unique_violation(&err) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn complete(&self, id: Uuid, completion: ReportCompletion) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE reports
            SET status = $1, scores = $2, narrative = $3, qna_list = $4, updated_at = NOW()
            WHERE id = $5
            "#,
        )
        .bind(ReportStatus::Completed.as_str())
        .bind(Json(completion.scores))
        .bind(completion.narrative)
        .bind(Json(completion.qna_list))
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("report {id} not found")));
        }
        Ok(())
    }

    async fn set_status(&self, id: Uuid, status: ReportStatus) -> Result<(), AppError> {
        let result =
            sqlx::query("UPDATE reports SET status = $1, updated_at = NOW() WHERE id = $2")
                .bind(status.as_str())
                .bind(id)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("report {id} not found")));
        }
        Ok(())
    }

    async fn soft_delete(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE reports SET deleted_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn active_for_interviews(&self, interview_ids: &[i64]) -> Result<Vec<Report>, AppError> {
        if interview_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows: Vec<ReportRow> = sqlx::query_as(&format!(
            "SELECT {REPORT_COLUMNS} FROM reports \
             WHERE interview_id = ANY($1) AND deleted_at IS NULL"
        ))
        .bind(interview_ids)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| Report::try_from(row).map_err(AppError::from))
            .collect()
    }
}
