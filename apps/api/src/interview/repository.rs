use async_trait::async_trait;
use sqlx::PgPool;

use crate::errors::AppError;
use crate::models::interview::{
    Interview, InterviewQuestion, InterviewRow, NewInterview, NewReply, ProgressStatus,
    QuestionDraft, QuestionRow, Reply,
};
use crate::models::UnknownVariant;

/// Persistence for interviews, their question tree and replies.
#[async_trait]
pub trait InterviewRepository: Send + Sync {
    async fn find_interview(&self, id: i64) -> Result<Option<Interview>, AppError>;

    async fn find_interview_by_resume(&self, resume_id: i64)
        -> Result<Option<Interview>, AppError>;

    async fn create_interview(&self, new: NewInterview) -> Result<Interview, AppError>;

    /// Interview and its first question in one transaction.
    async fn create_interview_with_question(
        &self,
        new: NewInterview,
        question: QuestionDraft,
    ) -> Result<(Interview, InterviewQuestion), AppError>;

    /// Moves the interview to `to` only if it is currently in one of `from`.
    /// Returns whether a row changed.
    async fn update_status(
        &self,
        id: i64,
        from: &[ProgressStatus],
        to: ProgressStatus,
    ) -> Result<bool, AppError>;

    async fn interview_ids_for_job_posting(&self, job_posting_id: i64)
        -> Result<Vec<i64>, AppError>;

    async fn interviews_for_user(&self, user_id: i64) -> Result<Vec<Interview>, AppError>;

    async fn find_question(&self, id: i64) -> Result<Option<InterviewQuestion>, AppError>;

    /// Every question of the interview, ordered by creation.
    async fn questions_for_interview(
        &self,
        interview_id: i64,
    ) -> Result<Vec<InterviewQuestion>, AppError>;

    /// Inserts all drafts or none.
    async fn insert_questions(
        &self,
        interview_id: i64,
        drafts: Vec<QuestionDraft>,
    ) -> Result<Vec<InterviewQuestion>, AppError>;

    async fn delete_questions(&self, ids: &[i64]) -> Result<u64, AppError>;

    async fn replies_for_interview(&self, interview_id: i64) -> Result<Vec<Reply>, AppError>;

    /// Creates the question's reply, or overwrites it keeping id and creation time.
    async fn upsert_reply(&self, reply: NewReply) -> Result<Reply, AppError>;

    /// Reply upsert plus a follow-up question in one transaction.
    async fn save_reply_with_follow_up(
        &self,
        reply: NewReply,
        interview_id: i64,
        follow_up: QuestionDraft,
    ) -> Result<(Reply, InterviewQuestion), AppError>;
}

const INTERVIEW_COLUMNS: &str = r#"
    i.id, i.resume_id, i.company_id, i.related_question, i.progress_status,
    r.user_id AS owner_id, r.job_posting_id, i.created_at
"#;

const QUESTION_COLUMNS: &str =
    "id, interview_id, parent_id, content, s3_key, difficulty, created_at";

const INSERT_QUESTION: &str = r#"
    INSERT INTO interview_questions
        (interview_id, parent_id, content, s3_key, difficulty, created_at)
    VALUES ($1, $2, $3, $4, $5, clock_timestamp())
    RETURNING id, interview_id, parent_id, content, s3_key, difficulty, created_at
"#;

const UPSERT_REPLY: &str = r#"
    INSERT INTO replies (question_id, content, s3_key, created_at, updated_at)
    VALUES ($1, $2, $3, clock_timestamp(), clock_timestamp())
    ON CONFLICT (question_id) DO UPDATE
        SET content = EXCLUDED.content,
            s3_key = EXCLUDED.s3_key,
            updated_at = EXCLUDED.updated_at
    RETURNING id, question_id, content, s3_key, created_at
"#;

fn to_domain<R, T>(rows: Vec<R>) -> Result<Vec<T>, AppError>
where
    T: TryFrom<R, Error = UnknownVariant>,
{
    rows.into_iter()
        .map(|row| T::try_from(row).map_err(AppError::from))
        .collect()
}

#[derive(Clone)]
pub struct PgInterviewRepository {
    pool: PgPool,
}

impl PgInterviewRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert_interview<'e, E>(executor: E, new: &NewInterview) -> Result<Interview, AppError>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let row: InterviewRow = sqlx::query_as(&format!(
            r#"
            WITH i AS (
                INSERT INTO interviews (resume_id, company_id, related_question, progress_status)
                VALUES ($1, $2, $3, $4)
                RETURNING *
            )
            SELECT {INTERVIEW_COLUMNS} FROM i LEFT JOIN resumes r ON r.id = i.resume_id
            "#
        ))
        .bind(new.resume_id)
        .bind(new.company_id)
        .bind(new.follow_up_enabled)
        .bind(new.status.as_str())
        .fetch_one(executor)
        .await?;
        Ok(Interview::try_from(row)?)
    }

    async fn insert_question<'e, E>(
        executor: E,
        interview_id: i64,
        draft: &QuestionDraft,
    ) -> Result<InterviewQuestion, AppError>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let row: QuestionRow = sqlx::query_as(INSERT_QUESTION)
            .bind(interview_id)
            .bind(draft.parent_id)
            .bind(&draft.content)
            .bind(&draft.s3_key)
            .bind(draft.difficulty.as_str())
            .fetch_one(executor)
            .await?;
        Ok(InterviewQuestion::try_from(row)?)
    }
}

#[async_trait]
impl InterviewRepository for PgInterviewRepository {
    async fn find_interview(&self, id: i64) -> Result<Option<Interview>, AppError> {
        let row: Option<InterviewRow> = sqlx::query_as(&format!(
            "SELECT {INTERVIEW_COLUMNS} FROM interviews i \
             LEFT JOIN resumes r ON r.id = i.resume_id WHERE i.id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Interview::try_from).transpose()?)
    }

    async fn find_interview_by_resume(
        &self,
        resume_id: i64,
    ) -> Result<Option<Interview>, AppError> {
        let row: Option<InterviewRow> = sqlx::query_as(&format!(
            "SELECT {INTERVIEW_COLUMNS} FROM interviews i \
             LEFT JOIN resumes r ON r.id = i.resume_id WHERE i.resume_id = $1"
        ))
        .bind(resume_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Interview::try_from).transpose()?)
    }

    async fn create_interview(&self, new: NewInterview) -> Result<Interview, AppError> {
        Self::insert_interview(&self.pool, &new).await
    }

    async fn create_interview_with_question(
        &self,
        new: NewInterview,
        question: QuestionDraft,
    ) -> Result<(Interview, InterviewQuestion), AppError> {
        let mut tx = self.pool.begin().await?;
        let interview = Self::insert_interview(&mut *tx, &new).await?;
        let question = Self::insert_question(&mut *tx, interview.id, &question).await?;
        tx.commit().await?;
        Ok((interview, question))
    }

    async fn update_status(
        &self,
        id: i64,
        from: &[ProgressStatus],
        to: ProgressStatus,
    ) -> Result<bool, AppError> {
        let from: Vec<String> = from.iter().map(|s| s.as_str().to_string()).collect();
        let result = sqlx::query(
            r#"
            UPDATE interviews
            SET progress_status = $1, updated_at = NOW()
            WHERE id = $2 AND progress_status = ANY($3)
            "#,
        )
        .bind(to.as_str())
        .bind(id)
        .bind(&from)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn interview_ids_for_job_posting(
        &self,
        job_posting_id: i64,
    ) -> Result<Vec<i64>, AppError> {
        let ids = sqlx::query_scalar(
            r#"
            SELECT i.id FROM interviews i
            JOIN resumes r ON r.id = i.resume_id
            WHERE r.job_posting_id = $1
            "#,
        )
        .bind(job_posting_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn interviews_for_user(&self, user_id: i64) -> Result<Vec<Interview>, AppError> {
        let rows: Vec<InterviewRow> = sqlx::query_as(&format!(
            "SELECT {INTERVIEW_COLUMNS} FROM interviews i \
             JOIN resumes r ON r.id = i.resume_id WHERE r.user_id = $1"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        to_domain(rows)
    }

    async fn find_question(&self, id: i64) -> Result<Option<InterviewQuestion>, AppError> {
        let row: Option<QuestionRow> = sqlx::query_as(&format!(
            "SELECT {QUESTION_COLUMNS} FROM interview_questions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(InterviewQuestion::try_from).transpose()?)
    }

    async fn questions_for_interview(
        &self,
        interview_id: i64,
    ) -> Result<Vec<InterviewQuestion>, AppError> {
        let rows: Vec<QuestionRow> = sqlx::query_as(&format!(
            "SELECT {QUESTION_COLUMNS} FROM interview_questions \
             WHERE interview_id = $1 ORDER BY created_at, id"
        ))
        .bind(interview_id)
        .fetch_all(&self.pool)
        .await?;
        to_domain(rows)
    }

    async fn insert_questions(
        &self,
        interview_id: i64,
        drafts: Vec<QuestionDraft>,
    ) -> Result<Vec<InterviewQuestion>, AppError> {
        let mut tx = self.pool.begin().await?;
        let mut questions = Vec::with_capacity(drafts.len());
        for draft in &drafts {
            questions.push(Self::insert_question(&mut *tx, interview_id, draft).await?);
        }
        tx.commit().await?;
        Ok(questions)
    }

    async fn delete_questions(&self, ids: &[i64]) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM interview_questions WHERE id = ANY($1)")
            .bind(ids)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn replies_for_interview(&self, interview_id: i64) -> Result<Vec<Reply>, AppError> {
        let replies = sqlx::query_as(
            r#"
            SELECT rp.id, rp.question_id, rp.content, rp.s3_key, rp.created_at
            FROM replies rp
            JOIN interview_questions q ON q.id = rp.question_id
            WHERE q.interview_id = $1
            "#,
        )
        .bind(interview_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(replies)
    }

    async fn upsert_reply(&self, reply: NewReply) -> Result<Reply, AppError> {
        let saved = sqlx::query_as(UPSERT_REPLY)
            .bind(reply.question_id)
            .bind(&reply.content)
            .bind(&reply.s3_key)
            .fetch_one(&self.pool)
            .await?;
        Ok(saved)
    }

    async fn save_reply_with_follow_up(
        &self,
        reply: NewReply,
        interview_id: i64,
        follow_up: QuestionDraft,
    ) -> Result<(Reply, InterviewQuestion), AppError> {
        let mut tx = self.pool.begin().await?;
        let saved: Reply = sqlx::query_as(UPSERT_REPLY)
            .bind(reply.question_id)
            .bind(&reply.content)
            .bind(&reply.s3_key)
            .fetch_one(&mut *tx)
            .await?;
        let question = Self::insert_question(&mut *tx, interview_id, &follow_up).await?;
        tx.commit().await?;
        Ok((saved, question))
    }
}
