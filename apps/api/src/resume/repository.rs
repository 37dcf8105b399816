use async_trait::async_trait;
use sqlx::PgPool;

use crate::errors::AppError;
use crate::models::resume::{AnswerInput, JobPosting, Resume, ResumeAnswer, ResumeQuestion};

/// Read/write access to resumes, their answers and the owning job posting.
/// Resume CRUD lives elsewhere; this covers what the interview workflow uses.
#[async_trait]
pub trait ResumeRepository: Send + Sync {
    async fn find_resume(&self, id: i64) -> Result<Option<Resume>, AppError>;

    async fn create_resume(&self, user_id: i64, job_posting_id: i64) -> Result<Resume, AppError>;

    async fn find_job_posting(&self, id: i64) -> Result<Option<JobPosting>, AppError>;

    /// Newest posting of the company that carries a preference document.
    async fn latest_job_posting_with_preference(
        &self,
        company_id: i64,
    ) -> Result<Option<JobPosting>, AppError>;

    async fn resume_questions(
        &self,
        job_posting_id: i64,
        ids: &[i64],
    ) -> Result<Vec<ResumeQuestion>, AppError>;

    /// Inserts every answer or none.
    async fn insert_answers(&self, resume_id: i64, answers: &[AnswerInput])
        -> Result<(), AppError>;

    /// Answers joined with their question text, in question order.
    async fn answers_for_resume(&self, resume_id: i64) -> Result<Vec<ResumeAnswer>, AppError>;
}

#[derive(Clone)]
pub struct PgResumeRepository {
    pool: PgPool,
}

impl PgResumeRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ResumeRepository for PgResumeRepository {
    async fn find_resume(&self, id: i64) -> Result<Option<Resume>, AppError> {
        let resume = sqlx::query_as(
            "SELECT id, user_id, job_posting_id, created_at FROM resumes WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(resume)
    }

    async fn create_resume(&self, user_id: i64, job_posting_id: i64) -> Result<Resume, AppError> {
        let resume = sqlx::query_as(
            r#"
            INSERT INTO resumes (user_id, job_posting_id)
            VALUES ($1, $2)
            RETURNING id, user_id, job_posting_id, created_at
            "#,
        )
        .bind(user_id)
        .bind(job_posting_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(resume)
    }

    async fn find_job_posting(&self, id: i64) -> Result<Option<JobPosting>, AppError> {
        let posting = sqlx::query_as(
            r#"
            SELECT id, company_id, s3_preference_file_key, end_at, created_at
            FROM job_postings WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(posting)
    }

    async fn latest_job_posting_with_preference(
        &self,
        company_id: i64,
    ) -> Result<Option<JobPosting>, AppError> {
        let posting = sqlx::query_as(
            r#"
            SELECT id, company_id, s3_preference_file_key, end_at, created_at
            FROM job_postings
            WHERE company_id = $1 AND s3_preference_file_key IS NOT NULL
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(company_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(posting)
    }

    async fn resume_questions(
        &self,
        job_posting_id: i64,
        ids: &[i64],
    ) -> Result<Vec<ResumeQuestion>, AppError> {
        let questions = sqlx::query_as(
            r#"
            SELECT id, content, limit_cnt FROM resume_questions
            WHERE job_posting_id = $1 AND id = ANY($2)
            "#,
        )
        .bind(job_posting_id)
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(questions)
    }

    async fn insert_answers(
        &self,
        resume_id: i64,
        answers: &[AnswerInput],
    ) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;
        for answer in answers {
            sqlx::query(
                "INSERT INTO answers (resume_id, question_id, content) VALUES ($1, $2, $3)",
            )
            .bind(resume_id)
            .bind(answer.question_id)
            .bind(&answer.content)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn answers_for_resume(&self, resume_id: i64) -> Result<Vec<ResumeAnswer>, AppError> {
        let answers = sqlx::query_as(
            r#"
            SELECT a.question_id, q.content AS question, a.content AS answer
            FROM answers a
            JOIN resume_questions q ON q.id = a.question_id
            WHERE a.resume_id = $1
            ORDER BY q.id
            "#,
        )
        .bind(resume_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(answers)
    }
}
