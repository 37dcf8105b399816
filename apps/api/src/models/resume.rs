use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Resume {
    pub id: i64,
    pub user_id: i64,
    pub job_posting_id: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct JobPosting {
    pub id: i64,
    pub company_id: Option<i64>,
    /// Object key of the posting's preference document, fed to the AI as the JD.
    pub s3_preference_file_key: Option<String>,
    pub end_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl JobPosting {
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        self.end_at.map_or(true, |end| end > now)
    }
}

/// A resume question with its character ceiling.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ResumeQuestion {
    pub id: i64,
    pub content: String,
    pub limit_cnt: i32,
}

/// A submitted answer joined with its question text, in question order.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct ResumeAnswer {
    pub question_id: i64,
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerInput {
    pub question_id: i64,
    pub content: String,
}
