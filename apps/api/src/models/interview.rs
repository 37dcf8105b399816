use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::errors::AppError;
use crate::models::UnknownVariant;

/// Lifecycle stage of an interview session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProgressStatus {
    Creating,
    NotStarted,
    InProgress,
    Completed,
    Reported,
    Failed,
}

impl ProgressStatus {
    pub const ALL: [ProgressStatus; 6] = [
        ProgressStatus::Creating,
        ProgressStatus::NotStarted,
        ProgressStatus::InProgress,
        ProgressStatus::Completed,
        ProgressStatus::Reported,
        ProgressStatus::Failed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ProgressStatus::Creating => "CREATING",
            ProgressStatus::NotStarted => "NOT_STARTED",
            ProgressStatus::InProgress => "IN_PROGRESS",
            ProgressStatus::Completed => "COMPLETED",
            ProgressStatus::Reported => "REPORTED",
            ProgressStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for ProgressStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProgressStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProgressStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownVariant {
                kind: "progress status",
                value: s.to_string(),
            })
    }
}

/// Interviewer persona for a generated question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Difficulty {
    Strict,
    Lax,
}

impl Difficulty {
    /// Speaker code 0 is the strict interviewer; every other code is lax.
    pub fn from_talker(code: Option<i32>) -> Self {
        match code {
            Some(0) => Difficulty::Strict,
            _ => Difficulty::Lax,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Strict => "STRICT",
            Difficulty::Lax => "LAX",
        }
    }
}

impl FromStr for Difficulty {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "STRICT" => Ok(Difficulty::Strict),
            "LAX" => Ok(Difficulty::Lax),
            other => Err(UnknownVariant {
                kind: "difficulty",
                value: other.to_string(),
            }),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Interview
// ────────────────────────────────────────────────────────────────────────────

/// Interview row joined with the owning resume's user and job posting.
#[derive(Debug, Clone, FromRow)]
pub struct InterviewRow {
    pub id: i64,
    pub resume_id: Option<i64>,
    pub company_id: i64,
    pub related_question: bool,
    pub progress_status: String,
    pub owner_id: Option<i64>,
    pub job_posting_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Interview {
    pub id: i64,
    /// `None` for a demo interview.
    pub resume_id: Option<i64>,
    pub company_id: i64,
    pub follow_up_enabled: bool,
    pub status: ProgressStatus,
    pub owner_id: Option<i64>,
    pub job_posting_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl Interview {
    pub fn is_demo(&self) -> bool {
        self.resume_id.is_none()
    }

    /// Demo interviews have no owner and are open to any caller.
    pub fn authorize(&self, user_id: i64) -> Result<(), AppError> {
        if self.is_demo() || self.owner_id == Some(user_id) {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!(
                "interview {} does not belong to the caller",
                self.id
            )))
        }
    }
}

impl TryFrom<InterviewRow> for Interview {
    type Error = UnknownVariant;

    fn try_from(row: InterviewRow) -> Result<Self, Self::Error> {
        Ok(Interview {
            id: row.id,
            resume_id: row.resume_id,
            company_id: row.company_id,
            follow_up_enabled: row.related_question,
            status: row.progress_status.parse()?,
            owner_id: row.owner_id,
            job_posting_id: row.job_posting_id,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewInterview {
    pub resume_id: Option<i64>,
    pub company_id: i64,
    pub follow_up_enabled: bool,
    pub status: ProgressStatus,
}

// ────────────────────────────────────────────────────────────────────────────
// Questions and replies
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, FromRow)]
pub struct QuestionRow {
    pub id: i64,
    pub interview_id: i64,
    pub parent_id: Option<i64>,
    pub content: String,
    pub s3_key: String,
    pub difficulty: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InterviewQuestion {
    pub id: i64,
    pub interview_id: i64,
    /// `None` for a root question.
    pub parent_id: Option<i64>,
    pub content: String,
    pub s3_key: String,
    pub difficulty: Difficulty,
    pub created_at: DateTime<Utc>,
}

impl InterviewQuestion {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

impl TryFrom<QuestionRow> for InterviewQuestion {
    type Error = UnknownVariant;

    fn try_from(row: QuestionRow) -> Result<Self, Self::Error> {
        Ok(InterviewQuestion {
            id: row.id,
            interview_id: row.interview_id,
            parent_id: row.parent_id,
            content: row.content,
            s3_key: row.s3_key,
            difficulty: row.difficulty.parse()?,
            created_at: row.created_at,
        })
    }
}

/// A question about to be inserted under an interview.
#[derive(Debug, Clone)]
pub struct QuestionDraft {
    pub parent_id: Option<i64>,
    pub content: String,
    pub s3_key: String,
    pub difficulty: Difficulty,
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct Reply {
    pub id: i64,
    pub question_id: i64,
    pub content: String,
    pub s3_key: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewReply {
    pub question_id: i64,
    pub content: String,
    pub s3_key: String,
}
