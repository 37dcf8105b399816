use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::UnknownVariant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportStatus {
    Creating,
    Completed,
    Failed,
}

impl ReportStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ReportStatus::Creating => "CREATING",
            ReportStatus::Completed => "COMPLETED",
            ReportStatus::Failed => "FAILED",
        }
    }
}

impl FromStr for ReportStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREATING" => Ok(ReportStatus::Creating),
            "COMPLETED" => Ok(ReportStatus::Completed),
            "FAILED" => Ok(ReportStatus::Failed),
            other => Err(UnknownVariant {
                kind: "report status",
                value: other.to_string(),
            }),
        }
    }
}

/// Soft-delete state. The timestamp only exists once a report is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Deletion {
    Active,
    Deleted { at: DateTime<Utc> },
}

impl Deletion {
    pub fn is_deleted(&self) -> bool {
        matches!(self, Deletion::Deleted { .. })
    }

    fn from_column(deleted_at: Option<DateTime<Utc>>) -> Self {
        match deleted_at {
            Some(at) => Deletion::Deleted { at },
            None => Deletion::Active,
        }
    }
}

/// The prompt side of a Q&A item: either a root question or a follow-up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QnaPrompt {
    Question(String),
    RelatedQuestion(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QnaItem {
    #[serde(flatten)]
    pub prompt: QnaPrompt,
    pub answer: String,
    /// Per-sentence sentiment labels, filled by the report update.
    #[serde(default)]
    pub labels: Vec<i32>,
}

#[derive(Debug, Clone, FromRow)]
pub struct ReportRow {
    pub id: Uuid,
    pub interview_id: i64,
    pub status: String,
    pub scores: Json<BTreeMap<String, i32>>,
    pub narrative: String,
    pub qna_list: Json<Vec<QnaItem>>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub id: Uuid,
    pub interview_id: i64,
    pub status: ReportStatus,
    pub scores: BTreeMap<String, i32>,
    pub narrative: String,
    pub qna_list: Vec<QnaItem>,
    pub deletion: Deletion,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<ReportRow> for Report {
    type Error = UnknownVariant;

    fn try_from(row: ReportRow) -> Result<Self, Self::Error> {
        Ok(Report {
            id: row.id,
            interview_id: row.interview_id,
            status: row.status.parse()?,
            scores: row.scores.0,
            narrative: row.narrative,
            qna_list: row.qna_list.0,
            deletion: Deletion::from_column(row.deleted_at),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ReportCompletion {
    pub scores: BTreeMap<String, i32>,
    pub narrative: String,
    pub qna_list: Vec<QnaItem>,
}
