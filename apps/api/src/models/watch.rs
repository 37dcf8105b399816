use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

/// A candidate's registered smartwatch.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct Watch {
    pub id: i64,
    pub user_id: i64,
    pub uuid: String,
    pub model_name: String,
    pub created_at: DateTime<Utc>,
}
