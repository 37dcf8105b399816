use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HeartbeatStatus {
    Low,
    Normal,
    High,
}

impl HeartbeatStatus {
    pub fn from_bpm(bpm: i32) -> Self {
        if bpm < 60 {
            HeartbeatStatus::Low
        } else if bpm > 100 {
            HeartbeatStatus::High
        } else {
            HeartbeatStatus::Normal
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HeartbeatStatus::Low => "LOW",
            HeartbeatStatus::Normal => "NORMAL",
            HeartbeatStatus::High => "HIGH",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct HeartbeatSample {
    pub interview_id: i64,
    pub device_uuid: String,
    pub bpm: i32,
    pub measured_at: DateTime<Utc>,
    pub received_at: DateTime<Utc>,
    pub status: String,
}

impl HeartbeatSample {
    pub fn new(
        interview_id: i64,
        device_uuid: &str,
        bpm: i32,
        measured_at: DateTime<Utc>,
        received_at: DateTime<Utc>,
    ) -> Self {
        Self {
            interview_id,
            device_uuid: device_uuid.to_string(),
            bpm,
            measured_at,
            received_at,
            status: HeartbeatStatus::from_bpm(bpm).as_str().to_string(),
        }
    }
}
