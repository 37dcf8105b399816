use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{info, warn};

use crate::errors::AppError;
use crate::heartbeat::mapper::{map_question_heartbeats, QuestionHeartbeat};
use crate::heartbeat::repository::HeartbeatRepository;
use crate::interview::repository::InterviewRepository;
use crate::models::heartbeat::HeartbeatSample;
use crate::models::interview::Interview;

pub const MIN_BPM: i32 = 30;
pub const MAX_BPM: i32 = 250;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatBatch {
    pub interview_id: i64,
    pub device_uuid: String,
    pub data_points: Vec<HeartbeatPoint>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatPoint {
    pub bpm: i32,
    pub measured_at: DateTime<Utc>,
}

impl HeartbeatBatch {
    fn validate(&self) -> Result<(), AppError> {
        if self.interview_id <= 0 {
            return Err(AppError::Validation("interviewId must be positive".into()));
        }
        if self.device_uuid.trim().is_empty() {
            return Err(AppError::Validation("deviceUuid is required".into()));
        }
        if self.data_points.is_empty() {
            return Err(AppError::Validation(
                "at least one heartbeat sample is required".into(),
            ));
        }
        if let Some(point) = self
            .data_points
            .iter()
            .find(|p| !(MIN_BPM..=MAX_BPM).contains(&p.bpm))
        {
            return Err(AppError::Validation(format!(
                "bpm {} is outside {MIN_BPM}..={MAX_BPM}",
                point.bpm
            )));
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct HeartbeatService {
    heartbeats: Arc<dyn HeartbeatRepository>,
    interviews: Arc<dyn InterviewRepository>,
}

impl HeartbeatService {
    pub fn new(
        heartbeats: Arc<dyn HeartbeatRepository>,
        interviews: Arc<dyn InterviewRepository>,
    ) -> Self {
        Self {
            heartbeats,
            interviews,
        }
    }

    /// Stores a watch's whole-session batch in one statement.
    pub async fn ingest(&self, batch: HeartbeatBatch) -> Result<u64, AppError> {
        batch.validate()?;
        self.load_interview(batch.interview_id).await?;

        let received_at = Utc::now();
        let samples: Vec<HeartbeatSample> = batch
            .data_points
            .iter()
            .map(|p| {
                HeartbeatSample::new(
                    batch.interview_id,
                    &batch.device_uuid,
                    p.bpm,
                    p.measured_at,
                    received_at,
                )
            })
            .collect();

        let stored = self.heartbeats.insert_batch(&samples).await?;
        info!(
            interview_id = batch.interview_id,
            samples = stored,
            "Stored heartbeat batch"
        );
        Ok(stored)
    }

    pub async fn samples(&self, interview_id: i64) -> Result<Vec<HeartbeatSample>, AppError> {
        self.heartbeats.samples_for_interview(interview_id).await
    }

    /// Average bpm per root question of a known interview.
    pub async fn question_averages(
        &self,
        interview: &Interview,
    ) -> Result<Vec<QuestionHeartbeat>, AppError> {
        let questions = self.interviews.questions_for_interview(interview.id).await?;
        let replies = self.interviews.replies_for_interview(interview.id).await?;
        let samples = self.samples(interview.id).await?;

        let mapped = map_question_heartbeats(&questions, &replies, &samples);
        info!(
            interview_id = interview.id,
            entries = mapped.len(),
            "Mapped heartbeats onto questions"
        );
        Ok(mapped)
    }

    /// Same as [`Self::question_averages`], loading and authorizing the interview.
    pub async fn question_averages_for(
        &self,
        user_id: i64,
        interview_id: i64,
    ) -> Result<Vec<QuestionHeartbeat>, AppError> {
        let interview = self.load_interview(interview_id).await?;
        interview.authorize(user_id)?;
        self.question_averages(&interview).await
    }

    async fn load_interview(&self, interview_id: i64) -> Result<Interview, AppError> {
        self.interviews
            .find_interview(interview_id)
            .await?
            .ok_or_else(|| {
                warn!(interview_id, "Heartbeat request for unknown interview");
                AppError::NotFound(format!("interview {interview_id} not found"))
            })
    }
}
