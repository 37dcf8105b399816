use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::errors::AppError;
use crate::models::heartbeat::HeartbeatSample;

#[async_trait]
pub trait HeartbeatRepository: Send + Sync {
    async fn insert_batch(&self, samples: &[HeartbeatSample]) -> Result<u64, AppError>;

    /// Samples of one interview ordered by measurement time.
    async fn samples_for_interview(&self, interview_id: i64)
        -> Result<Vec<HeartbeatSample>, AppError>;
}

#[derive(Clone)]
pub struct PgHeartbeatRepository {
    pool: PgPool,
}

impl PgHeartbeatRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HeartbeatRepository for PgHeartbeatRepository {
    async fn insert_batch(&self, samples: &[HeartbeatSample]) -> Result<u64, AppError> {
        if samples.is_empty() {
            return Ok(0);
        }

        let mut interview_ids = Vec::with_capacity(samples.len());
        let mut devices = Vec::with_capacity(samples.len());
        let mut bpms = Vec::with_capacity(samples.len());
        let mut measured: Vec<DateTime<Utc>> = Vec::with_capacity(samples.len());
        let mut received: Vec<DateTime<Utc>> = Vec::with_capacity(samples.len());
        let mut statuses = Vec::with_capacity(samples.len());
        for s in samples {
            interview_ids.push(s.interview_id);
            devices.push(s.device_uuid.clone());
            bpms.push(s.bpm);
            measured.push(s.measured_at);
            received.push(s.received_at);
            statuses.push(s.status.clone());
        }

        let result = sqlx::query(
            r#"
            INSERT INTO heartbeats (interview_id, device_uuid, bpm, measured_at, received_at, status)
            SELECT * FROM UNNEST($1::bigint[], $2::text[], $3::int[], $4::timestamptz[], $5::timestamptz[], $6::text[])
            "#,
        )
        .bind(&interview_ids)
        .bind(&devices)
        .bind(&bpms)
        .bind(&measured)
        .bind(&received)
        .bind(&statuses)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn samples_for_interview(
        &self,
        interview_id: i64,
    ) -> Result<Vec<HeartbeatSample>, AppError> {
        let samples = sqlx::query_as(
            r#"
            SELECT interview_id, device_uuid, bpm, measured_at, received_at, status
            FROM heartbeats
            WHERE interview_id = $1
            ORDER BY measured_at
            "#,
        )
        .bind(interview_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(samples)
    }
}
