//! Push notifications to the candidate's watch.
//!
//! The watch registers its push token under `fcm:user:{userId}`; the
//! interview flow asks it to start or stop heart-rate capture.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

use crate::errors::AppError;
use crate::storage::KeyValueStore;

pub mod fcm;

pub const ACTION_REQUEST_HEALTH_DATA: &str = "request_health_data";
pub const ACTION_STOP_HEALTH_DATA: &str = "stop_health_data";

#[derive(Debug, Error)]
pub enum PushError {
    /// The provider no longer accepts this token.
    #[error("push token is invalid or unregistered")]
    Unregistered,

    #[error("push delivery failed: {0}")]
    Delivery(String),
}

#[async_trait]
pub trait PushGateway: Send + Sync {
    async fn send(&self, token: &str, data: &BTreeMap<String, String>) -> Result<(), PushError>;
}

/// Used when no push provider is configured. Every send is logged and dropped.
pub struct LoggingPushGateway;

#[async_trait]
impl PushGateway for LoggingPushGateway {
    async fn send(&self, _token: &str, data: &BTreeMap<String, String>) -> Result<(), PushError> {
        info!(?data, "Push delivery disabled, dropping message");
        Ok(())
    }
}

pub fn token_key(user_id: i64) -> String {
    format!("fcm:user:{user_id}")
}

/// Sends health-data commands to a user's registered watch.
#[derive(Clone)]
pub struct HealthDataPush {
    gateway: Arc<dyn PushGateway>,
    kv: Arc<dyn KeyValueStore>,
}

impl HealthDataPush {
    pub fn new(gateway: Arc<dyn PushGateway>, kv: Arc<dyn KeyValueStore>) -> Self {
        Self { gateway, kv }
    }

    pub async fn save_token(&self, user_id: i64, token: &str) -> Result<(), AppError> {
        self.kv.set(&token_key(user_id), token).await
    }

    pub async fn delete_token(&self, user_id: i64) -> Result<(), AppError> {
        self.kv.delete(&token_key(user_id)).await?;
        Ok(())
    }

    pub async fn request_health_data(
        &self,
        user_id: i64,
        interview_id: i64,
        duration_sec: u64,
    ) -> Result<(), AppError> {
        let data = BTreeMap::from([
            ("action".to_string(), ACTION_REQUEST_HEALTH_DATA.to_string()),
            ("interviewId".to_string(), interview_id.to_string()),
            ("durationSec".to_string(), duration_sec.to_string()),
        ]);
        self.send_to_user(user_id, data).await
    }

    pub async fn stop_health_data(&self, user_id: i64, interview_id: i64) -> Result<(), AppError> {
        let data = BTreeMap::from([
            ("action".to_string(), ACTION_STOP_HEALTH_DATA.to_string()),
            ("interviewId".to_string(), interview_id.to_string()),
        ]);
        self.send_to_user(user_id, data).await
    }

    async fn send_to_user(
        &self,
        user_id: i64,
        data: BTreeMap<String, String>,
    ) -> Result<(), AppError> {
        let key = token_key(user_id);
        let Some(token) = self.kv.get(&key).await? else {
            return Err(AppError::Gone(format!("no push token for user {user_id}")));
        };

        match self.gateway.send(&token, &data).await {
            Ok(()) => {
                info!(user_id, action = data["action"].as_str(), "Push sent");
                Ok(())
            }
            Err(PushError::Unregistered) => {
                warn!(user_id, "Push token rejected, removing it");
                self.kv.delete(&key).await?;
                Err(AppError::Gone(format!(
                    "push token for user {user_id} is no longer valid"
                )))
            }
            Err(PushError::Delivery(msg)) => Err(AppError::Internal(anyhow::anyhow!(
                "push delivery to user {user_id} failed: {msg}"
            ))),
        }
    }
}
