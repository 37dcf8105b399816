use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::device::repository::DeviceRepository;
use crate::device::signature::DeviceAuth;
use crate::errors::AppError;
use crate::models::watch::Watch;
use crate::push::HealthDataPush;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterWatch {
    pub uuid: String,
    pub model_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenCommit {
    pub uuid: String,
    pub token: String,
}

/// `secret` is only present on the commit that provisioned it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenCommitted {
    pub secret: Option<String>,
}

#[derive(Clone)]
pub struct DeviceService {
    devices: Arc<dyn DeviceRepository>,
    auth: DeviceAuth,
    push: HealthDataPush,
}

impl DeviceService {
    pub fn new(devices: Arc<dyn DeviceRepository>, auth: DeviceAuth, push: HealthDataPush) -> Self {
        Self {
            devices,
            auth,
            push,
        }
    }

    pub async fn register(&self, user_id: i64, request: RegisterWatch) -> Result<Watch, AppError> {
        let uuid = request.uuid.trim();
        let model_name = request.model_name.trim();
        if uuid.is_empty() || model_name.is_empty() {
            return Err(AppError::Validation("uuid and modelName are required".into()));
        }
        if self.devices.find_by_user(user_id).await?.is_some() {
            warn!(user_id, "Watch already registered");
            return Err(AppError::Conflict("a device is already registered".into()));
        }

        let watch = self.devices.register(user_id, uuid, model_name).await?;
        info!(user_id, watch_id = watch.id, "Watch registered");
        Ok(watch)
    }

    pub async fn my_watch(&self, user_id: i64) -> Result<Option<Watch>, AppError> {
        self.devices.find_by_user(user_id).await
    }

    pub async fn unregister(&self, user_id: i64) -> Result<(), AppError> {
        if !self.devices.delete_for_user(user_id).await? {
            return Err(AppError::NotFound("no registered device".into()));
        }
        if let Err(err) = self.push.delete_token(user_id).await {
            warn!(user_id, error = %err, "Could not remove push token of deleted watch");
        }
        info!(user_id, "Watch unregistered");
        Ok(())
    }

    /// Maps the watch's push token to its owner and bootstraps the signing
    /// secret on first contact.
    pub async fn commit_token(&self, request: TokenCommit) -> Result<TokenCommitted, AppError> {
        let uuid = request.uuid.trim();
        let token = request.token.trim();
        if uuid.is_empty() || token.is_empty() {
            return Err(AppError::Validation("uuid and token are required".into()));
        }

        let watch = self
            .devices
            .find_by_uuid(uuid)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("device {uuid} is not registered")))?;

        self.push.save_token(watch.user_id, token).await?;
        let secret = self.auth.provision_secret(uuid).await?;
        info!(
            user_id = watch.user_id,
            provisioned = secret.is_some(),
            "Push token committed"
        );
        Ok(TokenCommitted { secret })
    }
}
