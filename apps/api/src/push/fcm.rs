use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::FcmConfig;
use crate::push::{PushError, PushGateway};

const FCM_BASE_URL: &str = "https://fcm.googleapis.com";

#[derive(Serialize)]
struct SendRequest<'a> {
    message: Message<'a>,
}

#[derive(Serialize)]
struct Message<'a> {
    token: &'a str,
    data: &'a BTreeMap<String, String>,
    android: AndroidConfig,
}

#[derive(Serialize)]
struct AndroidConfig {
    priority: &'static str,
}

/// Firebase Cloud Messaging HTTP v1 sender.
#[derive(Clone)]
pub struct FcmGateway {
    client: Client,
    send_url: String,
    access_token: String,
}

impl FcmGateway {
    pub fn new(config: &FcmConfig) -> anyhow::Result<Self> {
        Self::with_base_url(config, FCM_BASE_URL)
    }

    pub fn with_base_url(config: &FcmConfig, base_url: &str) -> anyhow::Result<Self> {
        Ok(Self {
            client: Client::builder()
                .connect_timeout(Duration::from_secs(10))
                .timeout(Duration::from_secs(30))
                .build()?,
            send_url: format!(
                "{}/v1/projects/{}/messages:send",
                base_url.trim_end_matches('/'),
                config.project_id
            ),
            access_token: config.access_token.clone(),
        })
    }
}

/// FCM reports dead tokens as 404 `UNREGISTERED` or 400 `INVALID_ARGUMENT`.
fn is_dead_token(status: StatusCode, body: &str) -> bool {
    (status == StatusCode::NOT_FOUND && body.contains("UNREGISTERED"))
        || (status == StatusCode::BAD_REQUEST && body.contains("INVALID_ARGUMENT"))
}

#[async_trait]
impl PushGateway for FcmGateway {
    async fn send(&self, token: &str, data: &BTreeMap<String, String>) -> Result<(), PushError> {
        let request = SendRequest {
            message: Message {
                token,
                data,
                android: AndroidConfig { priority: "high" },
            },
        };

        let response = self
            .client
            .post(&self.send_url)
            .bearer_auth(&self.access_token)
            .json(&request)
            .send()
            .await
            .map_err(|e| PushError::Delivery(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            debug!("FCM accepted message");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        if is_dead_token(status, &body) {
            return Err(PushError::Unregistered);
        }
        warn!(status = status.as_u16(), body = %body, "FCM send failed");
        Err(PushError::Delivery(format!("status {status}")))
    }
}
