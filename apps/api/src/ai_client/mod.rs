/// AI service client: the single point of entry for every call to the
/// inference service (OCR, interview start/answer/end, speech-to-text).
///
/// Every call is a JSON POST with the same policy: 10s connect timeout,
/// 120s response timeout, 4xx terminal, 5xx and network failures retried
/// with exponential backoff. There is no fallback response; callers always
/// observe the real failure.
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, warn};

pub mod dto;

use dto::{
    EndInterviewInput, EndInterviewResponse, InterviewInput, InterviewResponse, OcrInput,
    OcrResponse, SttRequest, SttResponse,
};

const OCR_PATH: &str = "/api/v1/ocr";
const START_PATH: &str = "/api/v1/interview/start";
const ANSWER_PATH: &str = "/api/v1/interview/answer";
const END_PATH: &str = "/api/v1/interview/end";
const STT_PATH: &str = "/api/v1/stt";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
pub const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum AiError {
    #[error("AI service rejected the request (status {status}): {body}")]
    ClientError { status: u16, body: String },

    #[error("AI service failed (status {status}): {body}")]
    Upstream { status: u16, body: String },

    #[error("AI service unreachable: {0}")]
    Connection(String),

    #[error("AI service timed out")]
    Timeout,

    #[error("AI response could not be decoded: {0}")]
    Decode(String),

    #[error("AI response is missing '{0}'")]
    MissingField(&'static str),

    #[error("AI service reported status '{status}'")]
    Rejected { status: String },
}

impl AiError {
    /// Server-side and network failures are retried; everything else is final.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AiError::Upstream { .. } | AiError::Connection(_) | AiError::Timeout
        )
    }

    fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AiError::Timeout
        } else if err.is_decode() {
            AiError::Decode(err.to_string())
        } else {
            AiError::Connection(err.to_string())
        }
    }
}

/// The inference operations the workflow depends on.
/// Carried in services as `Arc<dyn AiService>`.
#[async_trait]
pub trait AiService: Send + Sync {
    async fn ocr(&self, document_url: &str) -> Result<String, AiError>;

    async fn start_interview(&self, input: &InterviewInput)
        -> Result<InterviewResponse, AiError>;

    async fn answer_interview(
        &self,
        input: &InterviewInput,
    ) -> Result<InterviewResponse, AiError>;

    async fn end_interview(
        &self,
        input: &EndInterviewInput,
    ) -> Result<EndInterviewResponse, AiError>;

    /// Transcribes the audio behind a download URL.
    async fn transcribe(&self, audio_url: &str) -> Result<String, AiError>;
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            initial_backoff: INITIAL_BACKOFF,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based): 1s, 2s, 4s, ...
    pub fn backoff(&self, retry: u32) -> Duration {
        self.initial_backoff * (1u32 << retry.saturating_sub(1).min(16))
    }
}

#[derive(Clone)]
pub struct AiClient {
    client: Client,
    base_url: String,
    retry: RetryPolicy,
}

impl AiClient {
    pub fn new(base_url: impl Into<String>) -> anyhow::Result<Self> {
        Self::with_settings(
            base_url,
            CONNECT_TIMEOUT,
            REQUEST_TIMEOUT,
            RetryPolicy::default(),
        )
    }

    pub fn with_settings(
        base_url: impl Into<String>,
        connect_timeout: Duration,
        request_timeout: Duration,
        retry: RetryPolicy,
    ) -> anyhow::Result<Self> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            retry,
        })
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, AiError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        match serde_json::to_string(body) {
            Ok(json) => info!(path, body = %json, "AI request"),
            Err(e) => warn!(path, "AI request body could not be serialized for logging: {e}"),
        }

        let mut retries = 0;
        loop {
            match self.send_once(&url, body).await {
                Ok(text) => {
                    debug!(path, body = %text, "AI response");
                    return serde_json::from_str(&text).map_err(|e| AiError::Decode(e.to_string()));
                }
                Err(err) if err.is_retryable() && retries < self.retry.max_retries => {
                    retries += 1;
                    let delay = self.retry.backoff(retries);
                    warn!(
                        path,
                        retry = retries,
                        "AI call failed ({err}), retrying after {}ms...",
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    error!(path, attempts = retries + 1, "AI call failed: {err}");
                    return Err(err);
                }
            }
        }
    }

    async fn send_once<B>(&self, url: &str, body: &B) -> Result<String, AiError>
    where
        B: Serialize + ?Sized + Sync,
    {
        let response = self
            .client
            .post(url)
            .header(header::ACCEPT, "application/json")
            .json(body)
            .send()
            .await
            .map_err(AiError::from_transport)?;

        let status = response.status();
        let text = response.text().await.map_err(AiError::from_transport)?;

        if status.is_client_error() {
            warn!(%url, status = status.as_u16(), body = %text, "AI service returned 4xx");
            return Err(AiError::ClientError {
                status: status.as_u16(),
                body: text,
            });
        }
        if status.is_server_error() {
            warn!(%url, status = status.as_u16(), body = %text, "AI service returned 5xx");
            return Err(AiError::Upstream {
                status: status.as_u16(),
                body: text,
            });
        }
        Ok(text)
    }
}

#[async_trait]
impl AiService for AiClient {
    async fn ocr(&self, document_url: &str) -> Result<String, AiError> {
        let input = OcrInput {
            pre_signed_url: document_url.to_string(),
        };
        let response: OcrResponse = self.post_json(OCR_PATH, &input).await?;
        debug!(status = ?response.status, "OCR finished");
        response.text.ok_or(AiError::MissingField("text"))
    }

    async fn start_interview(
        &self,
        input: &InterviewInput,
    ) -> Result<InterviewResponse, AiError> {
        self.post_json(START_PATH, input).await
    }

    async fn answer_interview(
        &self,
        input: &InterviewInput,
    ) -> Result<InterviewResponse, AiError> {
        self.post_json(ANSWER_PATH, input).await
    }

    async fn end_interview(
        &self,
        input: &EndInterviewInput,
    ) -> Result<EndInterviewResponse, AiError> {
        self.post_json(END_PATH, input).await
    }

    async fn transcribe(&self, audio_url: &str) -> Result<String, AiError> {
        let request = SttRequest {
            stt_url: audio_url.to_string(),
        };
        let response: SttResponse = self.post_json(STT_PATH, &request).await?;

        let text = response
            .converted_text
            .ok_or(AiError::MissingField("converted_text"))?;
        match response.status.as_deref() {
            Some("success") => {
                info!("Transcription finished ({} chars)", text.chars().count());
                Ok(text)
            }
            other => Err(AiError::Rejected {
                status: other.unwrap_or_default().to_string(),
            }),
        }
    }
}
