use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::Client as S3Client;
use tracing::{debug, warn};

use crate::errors::AppError;
use crate::storage::ObjectStore;

/// S3 / MinIO backed object store for interview audio and documents.
#[derive(Clone)]
pub struct S3ObjectStore {
    client: S3Client,
    bucket: String,
}

impl S3ObjectStore {
    pub fn new(client: S3Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    fn presigning(ttl: Duration) -> Result<PresigningConfig, AppError> {
        PresigningConfig::expires_in(ttl)
            .map_err(|e| AppError::Storage(format!("invalid presign ttl: {e}")))
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn presign_upload(&self, key: &str, ttl: Duration) -> Result<String, AppError> {
        let request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(Self::presigning(ttl)?)
            .await
            .map_err(|e| {
                AppError::Storage(format!("presign upload {key}: {}", DisplayErrorContext(&e)))
            })?;

        debug!("Presigned upload URL for s3://{}/{}", self.bucket, key);
        Ok(request.uri().to_string())
    }

    async fn presign_download(&self, key: &str, ttl: Duration) -> Result<String, AppError> {
        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(Self::presigning(ttl)?)
            .await
            .map_err(|e| {
                AppError::Storage(format!(
                    "presign download {key}: {}",
                    DisplayErrorContext(&e)
                ))
            })?;

        Ok(request.uri().to_string())
    }

    async fn head_object(&self, key: &str) -> Result<bool, AppError> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(err) => {
                if err
                    .as_service_error()
                    .map(|e| e.is_not_found())
                    .unwrap_or(false)
                {
                    return Ok(false);
                }
                warn!("head_object failed for s3://{}/{}", self.bucket, key);
                Err(AppError::Storage(format!(
                    "head object {key}: {}",
                    DisplayErrorContext(&err)
                )))
            }
        }
    }
}
