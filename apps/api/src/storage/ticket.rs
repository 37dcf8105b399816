use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::storage::{KeyValueStore, ObjectStore};

/// Lifetime of both the ticket and its presigned URL.
pub const TICKET_TTL: Duration = Duration::from_secs(900);
const TICKET_PREFIX: &str = "s3_ticket:";
const TICKET_ISSUED: &str = "ISSUED";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadTicket {
    pub presigned_url: String,
    pub object_key: String,
    pub ttl_seconds: u64,
}

/// Issues single-use upload tickets and presigned URLs.
///
/// A ticket is validated before work starts and consumed only after the
/// work's unit of persistence has succeeded, so a failed request leaves the
/// ticket usable for a retry.
#[derive(Clone)]
pub struct Ticketing {
    objects: Arc<dyn ObjectStore>,
    kv: Arc<dyn KeyValueStore>,
}

impl Ticketing {
    pub fn new(objects: Arc<dyn ObjectStore>, kv: Arc<dyn KeyValueStore>) -> Self {
        Self { objects, kv }
    }

    pub async fn issue_upload_ticket(
        &self,
        directory: &str,
        file_name: &str,
    ) -> Result<UploadTicket, AppError> {
        let file_name = file_name.trim();
        if file_name.is_empty() || file_name.contains('/') {
            return Err(AppError::Validation(format!(
                "invalid file name '{file_name}'"
            )));
        }

        let object_key = format!(
            "{}/{}_{}",
            directory.trim_end_matches('/'),
            Uuid::new_v4(),
            file_name
        );
        let presigned_url = self.objects.presign_upload(&object_key, TICKET_TTL).await?;
        self.kv
            .set_with_ttl(&ticket_key(&object_key), TICKET_ISSUED, TICKET_TTL)
            .await?;

        info!(object_key = %object_key, "Issued upload ticket");
        Ok(UploadTicket {
            presigned_url,
            object_key,
            ttl_seconds: TICKET_TTL.as_secs(),
        })
    }

    /// Checks the ticket without consuming it.
    pub async fn validate_ticket(&self, object_key: &str) -> Result<(), AppError> {
        match self.kv.get(&ticket_key(object_key)).await? {
            Some(_) => Ok(()),
            None => {
                warn!(object_key = %object_key, "Upload ticket missing or expired");
                Err(AppError::InvalidUploadTicket)
            }
        }
    }

    pub async fn consume_ticket(&self, object_key: &str) -> Result<(), AppError> {
        if self.kv.delete(&ticket_key(object_key)).await? {
            debug!(object_key = %object_key, "Upload ticket consumed");
        } else {
            warn!(object_key = %object_key, "Upload ticket already gone at consumption");
        }
        Ok(())
    }

    pub async fn download_url(&self, object_key: &str) -> Result<String, AppError> {
        self.objects.presign_download(object_key, TICKET_TTL).await
    }

    pub async fn object_exists(&self, object_key: &str) -> Result<bool, AppError> {
        self.objects.head_object(object_key).await
    }
}

fn ticket_key(object_key: &str) -> String {
    format!("{TICKET_PREFIX}{object_key}")
}
