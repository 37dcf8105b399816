//! Text extraction from uploaded documents.

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::ai_client::AiService;
use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::events::{DomainEvent, EventBus, Outbox};
use crate::state::AppState;
use crate::storage::{Ticketing, UploadTicket};

pub const DOCUMENT_DIR: &str = "documents";

#[derive(Debug, Clone, Deserialize)]
pub struct DocumentUploadRequest {
    pub file_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OcrRequest {
    pub s3_key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OcrResult {
    pub text: String,
}

#[derive(Clone)]
pub struct DocumentService {
    tickets: Ticketing,
    ai: Arc<dyn AiService>,
    bus: EventBus,
}

impl DocumentService {
    pub fn new(tickets: Ticketing, ai: Arc<dyn AiService>, bus: EventBus) -> Self {
        Self { tickets, ai, bus }
    }

    pub async fn upload_url(&self, file_name: &str) -> Result<UploadTicket, AppError> {
        self.tickets.issue_upload_ticket(DOCUMENT_DIR, file_name).await
    }

    pub async fn extract_text(&self, s3_key: &str) -> Result<OcrResult, AppError> {
        if s3_key.trim().is_empty() {
            return Err(AppError::Validation("s3_key is required".into()));
        }
        self.tickets.validate_ticket(s3_key).await?;

        let url = self.tickets.download_url(s3_key).await?;
        let text = self.ai.ocr(&url).await?;

        let mut outbox = Outbox::new();
        outbox.push(DomainEvent::UploadCommitted {
            object_key: s3_key.to_string(),
        });
        outbox.release(&self.bus);

        info!(object_key = %s3_key, chars = text.chars().count(), "Document text extracted");
        Ok(OcrResult { text })
    }
}

/// POST /api/documents/upload-url
pub async fn handle_document_upload_url(
    State(state): State<AppState>,
    AuthUser(_): AuthUser,
    Json(req): Json<DocumentUploadRequest>,
) -> Result<Json<UploadTicket>, AppError> {
    Ok(Json(state.documents.upload_url(&req.file_name).await?))
}

/// POST /api/documents/ocr
pub async fn handle_ocr(
    State(state): State<AppState>,
    AuthUser(_): AuthUser,
    Json(req): Json<OcrRequest>,
) -> Result<Json<OcrResult>, AppError> {
    Ok(Json(state.documents.extract_text(&req.s3_key).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeAi, MemoryKv, MemoryObjectStore, FAKE_OCR_TEXT};

    #[tokio::test]
    async fn test_ocr_reads_uploaded_document() {
        let tickets = Ticketing::new(
            Arc::new(MemoryObjectStore::default()),
            Arc::new(MemoryKv::default()),
        );
        let ai = Arc::new(FakeAi::default());
        let (bus, mut events) = EventBus::channel();
        let service = DocumentService::new(tickets, ai.clone(), bus);

        let ticket = service.upload_url("resume.pdf").await.unwrap();
        assert!(ticket.object_key.starts_with("documents/"));

        let result = service.extract_text(&ticket.object_key).await.unwrap();
        assert_eq!(result.text, FAKE_OCR_TEXT);
        assert_eq!(
            ai.ocr_urls(),
            vec![format!("https://storage.test/{}", ticket.object_key)]
        );
        assert_eq!(
            events.try_recv().unwrap(),
            DomainEvent::UploadCommitted {
                object_key: ticket.object_key
            }
        );
    }

    #[tokio::test]
    async fn test_ocr_without_ticket_is_rejected() {
        let tickets = Ticketing::new(
            Arc::new(MemoryObjectStore::default()),
            Arc::new(MemoryKv::default()),
        );
        let ai = Arc::new(FakeAi::default());
        let (bus, _events) = EventBus::channel();
        let service = DocumentService::new(tickets, ai.clone(), bus);

        assert!(matches!(
            service.extract_text("documents/forged.pdf").await,
            Err(AppError::InvalidUploadTicket)
        ));
        assert!(ai.ocr_urls().is_empty());
    }
}
