use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::errors::AppError;
use crate::events::{DomainEvent, EventBus, Outbox, ResumeCreated};
use crate::models::resume::AnswerInput;
use crate::resume::repository::ResumeRepository;

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitResume {
    pub job_posting_id: i64,
    pub answers: Vec<AnswerInput>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResumeAccepted {
    pub resume_id: i64,
}

#[derive(Clone)]
pub struct ResumeService {
    resumes: Arc<dyn ResumeRepository>,
    bus: EventBus,
}

impl ResumeService {
    pub fn new(resumes: Arc<dyn ResumeRepository>, bus: EventBus) -> Self {
        Self { resumes, bus }
    }

    /// Stores the resume row and hands its answers to background question
    /// generation once the row exists.
    pub async fn submit(
        &self,
        user_id: i64,
        request: SubmitResume,
    ) -> Result<ResumeAccepted, AppError> {
        if request.job_posting_id <= 0 {
            return Err(AppError::Validation("job_posting_id must be positive".into()));
        }
        if request.answers.is_empty() {
            return Err(AppError::Validation("at least one answer is required".into()));
        }

        let posting = self
            .resumes
            .find_job_posting(request.job_posting_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("job posting {} not found", request.job_posting_id))
            })?;
        if !posting.is_open(Utc::now()) {
            warn!(job_posting_id = posting.id, "Resume submitted to a closed posting");
            return Err(AppError::Gone(format!("job posting {} is closed", posting.id)));
        }

        let mut outbox = Outbox::new();
        let resume = self.resumes.create_resume(user_id, posting.id).await?;
        outbox.push(DomainEvent::ResumeCreated(ResumeCreated {
            resume_id: resume.id,
            user_id,
            job_posting_id: posting.id,
            answers: request.answers,
        }));
        outbox.release(&self.bus);

        info!(user_id, resume_id = resume.id, "Resume registered, generation queued");
        Ok(ResumeAccepted {
            resume_id: resume.id,
        })
    }
}
