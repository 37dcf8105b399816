//! Background question generation for a freshly submitted resume.
//!
//! Runs on the worker pool after the resume commits. Either the interview
//! ends up `NOT_STARTED` with all five questions and their audio in place, or
//! it ends up `FAILED` with no questions at all.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use tracing::{error, info, warn};

use crate::ai_client::dto::{InterviewInput, ResumeQaItem};
use crate::ai_client::AiService;
use crate::errors::AppError;
use crate::events::{DomainEvent, EventBus, Outbox, ResumeCreated};
use crate::interview::repository::InterviewRepository;
use crate::interview::state::{InterviewStatus, Transition};
use crate::models::interview::{
    Difficulty, InterviewQuestion, NewInterview, ProgressStatus, QuestionDraft,
};
use crate::models::resume::{AnswerInput, JobPosting};
use crate::report::service::ReportService;
use crate::resume::repository::ResumeRepository;
use crate::storage::{Ticketing, UploadTicket};

pub const QUESTION_COUNT: usize = 5;
pub const MIN_ANSWER_CHARS: usize = 10;
pub const QUESTION_AUDIO_DIR: &str = "interviews/questions";

#[derive(Clone)]
pub struct ResumeWorkflow {
    resumes: Arc<dyn ResumeRepository>,
    interviews: Arc<dyn InterviewRepository>,
    status: InterviewStatus,
    reports: ReportService,
    tickets: Ticketing,
    ai: Arc<dyn AiService>,
    bus: EventBus,
}

impl ResumeWorkflow {
    pub fn new(
        resumes: Arc<dyn ResumeRepository>,
        interviews: Arc<dyn InterviewRepository>,
        status: InterviewStatus,
        reports: ReportService,
        tickets: Ticketing,
        ai: Arc<dyn AiService>,
        bus: EventBus,
    ) -> Self {
        Self {
            resumes,
            interviews,
            status,
            reports,
            tickets,
            ai,
            bus,
        }
    }

    /// Runs the whole pipeline. Failures are logged and compensated here and
    /// never propagate to the caller.
    pub async fn run(&self, event: ResumeCreated) {
        let resume_id = event.resume_id;
        info!(resume_id, "Question generation started");

        let mut created = None;
        match self.prepare(&event, &mut created).await {
            Ok(interview_id) => {
                info!(resume_id, interview_id, "Interview ready");
            }
            Err(err) => {
                error!(
                    resume_id,
                    interview_id = ?created,
                    error = %err,
                    "Question generation failed"
                );
                self.compensate(resume_id, created).await;
            }
        }
    }

    async fn prepare(
        &self,
        event: &ResumeCreated,
        created: &mut Option<i64>,
    ) -> Result<i64, AppError> {
        let posting = self
            .resumes
            .find_job_posting(event.job_posting_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("job posting {} not found", event.job_posting_id))
            })?;

        self.register_answers(event, &posting).await?;

        let company_id = posting.company_id.ok_or_else(|| {
            AppError::NotFound(format!("job posting {} has no company", posting.id))
        })?;
        let interview = self
            .interviews
            .create_interview(NewInterview {
                resume_id: Some(event.resume_id),
                company_id,
                follow_up_enabled: false,
                status: ProgressStatus::Creating,
            })
            .await?;
        *created = Some(interview.id);

        let mut tickets = Vec::with_capacity(QUESTION_COUNT);
        for i in 1..=QUESTION_COUNT {
            let name = format!("interview_{}_question_{i}.wav", interview.id);
            tickets.push(self.tickets.issue_upload_ticket(QUESTION_AUDIO_DIR, &name).await?);
        }

        let answers = self.resumes.answers_for_resume(event.resume_id).await?;
        let input = InterviewInput {
            jd_url: self.jd_url(&posting).await?,
            resume: ResumeQaItem::numbered(&answers),
            qna_history: Vec::new(),
            latest_wav_file_url: String::new(),
            tts_upload_urls: tickets.iter().map(|t| t.presigned_url.clone()).collect(),
        };
        let response = self.ai.start_interview(&input).await?;

        if response.text_from_tts.len() != QUESTION_COUNT {
            return Err(AppError::UnprocessableEntity(format!(
                "expected {QUESTION_COUNT} generated questions, got {}",
                response.text_from_tts.len()
            )));
        }

        let drafts = question_drafts(&response.text_from_tts, &response.talker, &tickets);
        let questions = self.interviews.insert_questions(interview.id, drafts).await?;
        self.verify_audio(&questions).await?;

        let mut outbox = Outbox::new();
        for ticket in tickets {
            outbox.push(DomainEvent::UploadCommitted {
                object_key: ticket.object_key,
            });
        }
        self.status.apply(interview.id, Transition::MarkReady).await?;
        // NOT_STARTED is final for this pipeline; nothing after this may fail.
        outbox.release(&self.bus);
        Ok(interview.id)
    }

    /// Validates and stores the resume answers in one unit.
    async fn register_answers(
        &self,
        event: &ResumeCreated,
        posting: &JobPosting,
    ) -> Result<(), AppError> {
        let ids: Vec<i64> = event.answers.iter().map(|a| a.question_id).collect();
        let limits: HashMap<i64, i32> = self
            .resumes
            .resume_questions(posting.id, &ids)
            .await?
            .into_iter()
            .map(|q| (q.id, q.limit_cnt))
            .collect();

        for answer in &event.answers {
            validate_answer(answer, &limits)?;
        }
        self.resumes
            .insert_answers(event.resume_id, &event.answers)
            .await
    }

    /// Presigned download of the posting's preference document, or "".
    async fn jd_url(&self, posting: &JobPosting) -> Result<String, AppError> {
        match &posting.s3_preference_file_key {
            Some(key) if !key.trim().is_empty() => self.tickets.download_url(key).await,
            _ => Ok(String::new()),
        }
    }

    /// Every question's audio must exist; the checks run concurrently.
    async fn verify_audio(&self, questions: &[InterviewQuestion]) -> Result<(), AppError> {
        if questions.len() < QUESTION_COUNT {
            return Err(AppError::UnprocessableEntity(format!(
                "only {} of {QUESTION_COUNT} questions were stored",
                questions.len()
            )));
        }

        let checks = join_all(
            questions
                .iter()
                .map(|q| self.tickets.object_exists(&q.s3_key)),
        )
        .await;

        let mut missing = Vec::new();
        for (question, check) in questions.iter().zip(checks) {
            match check {
                Ok(true) => {}
                Ok(false) => missing.push(question.s3_key.clone()),
                Err(err) => {
                    warn!(key = %question.s3_key, error = %err, "Audio existence check failed");
                    missing.push(question.s3_key.clone());
                }
            }
        }
        if !missing.is_empty() {
            return Err(AppError::UnprocessableEntity(format!(
                "question audio missing: {}",
                missing.join(", ")
            )));
        }
        Ok(())
    }

    /// Questions and report are only cleaned up once the interview is
    /// `FAILED`. Past that point each step runs independently; a failing
    /// step is logged and the rest still run.
    async fn compensate(&self, resume_id: i64, created: Option<i64>) {
        let marked = match created {
            Some(interview_id) => self.status.mark_failed(interview_id).await,
            None => self.status.mark_failed_by_resume(resume_id).await,
        };
        if let Err(err) = marked {
            // A ready interview rejects the transition and keeps its questions.
            error!(resume_id, error = %err, "Could not mark interview as failed");
            return;
        }

        let Some(interview_id) = created else {
            return;
        };
        if let Err(err) = self.purge_questions(interview_id).await {
            error!(interview_id, error = %err, "Could not purge generated questions");
        }
        if let Err(err) = self.reports.mark_report_as_failed(interview_id).await {
            error!(interview_id, error = %err, "Could not mark report as failed");
        }
    }

    async fn purge_questions(&self, interview_id: i64) -> Result<(), AppError> {
        let ids: Vec<i64> = self
            .interviews
            .questions_for_interview(interview_id)
            .await?
            .iter()
            .map(|q| q.id)
            .collect();
        if ids.is_empty() {
            return Ok(());
        }
        let deleted = self.interviews.delete_questions(&ids).await?;
        warn!(interview_id, deleted, "Purged questions of failed interview");
        Ok(())
    }
}

fn validate_answer(answer: &AnswerInput, limits: &HashMap<i64, i32>) -> Result<(), AppError> {
    let limit = limits.get(&answer.question_id).ok_or_else(|| {
        AppError::NotFound(format!("resume question {} not found", answer.question_id))
    })?;

    let trimmed = answer.content.trim().chars().count();
    if trimmed < MIN_ANSWER_CHARS {
        return Err(AppError::UnprocessableEntity(format!(
            "answer to question {} must be at least {MIN_ANSWER_CHARS} characters",
            answer.question_id
        )));
    }
    if answer.content.chars().count() > usize::try_from(*limit).unwrap_or(0) {
        return Err(AppError::Validation(format!(
            "answer to question {} exceeds {limit} characters",
            answer.question_id
        )));
    }
    Ok(())
}

fn question_drafts(
    texts: &[String],
    talkers: &[i32],
    tickets: &[UploadTicket],
) -> Vec<QuestionDraft> {
    texts
        .iter()
        .zip(tickets)
        .enumerate()
        .map(|(i, (content, ticket))| QuestionDraft {
            parent_id: None,
            content: content.clone(),
            s3_key: ticket.object_key.clone(),
            difficulty: Difficulty::from_talker(talkers.get(i).copied()),
        })
        .collect()
}
