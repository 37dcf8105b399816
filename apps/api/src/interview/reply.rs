//! Candidate replies, with or without an AI follow-up question.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::ai_client::dto::{InterviewInput, QnaTurn};
use crate::ai_client::AiService;
use crate::errors::AppError;
use crate::events::{DomainEvent, EventBus, Outbox};
use crate::interview::history::{resume_qa, root_history};
use crate::interview::repository::InterviewRepository;
use crate::interview::workflow::QUESTION_AUDIO_DIR;
use crate::models::interview::{
    Difficulty, Interview, InterviewQuestion, NewReply, QuestionDraft, Reply,
};
use crate::resume::repository::ResumeRepository;
use crate::storage::Ticketing;

#[derive(Debug, Clone, Deserialize)]
pub struct ReplyRequest {
    pub question_id: i64,
    /// Object key of the uploaded answer audio.
    pub s3_key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FollowUpQuestion {
    pub question_id: i64,
    pub presigned_url: String,
    pub content: String,
    pub difficulty: Difficulty,
}

#[derive(Clone)]
pub struct ReplyService {
    interviews: Arc<dyn InterviewRepository>,
    resumes: Arc<dyn ResumeRepository>,
    tickets: Ticketing,
    ai: Arc<dyn AiService>,
    bus: EventBus,
}

impl ReplyService {
    pub fn new(
        interviews: Arc<dyn InterviewRepository>,
        resumes: Arc<dyn ResumeRepository>,
        tickets: Ticketing,
        ai: Arc<dyn AiService>,
        bus: EventBus,
    ) -> Self {
        Self {
            interviews,
            resumes,
            tickets,
            ai,
            bus,
        }
    }

    /// Transcribes the answer audio and stores it as the question's reply.
    pub async fn register_reply(
        &self,
        user_id: i64,
        request: ReplyRequest,
    ) -> Result<Reply, AppError> {
        let (question, _) = self.load(user_id, &request).await?;

        let audio_url = self.tickets.download_url(&request.s3_key).await?;
        let transcript = self.ai.transcribe(&audio_url).await?;

        let mut outbox = Outbox::new();
        let reply = self
            .interviews
            .upsert_reply(NewReply {
                question_id: question.id,
                content: transcript,
                s3_key: request.s3_key.clone(),
            })
            .await?;
        outbox.push(DomainEvent::UploadCommitted {
            object_key: request.s3_key,
        });
        outbox.release(&self.bus);

        info!(
            question_id = question.id,
            reply_id = reply.id,
            chars = reply.content.chars().count(),
            "Reply registered"
        );
        Ok(reply)
    }

    /// Stores the reply and the follow-up question the AI generates for it,
    /// both or neither.
    pub async fn register_reply_with_follow_up(
        &self,
        user_id: i64,
        request: ReplyRequest,
    ) -> Result<FollowUpQuestion, AppError> {
        let (question, interview) = self.load(user_id, &request).await?;
        if let Some(parent_id) = question.parent_id {
            warn!(question_id = question.id, parent_id, "Follow-up requested for a follow-up");
            return Err(AppError::Validation(format!(
                "question {} is a follow-up; follow-ups are only generated for root questions",
                question.id
            )));
        }

        let resume = resume_qa(self.resumes.as_ref(), &interview).await?;
        let questions = self.interviews.questions_for_interview(interview.id).await?;
        let replies = self.interviews.replies_for_interview(interview.id).await?;
        let mut qna_history = root_history(&questions, &replies, Some(question.id));
        qna_history.push(QnaTurn {
            question: question.content.clone(),
            answer: String::new(),
        });

        let audio_url = self.tickets.download_url(&request.s3_key).await?;
        let tts = self
            .tickets
            .issue_upload_ticket(
                QUESTION_AUDIO_DIR,
                &format!(
                    "interview_{}_related_question_{}.wav",
                    interview.id, question.id
                ),
            )
            .await?;

        let input = InterviewInput {
            jd_url: String::new(),
            resume,
            qna_history,
            latest_wav_file_url: audio_url,
            tts_upload_urls: vec![tts.presigned_url.clone()],
        };
        let response = self.ai.answer_interview(&input).await?;

        let Some(follow_up_text) = response.text_from_tts.first().cloned() else {
            warn!(question_id = question.id, "AI returned no follow-up question");
            return Err(AppError::Internal(anyhow::anyhow!(
                "follow-up question generation failed"
            )));
        };

        let mut outbox = Outbox::new();
        let (reply, follow_up) = self
            .interviews
            .save_reply_with_follow_up(
                NewReply {
                    question_id: question.id,
                    content: response.converted_text_with_stt.clone().unwrap_or_default(),
                    s3_key: request.s3_key.clone(),
                },
                interview.id,
                QuestionDraft {
                    parent_id: Some(question.id),
                    content: follow_up_text,
                    s3_key: tts.object_key.clone(),
                    difficulty: Difficulty::from_talker(response.talker_at(0)),
                },
            )
            .await?;
        outbox.push(DomainEvent::UploadCommitted {
            object_key: request.s3_key,
        });
        outbox.push(DomainEvent::UploadCommitted {
            object_key: tts.object_key,
        });
        outbox.release(&self.bus);

        info!(
            question_id = question.id,
            reply_id = reply.id,
            follow_up_id = follow_up.id,
            difficulty = follow_up.difficulty.as_str(),
            "Reply registered with follow-up"
        );
        Ok(FollowUpQuestion {
            question_id: follow_up.id,
            presigned_url: self.tickets.download_url(&follow_up.s3_key).await?,
            content: follow_up.content,
            difficulty: follow_up.difficulty,
        })
    }

    /// Ticket, question and ownership checks shared by both reply paths.
    async fn load(
        &self,
        user_id: i64,
        request: &ReplyRequest,
    ) -> Result<(InterviewQuestion, Interview), AppError> {
        if request.question_id <= 0 || request.s3_key.trim().is_empty() {
            return Err(AppError::Validation(
                "question_id must be positive and s3_key is required".into(),
            ));
        }
        self.tickets.validate_ticket(&request.s3_key).await?;

        let question = self
            .interviews
            .find_question(request.question_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("question {} not found", request.question_id))
            })?;
        let interview = self
            .interviews
            .find_interview(question.interview_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("interview {} not found", question.interview_id))
            })?;
        interview.authorize(user_id)?;
        Ok((question, interview))
    }
}
