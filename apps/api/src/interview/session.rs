//! The candidate-facing interview session: playback, demo and ending.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::ai_client::dto::EndInterviewInput;
use crate::ai_client::AiService;
use crate::errors::AppError;
use crate::events::{DomainEvent, EventBus, Outbox};
use crate::interview::history::{resume_qa, root_history};
use crate::interview::repository::InterviewRepository;
use crate::interview::state::{InterviewStatus, Transition};
use crate::models::interview::{Difficulty, Interview, NewInterview, ProgressStatus, QuestionDraft};
use crate::push::HealthDataPush;
use crate::report::service::ReportService;
use crate::resume::repository::ResumeRepository;
use crate::storage::{Ticketing, UploadTicket};

pub const ANSWER_AUDIO_DIR: &str = "interviews/audio";
/// Window the watch records heart rate for once playback starts.
pub const HEALTH_CAPTURE_SECS: u64 = 20 * 60;

pub const DEMO_QUESTION: &str = "Please introduce yourself in one minute.";
pub const DEMO_QUESTION_KEY: &str = "interviews/demo/intro_question.wav";
const DEMO_EXAMPLE_INTRODUCTION: &str = "Hello, I am a computer science graduate who enjoys \
    building VR and AR experiences and the backend services behind them. For my capstone I \
    built a VR training simulator with a team of four, which taught me how to split work and \
    debug across the stack. I would like to bring that experience to products your team is \
    building. Thank you.";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuestionAudio {
    pub question_id: i64,
    pub presigned_url: String,
    pub difficulty: Difficulty,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EndRequest {
    pub interview_id: i64,
    /// Object key of the full interview recording.
    pub s3_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DemoRequest {
    pub job_posting_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DemoInterview {
    pub interview_id: i64,
    pub question_id: i64,
    pub question_presigned_url: String,
    pub example_introduction: String,
}

#[derive(Clone)]
pub struct SessionService {
    interviews: Arc<dyn InterviewRepository>,
    resumes: Arc<dyn ResumeRepository>,
    status: InterviewStatus,
    reports: ReportService,
    tickets: Ticketing,
    ai: Arc<dyn AiService>,
    push: HealthDataPush,
    bus: EventBus,
}

impl SessionService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        interviews: Arc<dyn InterviewRepository>,
        resumes: Arc<dyn ResumeRepository>,
        status: InterviewStatus,
        reports: ReportService,
        tickets: Ticketing,
        ai: Arc<dyn AiService>,
        push: HealthDataPush,
        bus: EventBus,
    ) -> Self {
        Self {
            interviews,
            resumes,
            status,
            reports,
            tickets,
            ai,
            push,
            bus,
        }
    }

    /// Download URLs for every question. Fetching them starts the interview.
    pub async fn question_urls(
        &self,
        user_id: i64,
        interview_id: i64,
    ) -> Result<Vec<QuestionAudio>, AppError> {
        let interview = self.load_authorized(user_id, interview_id).await?;
        if interview.status != ProgressStatus::NotStarted {
            warn!(interview_id, status = %interview.status, "Interview not ready to start");
            return Err(AppError::Conflict(format!(
                "interview {interview_id} is {} and cannot start",
                interview.status
            )));
        }

        let questions = self.interviews.questions_for_interview(interview_id).await?;
        if questions.is_empty() {
            return Err(AppError::NotFound(format!(
                "interview {interview_id} has no questions"
            )));
        }

        let mut audio = Vec::with_capacity(questions.len());
        for question in &questions {
            audio.push(QuestionAudio {
                question_id: question.id,
                presigned_url: self.tickets.download_url(&question.s3_key).await?,
                difficulty: question.difficulty,
            });
        }

        self.status.apply(interview_id, Transition::Start).await?;

        if let Err(err) = self
            .push
            .request_health_data(user_id, interview_id, HEALTH_CAPTURE_SECS)
            .await
        {
            warn!(interview_id, user_id, error = %err, "Health data request push failed");
        }

        info!(interview_id, questions = audio.len(), "Interview started");
        Ok(audio)
    }

    pub async fn audio_upload_url(&self, file_name: &str) -> Result<UploadTicket, AppError> {
        self.tickets.issue_upload_ticket(ANSWER_AUDIO_DIR, file_name).await
    }

    /// Ends an in-progress interview. Final scoring runs in the background
    /// once the interview is `COMPLETED`; if the AI call fails, the interview
    /// and its report are marked `FAILED` and the AI error is returned. An
    /// interview another call already completed keeps its report.
    pub async fn end(&self, user_id: i64, request: EndRequest) -> Result<(), AppError> {
        if request.s3_key.trim().is_empty() {
            return Err(AppError::Validation("s3_key is required".into()));
        }
        let interview = self.load_authorized(user_id, request.interview_id).await?;
        let interview_id = interview.id;

        let resume = resume_qa(self.resumes.as_ref(), &interview).await?;
        let jd_url = self.jd_url(&interview).await?;

        if interview.status != ProgressStatus::InProgress {
            warn!(interview_id, status = %interview.status, "End requested outside IN_PROGRESS");
            return Err(AppError::Conflict(format!(
                "interview {interview_id} is {} and cannot end",
                interview.status
            )));
        }

        let questions = self.interviews.questions_for_interview(interview_id).await?;
        let replies = self.interviews.replies_for_interview(interview_id).await?;
        let qna_history = root_history(&questions, &replies, None);

        self.tickets.validate_ticket(&request.s3_key).await?;
        let recording_url = self.tickets.download_url(&request.s3_key).await?;

        if let Err(err) = self.push.stop_health_data(user_id, interview_id).await {
            warn!(interview_id, user_id, error = %err, "Health data stop push failed");
        }

        self.reports.create_report(interview_id).await?;

        let input = EndInterviewInput {
            jd_url,
            resume,
            qna_history,
            preflight_urls: vec![recording_url],
        };
        let response = match self.ai.end_interview(&input).await {
            Ok(response) => response,
            Err(err) => {
                error!(interview_id, error = %err, "Final scoring call failed");
                self.fail(interview_id).await;
                return Err(err.into());
            }
        };

        let mut outbox = Outbox::new();
        self.status.apply(interview_id, Transition::Complete).await?;
        outbox.push(DomainEvent::UploadCommitted {
            object_key: request.s3_key,
        });
        outbox.push(DomainEvent::InterviewEnded {
            interview_id,
            response,
        });
        outbox.release(&self.bus);

        info!(interview_id, "Interview ended, report update queued");
        Ok(())
    }

    /// A resume-less interview for trying the flow: one fixed question,
    /// follow-ups on, ready to start.
    pub async fn create_demo(
        &self,
        user_id: i64,
        job_posting_id: i64,
    ) -> Result<DemoInterview, AppError> {
        let posting = self
            .resumes
            .find_job_posting(job_posting_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("job posting {job_posting_id} not found"))
            })?;
        let company_id = posting.company_id.ok_or_else(|| {
            AppError::NotFound(format!("job posting {job_posting_id} has no company"))
        })?;

        let (interview, question) = self
            .interviews
            .create_interview_with_question(
                NewInterview {
                    resume_id: None,
                    company_id,
                    follow_up_enabled: true,
                    status: ProgressStatus::NotStarted,
                },
                QuestionDraft {
                    parent_id: None,
                    content: DEMO_QUESTION.to_string(),
                    s3_key: DEMO_QUESTION_KEY.to_string(),
                    difficulty: Difficulty::Lax,
                },
            )
            .await?;

        info!(
            user_id,
            interview_id = interview.id,
            job_posting_id,
            company_id,
            "Demo interview created"
        );
        Ok(DemoInterview {
            interview_id: interview.id,
            question_id: question.id,
            question_presigned_url: self.tickets.download_url(&question.s3_key).await?,
            example_introduction: DEMO_EXAMPLE_INTRODUCTION.to_string(),
        })
    }

    /// The resume's posting document, or for a demo the newest posting of
    /// the company that has one. "" when there is none.
    async fn jd_url(&self, interview: &Interview) -> Result<String, AppError> {
        let posting = match interview.job_posting_id {
            Some(id) => self.resumes.find_job_posting(id).await?,
            None if interview.is_demo() => {
                self.resumes
                    .latest_job_posting_with_preference(interview.company_id)
                    .await?
            }
            None => None,
        };
        match posting.and_then(|p| p.s3_preference_file_key) {
            Some(key) if !key.trim().is_empty() => self.tickets.download_url(&key).await,
            _ => Ok(String::new()),
        }
    }

    /// Marks interview and report failed; each step on its own.
    /// The report is shared with any concurrent `end`; it is failed only by
    /// the call that moved the interview to `FAILED`.
    async fn fail(&self, interview_id: i64) {
        if let Err(err) = self.status.mark_failed(interview_id).await {
            error!(interview_id, error = %err, "Could not mark interview as failed");
            return;
        }
        if let Err(err) = self.reports.mark_report_as_failed(interview_id).await {
            error!(interview_id, error = %err, "Could not mark report as failed");
        }
    }

    async fn load_authorized(&self, user_id: i64, interview_id: i64) -> Result<Interview, AppError> {
        let interview = self
            .interviews
            .find_interview(interview_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("interview {interview_id} not found")))?;
        interview.authorize(user_id)?;
        Ok(interview)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai_client::AiError;
    use crate::heartbeat::service::HeartbeatService;
    use crate::models::interview::NewReply;
    use crate::models::report::ReportStatus;
    use crate::push::{token_key, ACTION_REQUEST_HEALTH_DATA, ACTION_STOP_HEALTH_DATA};
    use crate::report::repository::ReportRepository;
    use crate::storage::KeyValueStore;
    use crate::testing::{FakeAi, FakePush, MemoryKv, MemoryObjectStore, MemoryStore};
    use tokio::sync::mpsc::UnboundedReceiver;

    struct Fixture {
        service: SessionService,
        store: Arc<MemoryStore>,
        tickets: Ticketing,
        kv: Arc<MemoryKv>,
        ai: Arc<FakeAi>,
        push: Arc<FakePush>,
        events: UnboundedReceiver<DomainEvent>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::default());
        let kv = Arc::new(MemoryKv::default());
        let tickets = Ticketing::new(Arc::new(MemoryObjectStore::default()), kv.clone());
        let ai = Arc::new(FakeAi::default());
        let push = Arc::new(FakePush::default());
        let (bus, events) = EventBus::channel();
        let status = InterviewStatus::new(store.clone());
        let reports = ReportService::new(
            store.clone(),
            store.clone(),
            status.clone(),
            HeartbeatService::new(store.clone(), store.clone()),
        );
        Fixture {
            service: SessionService::new(
                store.clone(),
                store.clone(),
                status,
                reports,
                tickets.clone(),
                ai.clone(),
                HealthDataPush::new(push.clone(), kv.clone()),
                bus,
            ),
            store,
            tickets,
            kv,
            ai,
            push,
            events,
        }
    }

    fn root(content: &str) -> QuestionDraft {
        QuestionDraft {
            parent_id: None,
            content: content.into(),
            s3_key: format!("interviews/questions/{content}.wav"),
            difficulty: Difficulty::Lax,
        }
    }

    /// Interview owned by user 7 with two root questions.
    async fn interview(f: &Fixture, status: ProgressStatus) -> Interview {
        let posting = f.store.seed_job_posting(Some(3), Some("postings/jd.pdf"));
        let resume = f.store.seed_resume(7, posting.id);
        let interview = f
            .store
            .create_interview(NewInterview {
                resume_id: Some(resume.id),
                company_id: 3,
                follow_up_enabled: false,
                status,
            })
            .await
            .unwrap();
        f.store
            .insert_questions(interview.id, vec![root("q1"), root("q2")])
            .await
            .unwrap();
        interview
    }

    async fn recording(f: &Fixture) -> String {
        f.tickets
            .issue_upload_ticket(ANSWER_AUDIO_DIR, "full.wav")
            .await
            .unwrap()
            .object_key
    }

    #[tokio::test]
    async fn test_question_urls_start_interview_and_request_health_data() {
        let f = fixture();
        let interview = interview(&f, ProgressStatus::NotStarted).await;
        f.kv.set(&token_key(7), "tok").await.unwrap();

        let audio = f.service.question_urls(7, interview.id).await.unwrap();

        assert_eq!(audio.len(), 2);
        assert!(audio[0].presigned_url.ends_with("interviews/questions/q1.wav"));
        assert_eq!(f.store.interview(interview.id).status, ProgressStatus::InProgress);
        let sent = f.push.sent();
        assert_eq!(sent[0].1["action"], ACTION_REQUEST_HEALTH_DATA);
        assert_eq!(sent[0].1["durationSec"], "1200");
    }

    #[tokio::test]
    async fn test_question_urls_survive_missing_push_token() {
        let f = fixture();
        let interview = interview(&f, ProgressStatus::NotStarted).await;
        f.service.question_urls(7, interview.id).await.unwrap();
        assert!(f.push.sent().is_empty());
    }

    #[tokio::test]
    async fn test_question_urls_require_not_started() {
        let f = fixture();
        let interview = interview(&f, ProgressStatus::InProgress).await;
        assert!(matches!(
            f.service.question_urls(7, interview.id).await,
            Err(AppError::Conflict(_))
        ));
        assert!(matches!(
            f.service.question_urls(8, interview.id).await,
            Err(AppError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_end_completes_and_queues_scoring() {
        let mut f = fixture();
        let interview = interview(&f, ProgressStatus::InProgress).await;
        let questions = f.store.questions_for_interview(interview.id).await.unwrap();
        f.store
            .upsert_reply(NewReply {
                question_id: questions[0].id,
                content: "my answer".into(),
                s3_key: "interviews/audio/a.wav".into(),
            })
            .await
            .unwrap();
        f.kv.set(&token_key(7), "tok").await.unwrap();
        let key = recording(&f).await;

        f.service
            .end(
                7,
                EndRequest {
                    interview_id: interview.id,
                    s3_key: key.clone(),
                },
            )
            .await
            .unwrap();

        assert_eq!(f.store.interview(interview.id).status, ProgressStatus::Completed);
        let report = f
            .store
            .find_active_by_interview(interview.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(report.status, ReportStatus::Creating);

        let input = f.ai.end_inputs().pop().unwrap();
        assert_eq!(input.qna_history.len(), 2);
        assert_eq!(input.qna_history[0].answer, "my answer");
        assert!(input.jd_url.ends_with("postings/jd.pdf"));
        assert!(input.preflight_urls[0].ends_with(&key));

        assert_eq!(
            f.events.try_recv().unwrap(),
            DomainEvent::UploadCommitted { object_key: key }
        );
        match f.events.try_recv().unwrap() {
            DomainEvent::InterviewEnded {
                interview_id,
                response,
            } => {
                assert_eq!(interview_id, interview.id);
                assert_eq!(response.scores.unwrap()["logic"], 80);
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(f.push.sent()[0].1["action"], ACTION_STOP_HEALTH_DATA);
    }

    #[tokio::test]
    async fn test_end_timeout_fails_interview_and_report() {
        let mut f = fixture();
        let interview = interview(&f, ProgressStatus::InProgress).await;
        f.ai.push_end(Err(AiError::Timeout));
        let key = recording(&f).await;

        let err = f
            .service
            .end(
                7,
                EndRequest {
                    interview_id: interview.id,
                    s3_key: key.clone(),
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Ai(AiError::Timeout)));
        assert_eq!(f.store.interview(interview.id).status, ProgressStatus::Failed);
        let report = f
            .store
            .find_active_by_interview(interview.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(report.status, ReportStatus::Failed);
        assert!(f.events.try_recv().is_err());
        f.tickets.validate_ticket(&key).await.unwrap();
    }

    #[tokio::test]
    async fn test_overlapping_end_failure_keeps_completed_report() {
        let mut f = fixture();
        let interview = interview(&f, ProgressStatus::InProgress).await;
        let key = recording(&f).await;
        let gate = f.ai.hold_ends();
        let request = || EndRequest {
            interview_id: interview.id,
            s3_key: key.clone(),
        };

        // Both calls wait at the AI; the first through succeeds, the second times out.
        let release = async {
            gate.add_permits(1);
            for _ in 0..200 {
                if f.store.interview(interview.id).status == ProgressStatus::Completed {
                    break;
                }
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            }
            f.ai.push_end(Err(AiError::Timeout));
            gate.add_permits(1);
        };
        let (first, second, ()) =
            tokio::join!(f.service.end(7, request()), f.service.end(7, request()), release);

        let results = [first, second];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(AppError::Ai(AiError::Timeout)))));
        assert_eq!(f.ai.end_inputs().len(), 2);

        assert_eq!(f.store.interview(interview.id).status, ProgressStatus::Completed);
        let report = f
            .store
            .find_active_by_interview(interview.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(report.status, ReportStatus::Creating);
        assert!(matches!(
            f.events.try_recv().unwrap(),
            DomainEvent::UploadCommitted { .. }
        ));
        assert!(matches!(
            f.events.try_recv().unwrap(),
            DomainEvent::InterviewEnded { .. }
        ));
    }

    #[tokio::test]
    async fn test_end_outside_in_progress_is_conflict_without_side_effects() {
        for status in [
            ProgressStatus::NotStarted,
            ProgressStatus::Completed,
            ProgressStatus::Failed,
        ] {
            let f = fixture();
            let interview = interview(&f, status).await;
            let key = recording(&f).await;

            let err = f
                .service
                .end(
                    7,
                    EndRequest {
                        interview_id: interview.id,
                        s3_key: key,
                    },
                )
                .await
                .unwrap_err();

            assert!(matches!(err, AppError::Conflict(_)), "{status}");
            assert_eq!(f.store.interview(interview.id).status, status);
            assert!(f.ai.end_inputs().is_empty());
            assert!(f
                .store
                .find_active_by_interview(interview.id)
                .await
                .unwrap()
                .is_none());
        }
    }

    #[tokio::test]
    async fn test_end_with_expired_recording_ticket_is_rejected() {
        let f = fixture();
        let interview = interview(&f, ProgressStatus::InProgress).await;
        let key = recording(&f).await;
        f.kv.expire(&format!("s3_ticket:{key}"));

        assert!(matches!(
            f.service
                .end(
                    7,
                    EndRequest {
                        interview_id: interview.id,
                        s3_key: key,
                    },
                )
                .await,
            Err(AppError::InvalidUploadTicket)
        ));
        assert_eq!(f.store.interview(interview.id).status, ProgressStatus::InProgress);
        assert!(f.ai.end_inputs().is_empty());
    }

    #[tokio::test]
    async fn test_demo_interview_uses_company_posting_document() {
        let f = fixture();
        let older = f.store.seed_job_posting(Some(5), Some("postings/old.pdf"));
        f.store.seed_job_posting(Some(5), Some("postings/new.pdf"));
        f.store.seed_job_posting(Some(5), None);

        let demo = f.service.create_demo(42, older.id).await.unwrap();
        assert!(demo.question_presigned_url.ends_with(DEMO_QUESTION_KEY));
        assert!(!demo.example_introduction.is_empty());

        let created = f.store.interview(demo.interview_id);
        assert!(created.is_demo());
        assert!(created.follow_up_enabled);
        assert_eq!(created.status, ProgressStatus::NotStarted);
        assert_eq!(created.company_id, 5);
        let questions = f.store.questions_for_interview(demo.interview_id).await.unwrap();
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].difficulty, Difficulty::Lax);

        // any caller may drive a demo interview
        f.service.question_urls(99, demo.interview_id).await.unwrap();
        let key = recording(&f).await;
        f.service
            .end(
                99,
                EndRequest {
                    interview_id: demo.interview_id,
                    s3_key: key,
                },
            )
            .await
            .unwrap();
        let input = f.ai.end_inputs().pop().unwrap();
        assert!(input.resume.is_empty());
        assert!(input.jd_url.ends_with("postings/new.pdf"));
    }

    #[tokio::test]
    async fn test_demo_requires_posting_with_company() {
        let f = fixture();
        let orphan = f.store.seed_job_posting(None, None);
        assert!(matches!(
            f.service.create_demo(1, orphan.id).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            f.service.create_demo(1, 999).await,
            Err(AppError::NotFound(_))
        ));
    }
}
