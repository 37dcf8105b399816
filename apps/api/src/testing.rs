//! In-memory implementations of the storage, AI and push seams for tests.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::ai_client::dto::{EndInterviewInput, EndInterviewResponse, InterviewInput, InterviewResponse};
use crate::ai_client::{AiError, AiService};
use crate::device::repository::DeviceRepository;
use crate::errors::AppError;
use crate::heartbeat::repository::HeartbeatRepository;
use crate::interview::repository::InterviewRepository;
use crate::models::heartbeat::HeartbeatSample;
use crate::models::interview::{
    Interview, InterviewQuestion, NewInterview, NewReply, ProgressStatus, QuestionDraft, Reply,
};
use crate::models::report::{Deletion, QnaItem, Report, ReportCompletion, ReportStatus};
use crate::models::resume::{AnswerInput, JobPosting, Resume, ResumeAnswer, ResumeQuestion};
use crate::models::watch::Watch;
use crate::push::{PushError, PushGateway};
use crate::report::repository::ReportRepository;
use crate::resume::repository::ResumeRepository;
use crate::storage::{KeyValueStore, ObjectStore};

// ────────────────────────────────────────────────────────────────────────────
// Key-value store
// ────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryKv {
    entries: Mutex<HashMap<String, (String, Option<Duration>)>>,
    failing_deletes: AtomicBool,
}

impl MemoryKv {
    pub fn ttl_of(&self, key: &str) -> Option<Duration> {
        self.entries.lock().unwrap().get(key).and_then(|(_, ttl)| *ttl)
    }

    /// Every later delete errors and leaves the key in place.
    pub fn fail_deletes(&self) {
        self.failing_deletes.store(true, Ordering::SeqCst);
    }

    /// Drops a key as if its TTL ran out.
    pub fn expire(&self, key: &str) {
        self.entries.lock().unwrap().remove(key);
    }
}

#[async_trait]
impl KeyValueStore for MemoryKv {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        Ok(self.entries.lock().unwrap().get(key).map(|(v, _)| v.clone()))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), AppError> {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), (value.to_string(), None));
        Ok(())
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), AppError> {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), (value.to_string(), Some(ttl)));
        Ok(())
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, AppError> {
        let mut entries = self.entries.lock().unwrap();
        if entries.contains_key(key) {
            return Ok(false);
        }
        entries.insert(key.to_string(), (value.to_string(), Some(ttl)));
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<bool, AppError> {
        if self.failing_deletes.load(Ordering::SeqCst) {
            return Err(AppError::Storage(format!("delete of {key} refused")));
        }
        Ok(self.entries.lock().unwrap().remove(key).is_some())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Object store
// ────────────────────────────────────────────────────────────────────────────

/// Presigning an upload stands in for the client uploading the object.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashSet<String>>,
    skipped: Mutex<Vec<String>>,
}

impl MemoryObjectStore {
    /// Uploads whose key contains `pattern` never arrive.
    pub fn skip_uploads_containing(&self, pattern: &str) {
        self.skipped.lock().unwrap().push(pattern.to_string());
    }

    pub fn put(&self, key: &str) {
        self.objects.lock().unwrap().insert(key.to_string());
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn presign_upload(&self, key: &str, _ttl: Duration) -> Result<String, AppError> {
        let skipped = self.skipped.lock().unwrap().iter().any(|p| key.contains(p));
        if !skipped {
            self.put(key);
        }
        Ok(format!("https://storage.test/upload/{key}"))
    }

    async fn presign_download(&self, key: &str, _ttl: Duration) -> Result<String, AppError> {
        Ok(format!("https://storage.test/{key}"))
    }

    async fn head_object(&self, key: &str) -> Result<bool, AppError> {
        Ok(self.objects.lock().unwrap().contains(key))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Relational store
// ────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Tables {
    next_id: i64,
    last_at: Option<DateTime<Utc>>,
    interviews: BTreeMap<i64, Interview>,
    questions: Vec<InterviewQuestion>,
    replies: Vec<Reply>,
    resumes: BTreeMap<i64, Resume>,
    postings: BTreeMap<i64, JobPosting>,
    resume_questions: Vec<(i64, ResumeQuestion)>,
    answers: Vec<(i64, AnswerInput)>,
    reports: Vec<Report>,
    samples: Vec<HeartbeatSample>,
    watches: Vec<Watch>,
}

impl Tables {
    fn id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    /// Strictly increasing timestamps, so creation order is observable.
    fn now(&mut self) -> DateTime<Utc> {
        let mut now = Utc::now();
        if let Some(last) = self.last_at {
            if now <= last {
                now = last + chrono::Duration::microseconds(1);
            }
        }
        self.last_at = Some(now);
        now
    }

    fn question(&mut self, interview_id: i64, draft: &QuestionDraft) -> InterviewQuestion {
        let question = InterviewQuestion {
            id: self.id(),
            interview_id,
            parent_id: draft.parent_id,
            content: draft.content.clone(),
            s3_key: draft.s3_key.clone(),
            difficulty: draft.difficulty,
            created_at: self.now(),
        };
        self.questions.push(question.clone());
        question
    }

    fn upsert_reply(&mut self, reply: &NewReply) -> Reply {
        if let Some(existing) = self
            .replies
            .iter_mut()
            .find(|r| r.question_id == reply.question_id)
        {
            existing.content = reply.content.clone();
            existing.s3_key = reply.s3_key.clone();
            return existing.clone();
        }
        let saved = Reply {
            id: self.id(),
            question_id: reply.question_id,
            content: reply.content.clone(),
            s3_key: reply.s3_key.clone(),
            created_at: self.now(),
        };
        self.replies.push(saved.clone());
        saved
    }

    fn question_ids_of(&self, interview_id: i64) -> HashSet<i64> {
        self.questions
            .iter()
            .filter(|q| q.interview_id == interview_id)
            .map(|q| q.id)
            .collect()
    }
}

/// One lock over every table; implements all repository traits.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn interview(&self, id: i64) -> Interview {
        self.tables.lock().unwrap().interviews[&id].clone()
    }

    pub fn seed_job_posting(&self, company_id: Option<i64>, preference_key: Option<&str>) -> JobPosting {
        let mut t = self.tables.lock().unwrap();
        let posting = JobPosting {
            id: t.id(),
            company_id,
            s3_preference_file_key: preference_key.map(str::to_string),
            end_at: None,
            created_at: t.now(),
        };
        t.postings.insert(posting.id, posting.clone());
        posting
    }

    pub fn close_job_posting(&self, id: i64) {
        let mut t = self.tables.lock().unwrap();
        if let Some(posting) = t.postings.get_mut(&id) {
            posting.end_at = Some(Utc::now() - chrono::Duration::days(1));
        }
    }

    pub fn seed_resume_question(&self, job_posting_id: i64, content: &str, limit_cnt: i32) -> ResumeQuestion {
        let mut t = self.tables.lock().unwrap();
        let question = ResumeQuestion {
            id: t.id(),
            content: content.to_string(),
            limit_cnt,
        };
        t.resume_questions.push((job_posting_id, question.clone()));
        question
    }

    pub fn seed_resume(&self, user_id: i64, job_posting_id: i64) -> Resume {
        let mut t = self.tables.lock().unwrap();
        let resume = Resume {
            id: t.id(),
            user_id,
            job_posting_id,
            created_at: t.now(),
        };
        t.resumes.insert(resume.id, resume.clone());
        resume
    }
}

#[async_trait]
impl InterviewRepository for MemoryStore {
    async fn find_interview(&self, id: i64) -> Result<Option<Interview>, AppError> {
        Ok(self.tables.lock().unwrap().interviews.get(&id).cloned())
    }

    async fn find_interview_by_resume(
        &self,
        resume_id: i64,
    ) -> Result<Option<Interview>, AppError> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .interviews
            .values()
            .find(|i| i.resume_id == Some(resume_id))
            .cloned())
    }

    async fn create_interview(&self, new: NewInterview) -> Result<Interview, AppError> {
        let mut t = self.tables.lock().unwrap();
        let resume = new.resume_id.and_then(|id| t.resumes.get(&id).cloned());
        let interview = Interview {
            id: t.id(),
            resume_id: new.resume_id,
            company_id: new.company_id,
            follow_up_enabled: new.follow_up_enabled,
            status: new.status,
            owner_id: resume.as_ref().map(|r| r.user_id),
            job_posting_id: resume.as_ref().map(|r| r.job_posting_id),
            created_at: t.now(),
        };
        t.interviews.insert(interview.id, interview.clone());
        Ok(interview)
    }

    async fn create_interview_with_question(
        &self,
        new: NewInterview,
        question: QuestionDraft,
    ) -> Result<(Interview, InterviewQuestion), AppError> {
        let interview = self.create_interview(new).await?;
        let question = self.tables.lock().unwrap().question(interview.id, &question);
        Ok((interview, question))
    }

    async fn update_status(
        &self,
        id: i64,
        from: &[ProgressStatus],
        to: ProgressStatus,
    ) -> Result<bool, AppError> {
        let mut t = self.tables.lock().unwrap();
        match t.interviews.get_mut(&id) {
            Some(interview) if from.contains(&interview.status) => {
                interview.status = to;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn interview_ids_for_job_posting(
        &self,
        job_posting_id: i64,
    ) -> Result<Vec<i64>, AppError> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .interviews
            .values()
            .filter(|i| i.job_posting_id == Some(job_posting_id))
            .map(|i| i.id)
            .collect())
    }

    async fn interviews_for_user(&self, user_id: i64) -> Result<Vec<Interview>, AppError> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .interviews
            .values()
            .filter(|i| i.owner_id == Some(user_id))
            .cloned()
            .collect())
    }

    async fn find_question(&self, id: i64) -> Result<Option<InterviewQuestion>, AppError> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .questions
            .iter()
            .find(|q| q.id == id)
            .cloned())
    }

    async fn questions_for_interview(
        &self,
        interview_id: i64,
    ) -> Result<Vec<InterviewQuestion>, AppError> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .questions
            .iter()
            .filter(|q| q.interview_id == interview_id)
            .cloned()
            .collect())
    }

    async fn insert_questions(
        &self,
        interview_id: i64,
        drafts: Vec<QuestionDraft>,
    ) -> Result<Vec<InterviewQuestion>, AppError> {
        let mut t = self.tables.lock().unwrap();
        Ok(drafts.iter().map(|d| t.question(interview_id, d)).collect())
    }

    async fn delete_questions(&self, ids: &[i64]) -> Result<u64, AppError> {
        let mut t = self.tables.lock().unwrap();
        let before = t.questions.len();
        t.questions.retain(|q| !ids.contains(&q.id));
        Ok((before - t.questions.len()) as u64)
    }

    async fn replies_for_interview(&self, interview_id: i64) -> Result<Vec<Reply>, AppError> {
        let t = self.tables.lock().unwrap();
        let ids = t.question_ids_of(interview_id);
        Ok(t.replies
            .iter()
            .filter(|r| ids.contains(&r.question_id))
            .cloned()
            .collect())
    }

    async fn upsert_reply(&self, reply: NewReply) -> Result<Reply, AppError> {
        Ok(self.tables.lock().unwrap().upsert_reply(&reply))
    }

    async fn save_reply_with_follow_up(
        &self,
        reply: NewReply,
        interview_id: i64,
        follow_up: QuestionDraft,
    ) -> Result<(Reply, InterviewQuestion), AppError> {
        let mut t = self.tables.lock().unwrap();
        let saved = t.upsert_reply(&reply);
        let question = t.question(interview_id, &follow_up);
        Ok((saved, question))
    }
}

#[async_trait]
impl ResumeRepository for MemoryStore {
    async fn find_resume(&self, id: i64) -> Result<Option<Resume>, AppError> {
        Ok(self.tables.lock().unwrap().resumes.get(&id).cloned())
    }

    async fn create_resume(&self, user_id: i64, job_posting_id: i64) -> Result<Resume, AppError> {
        Ok(self.seed_resume(user_id, job_posting_id))
    }

    async fn find_job_posting(&self, id: i64) -> Result<Option<JobPosting>, AppError> {
        Ok(self.tables.lock().unwrap().postings.get(&id).cloned())
    }

    async fn latest_job_posting_with_preference(
        &self,
        company_id: i64,
    ) -> Result<Option<JobPosting>, AppError> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .postings
            .values()
            .filter(|p| p.company_id == Some(company_id) && p.s3_preference_file_key.is_some())
            .max_by_key(|p| (p.created_at, p.id))
            .cloned())
    }

    async fn resume_questions(
        &self,
        job_posting_id: i64,
        ids: &[i64],
    ) -> Result<Vec<ResumeQuestion>, AppError> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .resume_questions
            .iter()
            .filter(|(posting, q)| *posting == job_posting_id && ids.contains(&q.id))
            .map(|(_, q)| q.clone())
            .collect())
    }

    async fn insert_answers(
        &self,
        resume_id: i64,
        answers: &[AnswerInput],
    ) -> Result<(), AppError> {
        let mut t = self.tables.lock().unwrap();
        t.answers
            .extend(answers.iter().map(|a| (resume_id, a.clone())));
        Ok(())
    }

    async fn answers_for_resume(&self, resume_id: i64) -> Result<Vec<ResumeAnswer>, AppError> {
        let t = self.tables.lock().unwrap();
        let mut answers: Vec<ResumeAnswer> = t
            .answers
            .iter()
            .filter(|(id, _)| *id == resume_id)
            .filter_map(|(_, a)| {
                t.resume_questions
                    .iter()
                    .find(|(_, q)| q.id == a.question_id)
                    .map(|(_, q)| ResumeAnswer {
                        question_id: q.id,
                        question: q.content.clone(),
                        answer: a.content.clone(),
                    })
            })
            .collect();
        answers.sort_by_key(|a| a.question_id);
        Ok(answers)
    }
}

#[async_trait]
impl ReportRepository for MemoryStore {
    async fn find(&self, id: Uuid) -> Result<Option<Report>, AppError> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .reports
            .iter()
            .find(|r| r.id == id)
            .cloned())
    }

    async fn find_active_by_interview(
        &self,
        interview_id: i64,
    ) -> Result<Option<Report>, AppError> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .reports
            .iter()
            .find(|r| r.interview_id == interview_id && !r.deletion.is_deleted())
            .cloned())
    }

    async fn insert(
        &self,
        interview_id: i64,
        qna_list: Vec<QnaItem>,
    ) -> Result<Option<Report>, AppError> {
        let mut t = self.tables.lock().unwrap();
        if t
            .reports
            .iter()
            .any(|r| r.interview_id == interview_id && !r.deletion.is_deleted())
        {
            return Ok(None);
        }
        let now = t.now();
        let report = Report {
            id: Uuid::new_v4(),
            interview_id,
            status: ReportStatus::Creating,
            scores: BTreeMap::new(),
            narrative: String::new(),
            qna_list,
            deletion: Deletion::Active,
            created_at: now,
            updated_at: now,
        };
        t.reports.push(report.clone());
        Ok(Some(report))
    }

    async fn complete(&self, id: Uuid, completion: ReportCompletion) -> Result<(), AppError> {
        let mut t = self.tables.lock().unwrap();
        let now = t.now();
        let report = t
            .reports
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| AppError::NotFound(format!("report {id} not found")))?;
        report.status = ReportStatus::Completed;
        report.scores = completion.scores;
        report.narrative = completion.narrative;
        report.qna_list = completion.qna_list;
        report.updated_at = now;
        Ok(())
    }

    async fn set_status(&self, id: Uuid, status: ReportStatus) -> Result<(), AppError> {
        let mut t = self.tables.lock().unwrap();
        let report = t
            .reports
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| AppError::NotFound(format!("report {id} not found")))?;
        report.status = status;
        Ok(())
    }

    async fn soft_delete(&self, id: Uuid) -> Result<bool, AppError> {
        let mut t = self.tables.lock().unwrap();
        let now = t.now();
        match t
            .reports
            .iter_mut()
            .find(|r| r.id == id && !r.deletion.is_deleted())
        {
            Some(report) => {
                report.deletion = Deletion::Deleted { at: now };
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn active_for_interviews(&self, interview_ids: &[i64]) -> Result<Vec<Report>, AppError> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .reports
            .iter()
            .filter(|r| interview_ids.contains(&r.interview_id) && !r.deletion.is_deleted())
            .cloned()
            .collect())
    }
}

#[async_trait]
impl HeartbeatRepository for MemoryStore {
    async fn insert_batch(&self, samples: &[HeartbeatSample]) -> Result<u64, AppError> {
        self.tables
            .lock()
            .unwrap()
            .samples
            .extend_from_slice(samples);
        Ok(samples.len() as u64)
    }

    async fn samples_for_interview(
        &self,
        interview_id: i64,
    ) -> Result<Vec<HeartbeatSample>, AppError> {
        let mut samples: Vec<HeartbeatSample> = self
            .tables
            .lock()
            .unwrap()
            .samples
            .iter()
            .filter(|s| s.interview_id == interview_id)
            .cloned()
            .collect();
        samples.sort_by_key(|s| s.measured_at);
        Ok(samples)
    }
}

#[async_trait]
impl DeviceRepository for MemoryStore {
    async fn find_by_user(&self, user_id: i64) -> Result<Option<Watch>, AppError> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .watches
            .iter()
            .find(|w| w.user_id == user_id)
            .cloned())
    }

    async fn find_by_uuid(&self, uuid: &str) -> Result<Option<Watch>, AppError> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .watches
            .iter()
            .find(|w| w.uuid == uuid)
            .cloned())
    }

    async fn register(
        &self,
        user_id: i64,
        uuid: &str,
        model_name: &str,
    ) -> Result<Watch, AppError> {
        let mut t = self.tables.lock().unwrap();
        if t.watches.iter().any(|w| w.user_id == user_id || w.uuid == uuid) {
            return Err(AppError::Conflict("a device is already registered".into()));
        }
        let watch = Watch {
            id: t.id(),
            user_id,
            uuid: uuid.to_string(),
            model_name: model_name.to_string(),
            created_at: t.now(),
        };
        t.watches.push(watch.clone());
        Ok(watch)
    }

    async fn delete_for_user(&self, user_id: i64) -> Result<bool, AppError> {
        let mut t = self.tables.lock().unwrap();
        let before = t.watches.len();
        t.watches.retain(|w| w.user_id != user_id);
        Ok(t.watches.len() < before)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// AI service
// ────────────────────────────────────────────────────────────────────────────

pub const FAKE_TRANSCRIPT: &str = "I led the migration. We cut latency in half.";
pub const FAKE_FOLLOW_UP: &str = "How did you measure the latency?";
pub const FAKE_OCR_TEXT: &str = "Extracted document text";

#[derive(Default)]
struct AiScript {
    start: VecDeque<Result<InterviewResponse, AiError>>,
    answer: VecDeque<Result<InterviewResponse, AiError>>,
    end: VecDeque<Result<EndInterviewResponse, AiError>>,
    transcribe: VecDeque<Result<String, AiError>>,
    start_inputs: Vec<InterviewInput>,
    answer_inputs: Vec<InterviewInput>,
    end_inputs: Vec<EndInterviewInput>,
    transcribed: Vec<String>,
    ocr_urls: Vec<String>,
}

/// Scripted responses per operation; an empty script answers with a
/// successful default.
#[derive(Default)]
pub struct FakeAi {
    script: Mutex<AiScript>,
    start_gate: Mutex<Option<Arc<Semaphore>>>,
    end_gate: Mutex<Option<Arc<Semaphore>>>,
}

impl FakeAi {
    pub fn push_start(&self, response: Result<InterviewResponse, AiError>) {
        self.script.lock().unwrap().start.push_back(response);
    }

    pub fn push_answer(&self, response: Result<InterviewResponse, AiError>) {
        self.script.lock().unwrap().answer.push_back(response);
    }

    pub fn push_end(&self, response: Result<EndInterviewResponse, AiError>) {
        self.script.lock().unwrap().end.push_back(response);
    }

    pub fn push_transcribe(&self, response: Result<String, AiError>) {
        self.script.lock().unwrap().transcribe.push_back(response);
    }

    pub fn start_inputs(&self) -> Vec<InterviewInput> {
        self.script.lock().unwrap().start_inputs.clone()
    }

    pub fn answer_inputs(&self) -> Vec<InterviewInput> {
        self.script.lock().unwrap().answer_inputs.clone()
    }

    pub fn end_inputs(&self) -> Vec<EndInterviewInput> {
        self.script.lock().unwrap().end_inputs.clone()
    }

    pub fn transcribed(&self) -> Vec<String> {
        self.script.lock().unwrap().transcribed.clone()
    }

    pub fn ocr_urls(&self) -> Vec<String> {
        self.script.lock().unwrap().ocr_urls.clone()
    }

    /// Later `start_interview` calls wait for one permit each.
    pub fn hold_starts(&self) -> Arc<Semaphore> {
        close_gate(&self.start_gate)
    }

    /// Later `end_interview` calls wait for one permit each; the scripted
    /// response is taken after the permit.
    pub fn hold_ends(&self) -> Arc<Semaphore> {
        close_gate(&self.end_gate)
    }
}

fn close_gate(slot: &Mutex<Option<Arc<Semaphore>>>) -> Arc<Semaphore> {
    let gate = Arc::new(Semaphore::new(0));
    *slot.lock().unwrap() = Some(gate.clone());
    gate
}

async fn pass_gate(slot: &Mutex<Option<Arc<Semaphore>>>) {
    let gate = slot.lock().unwrap().clone();
    if let Some(gate) = gate {
        gate.acquire().await.unwrap().forget();
    }
}

#[async_trait]
impl AiService for FakeAi {
    async fn ocr(&self, document_url: &str) -> Result<String, AiError> {
        self.script
            .lock()
            .unwrap()
            .ocr_urls
            .push(document_url.to_string());
        Ok(FAKE_OCR_TEXT.to_string())
    }

    async fn start_interview(
        &self,
        input: &InterviewInput,
    ) -> Result<InterviewResponse, AiError> {
        pass_gate(&self.start_gate).await;
        let mut script = self.script.lock().unwrap();
        script.start_inputs.push(input.clone());
        script.start.pop_front().unwrap_or_else(|| {
            Ok(InterviewResponse {
                status: Some("success".into()),
                converted_text_with_stt: None,
                text_from_tts: (1..=5).map(|i| format!("Question {i}")).collect(),
                talker: vec![0, 1, 0, 1, 0],
            })
        })
    }

    async fn answer_interview(
        &self,
        input: &InterviewInput,
    ) -> Result<InterviewResponse, AiError> {
        let mut script = self.script.lock().unwrap();
        script.answer_inputs.push(input.clone());
        script.answer.pop_front().unwrap_or_else(|| {
            Ok(InterviewResponse {
                status: Some("success".into()),
                converted_text_with_stt: Some(FAKE_TRANSCRIPT.into()),
                text_from_tts: vec![FAKE_FOLLOW_UP.into()],
                talker: vec![0],
            })
        })
    }

    async fn end_interview(
        &self,
        input: &EndInterviewInput,
    ) -> Result<EndInterviewResponse, AiError> {
        pass_gate(&self.end_gate).await;
        let mut script = self.script.lock().unwrap();
        script.end_inputs.push(input.clone());
        script.end.pop_front().unwrap_or_else(|| {
            Ok(EndInterviewResponse {
                status: Some("success".into()),
                scores: Some(BTreeMap::from([("logic".to_string(), 80)])),
                labels: None,
                report: Some("Clear and structured answers.".into()),
            })
        })
    }

    async fn transcribe(&self, audio_url: &str) -> Result<String, AiError> {
        let mut script = self.script.lock().unwrap();
        script.transcribed.push(audio_url.to_string());
        script
            .transcribe
            .pop_front()
            .unwrap_or_else(|| Ok(FAKE_TRANSCRIPT.to_string()))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Push gateway
// ────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakePush {
    sent: Mutex<Vec<(String, BTreeMap<String, String>)>>,
    rejected: Mutex<HashSet<String>>,
}

impl FakePush {
    pub fn sent(&self) -> Vec<(String, BTreeMap<String, String>)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn reject_token(&self, token: &str) {
        self.rejected.lock().unwrap().insert(token.to_string());
    }
}

#[async_trait]
impl PushGateway for FakePush {
    async fn send(&self, token: &str, data: &BTreeMap<String, String>) -> Result<(), PushError> {
        if self.rejected.lock().unwrap().contains(token) {
            return Err(PushError::Unregistered);
        }
        self.sent
            .lock()
            .unwrap()
            .push((token.to_string(), data.clone()));
        Ok(())
    }
}
