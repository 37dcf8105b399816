use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::ai_client::dto::EndInterviewResponse;
use crate::errors::AppError;
use crate::heartbeat::mapper::QuestionHeartbeat;
use crate::heartbeat::service::HeartbeatService;
use crate::interview::repository::InterviewRepository;
use crate::interview::state::{InterviewStatus, Transition};
use crate::models::interview::Interview;
use crate::models::report::{QnaItem, Report, ReportCompletion, ReportStatus};
use crate::report::repository::ReportRepository;
use crate::report::synthesis::{align_labels, build_qna_list, cohort_average};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BpmAt {
    pub bpm: i32,
    pub measured_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportDetail {
    pub report_id: Uuid,
    pub interview_id: i64,
    pub comment: String,
    pub heartbeats: Vec<BpmAt>,
    pub my_scores: BTreeMap<String, i32>,
    pub average_scores: BTreeMap<String, i32>,
    pub qna_list: Vec<QnaItem>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportSummary {
    pub report_id: Uuid,
    pub interview_id: i64,
    pub company_id: i64,
    pub status: ReportStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct ReportService {
    reports: Arc<dyn ReportRepository>,
    interviews: Arc<dyn InterviewRepository>,
    status: InterviewStatus,
    heartbeats: HeartbeatService,
}

impl ReportService {
    pub fn new(
        reports: Arc<dyn ReportRepository>,
        interviews: Arc<dyn InterviewRepository>,
        status: InterviewStatus,
        heartbeats: HeartbeatService,
    ) -> Self {
        Self {
            reports,
            interviews,
            status,
            heartbeats,
        }
    }

    // ── write path ─────────────────────────────────────────────────────────

    /// Creates the interview's report in `CREATING`, or returns the active
    /// one if it already exists.
    pub async fn create_report(&self, interview_id: i64) -> Result<Report, AppError> {
        if let Some(existing) = self.reports.find_active_by_interview(interview_id).await? {
            info!(interview_id, report_id = %existing.id, "Report already exists");
            return Ok(existing);
        }

        let questions = self.interviews.questions_for_interview(interview_id).await?;
        let replies = self.interviews.replies_for_interview(interview_id).await?;
        let qna_list = build_qna_list(&questions, &replies);

        match self.reports.insert(interview_id, qna_list).await? {
            Some(report) => {
                info!(
                    interview_id,
                    report_id = %report.id,
                    items = report.qna_list.len(),
                    "Report created"
                );
                Ok(report)
            }
            // lost a race against a concurrent create
            None => self
                .reports
                .find_active_by_interview(interview_id)
                .await?
                .ok_or_else(|| {
                    AppError::Conflict(format!("report for interview {interview_id} is being created"))
                }),
        }
    }

    /// Applies the final scoring: labels aligned to sentences, report
    /// `COMPLETED`, interview `REPORTED`.
    pub async fn update_report(
        &self,
        interview_id: i64,
        response: &EndInterviewResponse,
    ) -> Result<(), AppError> {
        let report = self
            .reports
            .find_active_by_interview(interview_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("report for interview {interview_id} not found"))
            })?;

        let mut qna_list = report.qna_list;
        align_labels(&mut qna_list, response.labels.as_deref().unwrap_or_default());

        let completion = ReportCompletion {
            scores: response.scores.clone().unwrap_or_default(),
            narrative: response.report.clone().unwrap_or_default(),
            qna_list,
        };
        self.reports.complete(report.id, completion).await?;
        self.status.apply(interview_id, Transition::Report).await?;

        info!(interview_id, report_id = %report.id, "Report completed");
        Ok(())
    }

    /// Background entry point for [`Self::update_report`]. A failure marks
    /// only the report as failed; the interview keeps its `COMPLETED` state.
    pub async fn apply_final_scoring(&self, interview_id: i64, response: EndInterviewResponse) {
        if let Err(err) = self.update_report(interview_id, &response).await {
            error!(interview_id, error = %err, "Report update failed");
            if let Err(mark_err) = self.mark_report_as_failed(interview_id).await {
                error!(interview_id, error = %mark_err, "Could not mark report as failed");
            }
        }
    }

    pub async fn mark_report_as_failed(&self, interview_id: i64) -> Result<(), AppError> {
        match self.reports.find_active_by_interview(interview_id).await? {
            Some(report) => {
                self.reports.set_status(report.id, ReportStatus::Failed).await?;
                warn!(interview_id, report_id = %report.id, "Report marked as failed");
            }
            None => warn!(interview_id, "No report to mark as failed"),
        }
        Ok(())
    }

    // ── read path ──────────────────────────────────────────────────────────

    pub async fn get_report(&self, user_id: i64, report_id: Uuid) -> Result<ReportDetail, AppError> {
        let (report, interview) = self.load_authorized(user_id, report_id).await?;
        if report.status != ReportStatus::Completed {
            return Err(AppError::Conflict(format!("report {report_id} is not ready")));
        }

        let heartbeats = self
            .heartbeats
            .samples(interview.id)
            .await?
            .into_iter()
            .map(|s| BpmAt {
                bpm: s.bpm,
                measured_at: s.measured_at,
            })
            .collect();
        let average_scores = self.cohort_average_for(&interview).await?;

        Ok(ReportDetail {
            report_id: report.id,
            interview_id: interview.id,
            comment: report.narrative,
            heartbeats,
            my_scores: report.scores,
            average_scores,
            qna_list: report.qna_list,
            created_at: report.created_at,
        })
    }

    /// Summaries of the caller's resume-backed interviews, newest first.
    pub async fn list_reports(&self, user_id: i64) -> Result<Vec<ReportSummary>, AppError> {
        let interviews = self.interviews.interviews_for_user(user_id).await?;
        let ids: Vec<i64> = interviews.iter().map(|i| i.id).collect();
        let companies: HashMap<i64, i64> =
            interviews.iter().map(|i| (i.id, i.company_id)).collect();

        let mut summaries: Vec<ReportSummary> = self
            .reports
            .active_for_interviews(&ids)
            .await?
            .into_iter()
            .map(|report| ReportSummary {
                report_id: report.id,
                interview_id: report.interview_id,
                company_id: companies
                    .get(&report.interview_id)
                    .copied()
                    .unwrap_or_default(),
                status: report.status,
                created_at: report.created_at,
            })
            .collect();
        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(summaries)
    }

    pub async fn delete_report(&self, user_id: i64, report_id: Uuid) -> Result<(), AppError> {
        let (report, _) = self.load_authorized(user_id, report_id).await?;
        if !self.reports.soft_delete(report.id).await? {
            return Err(report_not_found(report_id));
        }
        info!(report_id = %report_id, interview_id = report.interview_id, "Report deleted");
        Ok(())
    }

    pub async fn question_heartbeats(
        &self,
        user_id: i64,
        report_id: Uuid,
    ) -> Result<Vec<QuestionHeartbeat>, AppError> {
        let (_, interview) = self.load_authorized(user_id, report_id).await?;
        self.heartbeats.question_averages(&interview).await
    }

    /// Per-category average over every other interview of the same job
    /// posting that has a completed report. Demo interviews have no cohort.
    async fn cohort_average_for(
        &self,
        interview: &Interview,
    ) -> Result<BTreeMap<String, i32>, AppError> {
        let Some(job_posting_id) = interview.job_posting_id else {
            return Ok(BTreeMap::new());
        };

        let others: Vec<i64> = self
            .interviews
            .interview_ids_for_job_posting(job_posting_id)
            .await?
            .into_iter()
            .filter(|&id| id != interview.id)
            .collect();
        let reports = self.reports.active_for_interviews(&others).await?;

        Ok(cohort_average(
            reports
                .iter()
                .filter(|r| r.status == ReportStatus::Completed)
                .map(|r| &r.scores),
        ))
    }

    /// Loads an active report and its interview, checking the caller owns it.
    async fn load_authorized(
        &self,
        user_id: i64,
        report_id: Uuid,
    ) -> Result<(Report, Interview), AppError> {
        let report = self
            .reports
            .find(report_id)
            .await?
            .filter(|r| !r.deletion.is_deleted())
            .ok_or_else(|| report_not_found(report_id))?;

        let interview = self
            .interviews
            .find_interview(report.interview_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("interview {} not found", report.interview_id))
            })?;
        interview.authorize(user_id)?;
        Ok((report, interview))
    }
}

fn report_not_found(report_id: Uuid) -> AppError {
    AppError::NotFound(format!("report {report_id} not found"))
}
