//! Interview lifecycle.
//!
//! ```text
//! CREATING ──► NOT_STARTED ──► IN_PROGRESS ──► COMPLETED ──► REPORTED
//!     │                             │
//!     └──────────► FAILED ◄─────────┘
//! ```
//!
//! Every transition is a conditional update on the current status, so two
//! racing requests cannot both move the same interview.

use std::sync::Arc;

use tracing::{info, warn};

use crate::errors::AppError;
use crate::interview::repository::InterviewRepository;
use crate::models::interview::ProgressStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Questions generated and their audio verified.
    MarkReady,
    /// The candidate fetched the question audio.
    Start,
    /// The candidate ended the interview and final scoring succeeded.
    Complete,
    /// The report update landed.
    Report,
    Fail,
}

impl Transition {
    pub fn sources(self) -> &'static [ProgressStatus] {
        match self {
            Transition::MarkReady => &[ProgressStatus::Creating],
            Transition::Start => &[ProgressStatus::NotStarted],
            Transition::Complete => &[ProgressStatus::InProgress],
            Transition::Report => &[ProgressStatus::Completed],
            Transition::Fail => &[ProgressStatus::Creating, ProgressStatus::InProgress],
        }
    }

    pub fn target(self) -> ProgressStatus {
        match self {
            Transition::MarkReady => ProgressStatus::NotStarted,
            Transition::Start => ProgressStatus::InProgress,
            Transition::Complete => ProgressStatus::Completed,
            Transition::Report => ProgressStatus::Reported,
            Transition::Fail => ProgressStatus::Failed,
        }
    }
}

/// The only writer of interview status.
///
/// Each call is its own statement on the pool, outside any caller's unit of
/// work, so a failure mark survives whatever the caller does next.
#[derive(Clone)]
pub struct InterviewStatus {
    interviews: Arc<dyn InterviewRepository>,
}

impl InterviewStatus {
    pub fn new(interviews: Arc<dyn InterviewRepository>) -> Self {
        Self { interviews }
    }

    pub async fn apply(&self, interview_id: i64, transition: Transition) -> Result<(), AppError> {
        let target = transition.target();
        if self
            .interviews
            .update_status(interview_id, transition.sources(), target)
            .await?
        {
            info!(interview_id, status = %target, "Interview status changed");
            return Ok(());
        }

        match self.interviews.find_interview(interview_id).await? {
            None => Err(AppError::NotFound(format!(
                "interview {interview_id} not found"
            ))),
            Some(interview) => Err(AppError::Conflict(format!(
                "interview {interview_id} is {} and cannot move to {target}",
                interview.status
            ))),
        }
    }

    pub async fn mark_failed(&self, interview_id: i64) -> Result<(), AppError> {
        self.apply(interview_id, Transition::Fail).await
    }

    /// Used when the pipeline failed before the interview row was known.
    pub async fn mark_failed_by_resume(&self, resume_id: i64) -> Result<(), AppError> {
        match self.interviews.find_interview_by_resume(resume_id).await? {
            Some(interview) => self.mark_failed(interview.id).await,
            None => {
                warn!(resume_id, "No interview to mark failed for resume");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::interview::NewInterview;
    use crate::testing::MemoryStore;

    use crate::models::interview::ProgressStatus::*;

    fn can_transition(from: ProgressStatus, to: ProgressStatus) -> bool {
        [
            Transition::MarkReady,
            Transition::Start,
            Transition::Complete,
            Transition::Report,
            Transition::Fail,
        ]
        .iter()
        .any(|t| t.target() == to && t.sources().contains(&from))
    }

    #[test]
    fn test_transition_graph_is_exact() {
        let allowed = [
            (Creating, NotStarted),
            (Creating, Failed),
            (NotStarted, InProgress),
            (InProgress, Completed),
            (InProgress, Failed),
            (Completed, Reported),
        ];
        for from in ProgressStatus::ALL {
            for to in ProgressStatus::ALL {
                assert_eq!(
                    can_transition(from, to),
                    allowed.contains(&(from, to)),
                    "{from} -> {to}"
                );
            }
        }
    }

    #[test]
    fn test_terminal_states_have_no_exits() {
        for to in ProgressStatus::ALL {
            assert!(!can_transition(Failed, to));
            assert!(!can_transition(Reported, to));
        }
    }

    async fn seeded(status: ProgressStatus) -> (InterviewStatus, Arc<MemoryStore>, i64) {
        let store = Arc::new(MemoryStore::default());
        let interview = store
            .create_interview(NewInterview {
                resume_id: None,
                company_id: 1,
                follow_up_enabled: false,
                status,
            })
            .await
            .unwrap();
        (InterviewStatus::new(store.clone()), store, interview.id)
    }

    #[tokio::test]
    async fn test_wrong_state_is_a_conflict_and_changes_nothing() {
        for status in [Creating, NotStarted, Completed, Reported, Failed] {
            let (machine, store, id) = seeded(status).await;
            let err = machine.apply(id, Transition::Complete).await.unwrap_err();
            assert!(matches!(err, AppError::Conflict(_)), "{status}");
            assert_eq!(store.interview(id).status, status);
        }
    }

    #[tokio::test]
    async fn test_valid_transition_moves_status() {
        let (machine, store, id) = seeded(InProgress).await;
        machine.apply(id, Transition::Complete).await.unwrap();
        assert_eq!(store.interview(id).status, Completed);
        machine.apply(id, Transition::Report).await.unwrap();
        assert_eq!(store.interview(id).status, Reported);
    }

    #[tokio::test]
    async fn test_unknown_interview_is_not_found() {
        let (machine, _, _) = seeded(Creating).await;
        assert!(matches!(
            machine.apply(999, Transition::MarkReady).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_mark_failed_by_resume_without_interview_is_quiet() {
        let (machine, _, _) = seeded(Creating).await;
        machine.mark_failed_by_resume(12345).await.unwrap();
    }
}
