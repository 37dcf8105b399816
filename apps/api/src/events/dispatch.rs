use futures::FutureExt;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::events::pool::{Job, WorkerPool};
use crate::events::DomainEvent;
use crate::interview::workflow::ResumeWorkflow;
use crate::report::service::ReportService;
use crate::storage::Ticketing;

/// Routes committed events to their handlers. Ticket consumption runs
/// inline; question generation and report updates go to the worker pool.
/// The loop never waits on the pool, so a saturated pool cannot hold back
/// ticket consumption.
pub struct Dispatcher {
    tickets: Ticketing,
    workflow: ResumeWorkflow,
    reports: ReportService,
    pool: WorkerPool,
}

impl Dispatcher {
    pub fn new(
        tickets: Ticketing,
        workflow: ResumeWorkflow,
        reports: ReportService,
        pool: WorkerPool,
    ) -> Self {
        Self {
            tickets,
            workflow,
            reports,
            pool,
        }
    }

    pub fn spawn(self, events: UnboundedReceiver<DomainEvent>) -> JoinHandle<()> {
        tokio::spawn(self.run(events))
    }

    async fn run(self, mut events: UnboundedReceiver<DomainEvent>) {
        while let Some(event) = events.recv().await {
            self.dispatch(event).await;
        }
        info!("Event bus closed, dispatcher stopping");
    }

    async fn dispatch(&self, event: DomainEvent) {
        match event {
            DomainEvent::UploadCommitted { object_key } => {
                if let Err(err) = self.tickets.consume_ticket(&object_key).await {
                    warn!(object_key = %object_key, error = %err, "Ticket consumption failed");
                }
            }
            DomainEvent::ResumeCreated(created) => {
                debug!(resume_id = created.resume_id, "Queueing question generation");
                let workflow = self.workflow.clone();
                self.hand_off(async move { workflow.run(created).await }.boxed());
            }
            DomainEvent::InterviewEnded {
                interview_id,
                response,
            } => {
                debug!(interview_id, "Queueing report update");
                let reports = self.reports.clone();
                self.hand_off(
                    async move { reports.apply_final_scoring(interview_id, response).await }
                        .boxed(),
                );
            }
        }
    }

    /// Submission may fall back to running the job on the submitting task,
    /// which must not be the event loop.
    fn hand_off(&self, job: Job) {
        let pool = self.pool.clone();
        tokio::spawn(async move { pool.submit(job).await });
    }
}
