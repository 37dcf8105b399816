//! In-process event bus for after-commit side effects.
//!
//! Services collect events in an [`Outbox`] while they work and release it
//! only once their persistence call has succeeded. A failed unit of work drops
//! its outbox, so nothing downstream ever reacts to rolled-back data.

use tokio::sync::mpsc;
use tracing::error;

use crate::ai_client::dto::EndInterviewResponse;
use crate::models::resume::AnswerInput;

pub mod dispatch;
pub mod pool;

#[derive(Debug, Clone, PartialEq)]
pub struct ResumeCreated {
    pub resume_id: i64,
    pub user_id: i64,
    pub job_posting_id: i64,
    pub answers: Vec<AnswerInput>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DomainEvent {
    /// Work that used an uploaded object committed; its ticket can be consumed.
    UploadCommitted { object_key: String },
    ResumeCreated(ResumeCreated),
    InterviewEnded {
        interview_id: i64,
        response: EndInterviewResponse,
    },
}

#[derive(Clone)]
pub struct EventBus {
    tx: mpsc::UnboundedSender<DomainEvent>,
}

impl EventBus {
    pub fn channel() -> (EventBus, mpsc::UnboundedReceiver<DomainEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (EventBus { tx }, rx)
    }

    fn publish(&self, event: DomainEvent) {
        if let Err(err) = self.tx.send(event) {
            error!("Event bus closed, dropping {:?}", err.0);
        }
    }
}

/// Events raised inside one unit of work, held until it commits.
#[must_use = "an outbox must be released after commit or dropped on failure"]
#[derive(Debug, Default)]
pub struct Outbox {
    events: Vec<DomainEvent>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: DomainEvent) {
        self.events.push(event);
    }

    /// Publishes the collected events. Call only after the commit succeeded.
    pub fn release(self, bus: &EventBus) {
        for event in self.events {
            bus.publish(event);
        }
    }
}
