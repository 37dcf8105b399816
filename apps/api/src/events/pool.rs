use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Mutex, Semaphore};
use tracing::{debug, error, warn};

use crate::config::WorkerPoolConfig;

pub type Job = BoxFuture<'static, ()>;

/// Bounded background executor.
///
/// Core workers drain a bounded queue. When the queue is full, up to
/// `max_workers - core_workers` extra tasks are spawned; past that the
/// submitting task runs the job itself, which throttles the producer.
#[derive(Clone)]
pub struct WorkerPool {
    name: &'static str,
    queue: mpsc::Sender<Job>,
    overflow: Arc<Semaphore>,
}

impl WorkerPool {
    pub fn start(name: &'static str, config: WorkerPoolConfig) -> Self {
        let (tx, rx) = mpsc::channel::<Job>(config.queue_capacity.max(1));
        let rx = Arc::new(Mutex::new(rx));

        for worker in 0..config.core_workers {
            let rx = rx.clone();
            tokio::spawn(async move {
                loop {
                    let job = { rx.lock().await.recv().await };
                    match job {
                        Some(job) => run_guarded(name, job).await,
                        None => break,
                    }
                }
                debug!(pool = name, worker, "Worker stopped");
            });
        }

        Self {
            name,
            queue: tx,
            overflow: Arc::new(Semaphore::new(
                config.max_workers.saturating_sub(config.core_workers),
            )),
        }
    }

    pub async fn submit(&self, job: Job) {
        let job = match self.queue.try_send(job) {
            Ok(()) => return,
            Err(TrySendError::Full(job)) => job,
            Err(TrySendError::Closed(job)) => {
                warn!(pool = self.name, "Worker queue closed, running job on caller");
                return run_guarded(self.name, job).await;
            }
        };

        match self.overflow.clone().try_acquire_owned() {
            Ok(permit) => {
                debug!(pool = self.name, "Queue full, spawning overflow worker");
                let name = self.name;
                tokio::spawn(async move {
                    run_guarded(name, job).await;
                    drop(permit);
                });
            }
            Err(_) => {
                warn!(pool = self.name, "Worker pool saturated, running job on caller");
                run_guarded(self.name, job).await;
            }
        }
    }
}

async fn run_guarded(pool: &'static str, job: Job) {
    if AssertUnwindSafe(job).catch_unwind().await.is_err() {
        error!(pool, "Background job panicked");
    }
}
