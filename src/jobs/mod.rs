//! In-process job queue with at-least-once delivery.
//!
//! Jobs go through an unbounded mpsc channel; a dispatcher task runs each one
//! on its own tokio task, with at most `workers` running at a time. A job
//! whose handler fails (or panics) is re-sent after `retry_delay` until `max_attempts`
//! is reached, then dropped with an error log.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Semaphore, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::JobConfig;
use crate::error::{Error, JobError};
use crate::unsubscribe::{UnsubscribeDispatchHandler, UnsubscribeRequest};

/// Runs one job. An `Err` asks for a retry.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn run(&self, request: UnsubscribeRequest) -> Result<(), Error>;
}

#[async_trait]
impl JobHandler for UnsubscribeDispatchHandler {
    async fn run(&self, request: UnsubscribeRequest) -> Result<(), Error> {
        self.handle(request).await.map(|_| ())
    }
}

#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Queue a request. Returns the job id.
    async fn enqueue(&self, request: UnsubscribeRequest) -> Result<Uuid, JobError>;
}

#[derive(Debug, Clone, Copy)]
struct Job {
    id: Uuid,
    request: UnsubscribeRequest,
    attempt: u32,
}

/// Tokio-backed [`JobQueue`].
pub struct LocalJobQueue {
    tx: mpsc::UnboundedSender<Job>,
    /// Jobs enqueued and not yet finished (retries included).
    pending: Arc<watch::Sender<usize>>,
    closed: AtomicBool,
    dispatcher: JoinHandle<()>,
}

impl LocalJobQueue {
    /// Start the dispatcher.
    pub fn start(handler: Arc<dyn JobHandler>, config: &JobConfig) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
        let (pending, _) = watch::channel(0usize);
        let pending = Arc::new(pending);
        let semaphore = Arc::new(Semaphore::new(config.workers.max(1)));
        let max_attempts = config.max_attempts.max(1);
        let retry_delay = config.retry_delay;

        let retry_tx = tx.clone();
        let pending_done = Arc::clone(&pending);
        let dispatcher = tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                let Ok(permit) = semaphore.clone().acquire_owned().await else {
                    break;
                };
                let handler = Arc::clone(&handler);
                let retry_tx = retry_tx.clone();
                let pending = Arc::clone(&pending_done);

                tokio::spawn(async move {
                    let run = tokio::spawn(async move { handler.run(job.request).await });
                    let outcome = match run.await {
                        Ok(outcome) => outcome,
                        Err(e) => Err(JobError::Aborted {
                            id: job.id.to_string(),
                            reason: e.to_string(),
                        }
                        .into()),
                    };
                    drop(permit);
                    settle(job, outcome, max_attempts, retry_delay, &retry_tx, &pending).await;
                });
            }
            debug!("Job dispatcher stopped");
        });

        info!(
            workers = config.workers,
            max_attempts, "Job queue started"
        );

        Self {
            tx,
            pending,
            closed: AtomicBool::new(false),
            dispatcher,
        }
    }

    /// Number of jobs not yet finished.
    pub fn pending(&self) -> usize {
        *self.pending.borrow()
    }

    /// Wait until every queued job, retries included, has finished.
    pub async fn drain(&self) {
        let mut rx = self.pending.subscribe();
        if let Err(e) = rx.wait_for(|n| *n == 0).await {
            warn!(error = %e, "Pending counter closed while draining");
        }
    }

    /// Refuse new jobs, wait for the queued ones and stop the dispatcher.
    pub async fn shutdown(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.drain().await;
        self.dispatcher.abort();
        info!("Job queue shut down");
    }
}

/// Retry, or account for a finished job.
async fn settle(
    job: Job,
    outcome: Result<(), Error>,
    max_attempts: u32,
    retry_delay: Duration,
    retry_tx: &mpsc::UnboundedSender<Job>,
    pending: &watch::Sender<usize>,
) {
    match outcome {
        Ok(()) => {
            debug!(job_id = %job.id, email_id = job.request.email_id, attempt = job.attempt, "Job finished");
        }
        Err(e) if job.attempt < max_attempts => {
            warn!(
                job_id = %job.id,
                email_id = job.request.email_id,
                attempt = job.attempt,
                max_attempts,
                error = %e,
                "Job failed, retrying"
            );
            tokio::time::sleep(retry_delay).await;
            let retry = Job {
                attempt: job.attempt + 1,
                ..job
            };
            if retry_tx.send(retry).is_ok() {
                return;
            }
            error!(job_id = %job.id, "Job queue closed before retry");
        }
        Err(e) => {
            let exhausted = JobError::Exhausted {
                id: job.id.to_string(),
                attempts: job.attempt,
                reason: e.to_string(),
            };
            error!(email_id = job.request.email_id, "{}", exhausted);
        }
    }
    pending.send_modify(|n| *n = n.saturating_sub(1));
}

#[async_trait]
impl JobQueue for LocalJobQueue {
    async fn enqueue(&self, request: UnsubscribeRequest) -> Result<Uuid, JobError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(JobError::QueueClosed);
        }
        let job = Job {
            id: Uuid::new_v4(),
            request,
            attempt: 1,
        };
        self.pending.send_modify(|n| *n += 1);
        if self.tx.send(job).is_err() {
            self.pending.send_modify(|n| *n = n.saturating_sub(1));
            return Err(JobError::QueueClosed);
        }
        debug!(job_id = %job.id, email_id = request.email_id, "Job enqueued");
        Ok(job.id)
    }
}

impl Drop for LocalJobQueue {
    fn drop(&mut self) {
        self.dispatcher.abort();
    }
}
