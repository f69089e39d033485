//! `AsyncJobClient`: submit a job, then poll it to a terminal state.
//!
//! # Flow
//!
//! ```text
//! submit(upload, kind) ──POST /process/{kind}──▶ Job { Queued, progress 10 }
//!        │ Err → JobError::Submission   (no job, no timer)
//!        ▼
//! start(job) ──spawn──▶ polling task ── every interval ──▶ GET /process/{id}
//!                           │   processing → +3 (max 90), keep polling
//!                           │   completed  → 100 + result, stop
//!                           │   failed     → error, stop
//!                           │   transport  → failed locally, stop (no retry)
//!                           ▼
//!                  watch::Sender<Job>  ──▶ JobHandle::{snapshot, subscribe, wait}
//! ```
//!
//! The polling task is the only writer of the job.  Ticks are serialized:
//! a tick awaits its status request before the next one is scheduled.
//! [`JobHandle`] owns the task; [`JobHandle::cancel`] (or dropping the
//! handle) stops it and bumps the handle generation so a response already in
//! flight is never published.
//!
//! The generation lives behind a mutex.  The loop holds it across the
//! generation check and the publish, and `cancel` holds it while bumping, so
//! once `cancel` returns no further state reaches the handle.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::config::{AppConfig, PollingConfig};
use crate::upload::Upload;

use super::backend::{BackendError, HttpJobBackend, JobBackend};
use super::events::{deliver, EventSender, JobEvent};
use super::job::{Job, JobKind, JobStatus};

// ---------------------------------------------------------------------------
// JobError
// ---------------------------------------------------------------------------

/// Errors surfaced by the job client.  Each is scoped to a single job.
#[derive(Debug, Error)]
pub enum JobError {
    /// The job could not be created.  Nothing is polling; resubmit to retry.
    #[error("failed to start job: {0}")]
    Submission(#[source] BackendError),

    /// A status request failed.  The job has been marked failed and polling
    /// has stopped.
    #[error("status check failed: {0}")]
    PollTransport(#[source] BackendError),

    /// The backend reported that the job failed.
    #[error("job failed: {0}")]
    JobFailed(String),
}

// ---------------------------------------------------------------------------
// AsyncJobClient
// ---------------------------------------------------------------------------

/// Submits jobs and drives their polling loops.
///
/// Cheap to clone; clones share the backend and the event channel.
#[derive(Clone)]
pub struct AsyncJobClient {
    backend: Arc<dyn JobBackend>,
    polling: PollingConfig,
    events: EventSender,
}

impl AsyncJobClient {
    pub fn new(backend: Arc<dyn JobBackend>, polling: PollingConfig) -> Self {
        Self {
            backend,
            polling,
            events: None,
        }
    }

    /// Client talking HTTP to the backend described in `config`.
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            Arc::new(HttpJobBackend::from_config(&config.backend)),
            config.polling.clone(),
        )
    }

    /// Emit [`JobEvent`]s on `tx` for every job this client touches.
    pub fn with_events(mut self, tx: mpsc::Sender<JobEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn polling(&self) -> &PollingConfig {
        &self.polling
    }

    /// Upload `upload` and create a job of `kind`.
    ///
    /// On failure no [`Job`] exists and nothing will poll.
    pub async fn submit(&self, upload: Upload, kind: JobKind) -> Result<Job, JobError> {
        let file_name = upload.file_name().to_string();
        match self.backend.submit(upload, kind).await {
            Ok(submitted) => {
                let job = Job::submitted(submitted.task_id, kind, &self.polling);
                log::info!("{kind} job {} accepted for {file_name}", job.id());
                deliver(
                    &self.events,
                    JobEvent::Started {
                        kind,
                        id: job.id().to_string(),
                    },
                )
                .await;
                Ok(job)
            }
            Err(e) => {
                log::warn!("{kind} submission of {file_name} failed: {e}");
                deliver(&self.events, JobEvent::SubmissionFailed { kind }).await;
                Err(JobError::Submission(e))
            }
        }
    }

    /// Run a single poll tick against `job`.
    ///
    /// A terminal job is returned as-is without a request.  A transport
    /// failure marks the job failed and is returned as
    /// [`JobError::PollTransport`]; a backend-reported failure is a normal
    /// `Ok(JobStatus::Failed)`.
    pub async fn poll(&self, job: &mut Job) -> Result<JobStatus, JobError> {
        if job.is_terminal() {
            return Ok(job.status());
        }
        let outcome = poll_once(self.backend.as_ref(), &self.polling, job).await;
        deliver(&self.events, job_event(job, &outcome)).await;
        outcome
    }

    /// Spawn the polling loop for `job` and hand back its owner.
    ///
    /// Must be called from within a tokio runtime.  A job that is already
    /// terminal gets a handle with no timer.
    pub fn start(&self, job: Job) -> JobHandle {
        let id = job.id().to_string();
        let (tx, rx) = watch::channel(job.clone());
        let generation: Generation = Arc::new(Mutex::new(0));

        let task = if job.is_terminal() {
            None
        } else {
            log::debug!(
                "job {id}: polling every {} ms",
                self.polling.interval().as_millis()
            );
            Some(tokio::spawn(run_polling(
                Arc::clone(&self.backend),
                self.polling.clone(),
                self.events.clone(),
                job,
                tx,
                Arc::clone(&generation),
                0,
            )))
        };

        JobHandle {
            id,
            snapshot: rx,
            generation,
            task,
        }
    }

    /// [`submit`](Self::submit) followed by [`start`](Self::start).
    pub async fn submit_and_start(
        &self,
        upload: Upload,
        kind: JobKind,
    ) -> Result<JobHandle, JobError> {
        let job = self.submit(upload, kind).await?;
        Ok(self.start(job))
    }
}

// ---------------------------------------------------------------------------
// Polling internals
// ---------------------------------------------------------------------------

async fn poll_once(
    backend: &dyn JobBackend,
    polling: &PollingConfig,
    job: &mut Job,
) -> Result<JobStatus, JobError> {
    if job.is_terminal() {
        return Ok(job.status());
    }

    match backend.status(job.id()).await {
        Ok(response) => {
            if !response.task_id.is_empty() && response.task_id != job.id() {
                log::warn!(
                    "job {}: status response names task {}",
                    job.id(),
                    response.task_id
                );
            }
            job.apply_status(response, polling);
            log::debug!(
                "job {}: {} ({}%)",
                job.id(),
                job.status(),
                job.progress()
            );
            Ok(job.status())
        }
        Err(e) => {
            log::warn!("job {}: status check failed, giving up: {e}", job.id());
            job.fail_transport();
            Err(JobError::PollTransport(e))
        }
    }
}

fn job_event(job: &Job, outcome: &Result<JobStatus, JobError>) -> JobEvent {
    let kind = job.kind();
    match outcome {
        Err(_) => JobEvent::TransportError { kind },
        Ok(JobStatus::Completed) => JobEvent::Completed { kind },
        Ok(JobStatus::Failed) => JobEvent::Failed {
            kind,
            message: job.error().unwrap_or_default().to_string(),
        },
        Ok(status) => JobEvent::Progress {
            kind,
            progress: job.progress(),
            status: *status,
        },
    }
}

/// Per-handle cancellation epoch.
type Generation = Arc<Mutex<u64>>;

fn lock_generation(generation: &Mutex<u64>) -> MutexGuard<'_, u64> {
    generation.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn run_polling(
    backend: Arc<dyn JobBackend>,
    polling: PollingConfig,
    events: EventSender,
    mut job: Job,
    tx: watch::Sender<Job>,
    generation: Generation,
    epoch: u64,
) {
    // `interval` panics on a zero period.
    let period = polling.interval().max(Duration::from_millis(1));
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let outcome = poll_once(backend.as_ref(), &polling, &mut job).await;

        {
            let current = lock_generation(&generation);
            if *current != epoch {
                log::debug!("job {}: discarding poll result after cancellation", job.id());
                return;
            }
            tx.send_replace(job.clone());
        }

        // Published: a cancel from here on leaves a terminal job to finish
        // delivering its notice.
        deliver(&events, job_event(&job, &outcome)).await;

        if job.is_terminal() {
            match job.status() {
                JobStatus::Completed => log::info!("job {}: completed", job.id()),
                _ => log::error!(
                    "job {}: failed: {}",
                    job.id(),
                    job.error().unwrap_or_default()
                ),
            }
            return;
        }
    }
}

// ---------------------------------------------------------------------------
// JobHandle
// ---------------------------------------------------------------------------

/// Exclusive owner of one job's polling timer.
///
/// Dropping the handle cancels polling, so every exit path of the consumer
/// releases the timer.
pub struct JobHandle {
    id: String,
    snapshot: watch::Receiver<Job>,
    generation: Generation,
    task: Option<JoinHandle<()>>,
}

impl JobHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Latest published state of the job.
    pub fn snapshot(&self) -> Job {
        self.snapshot.borrow().clone()
    }

    /// A receiver that is notified on every published update.
    pub fn subscribe(&self) -> watch::Receiver<Job> {
        self.snapshot.clone()
    }

    /// `true` while the polling task is running.
    pub fn is_active(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// `true` once [`cancel`](Self::cancel) has stopped a running loop.
    pub fn is_cancelled(&self) -> bool {
        *lock_generation(&self.generation) > 0
    }

    /// Stop polling.  Idempotent; a no-op once the job is terminal.
    ///
    /// The in-flight status request, if any, is not aborted on the server
    /// side, but its response is discarded.  When the final state has
    /// already been published the task is left to deliver its notice.
    pub fn cancel(&mut self) {
        let Some(task) = self.task.take() else {
            return;
        };
        if task.is_finished() {
            return;
        }
        {
            let mut current = lock_generation(&self.generation);
            if self.snapshot.borrow().is_terminal() {
                return;
            }
            *current += 1;
            task.abort();
        }
        log::info!("job {}: polling cancelled", self.id);
    }

    /// Wait until the job is terminal or polling has stopped, and return the
    /// final snapshot.
    pub async fn wait(&mut self) -> Job {
        loop {
            if self.snapshot.borrow_and_update().is_terminal() {
                break;
            }
            // Err: the polling task ended (cancelled) and dropped the sender.
            if self.snapshot.changed().await.is_err() {
                break;
            }
        }
        self.snapshot()
    }
}

impl Drop for JobHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
