//! Job record and its state transitions.
//!
//! A [`Job`] is created from a successful submission and then mutated only
//! by status responses.  All transition rules (progress estimate, terminal
//! fields) live here so the polling loop in [`super::client`] stays a thin
//! timer around [`Job::apply_status`].
//!
//! ```text
//! Queued ──processing──▶ Processing ──completed──▶ Completed   (progress = 100)
//!    │                       │
//!    └──────failed───────────┴──────failed───────▶ Failed
//! any non-terminal ──transport error──▶ Failed (local, generic message)
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::config::PollingConfig;

use super::backend::StatusResponse;
use super::client::JobError;

/// Message stored on a job whose status request failed at the transport
/// level.
pub const TRANSPORT_ERROR_MESSAGE: &str = "Error checking task status";

/// Stored when the backend reports `failed` without saying why.
pub const UNKNOWN_ERROR_MESSAGE: &str = "Unknown error";

// ---------------------------------------------------------------------------
// JobKind
// ---------------------------------------------------------------------------

/// The processing a video job asks the backend for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    /// Speech to text.
    Transcription,
    /// Speech in any language to English text.
    Translation,
    /// Concise summary of the audio track.
    Summarization,
}

impl JobKind {
    pub const ALL: [JobKind; 3] = [
        JobKind::Transcription,
        JobKind::Translation,
        JobKind::Summarization,
    ];

    /// Wire name, also the last segment of the submission path.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Transcription => "transcription",
            JobKind::Translation => "translation",
            JobKind::Summarization => "summarization",
        }
    }

    /// Capitalised name used in notifications.
    pub fn title(&self) -> &'static str {
        match self {
            JobKind::Transcription => "Transcription",
            JobKind::Translation => "Translation",
            JobKind::Summarization => "Summarization",
        }
    }

    /// Path of the submission endpoint, relative to the backend base URL.
    pub fn submit_path(&self) -> String {
        format!("/process/{}", self.as_str())
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown job kind {0:?}; expected transcription, translation or summarization")]
pub struct UnknownJobKind(pub String);

impl FromStr for JobKind {
    type Err = UnknownJobKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        JobKind::ALL
            .into_iter()
            .find(|k| k.as_str() == wanted)
            .ok_or_else(|| UnknownJobKind(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// JobStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    /// Parse a status string as sent by the backend.  Unknown strings yield
    /// `None`; callers treat them as "still running".
    pub fn from_wire(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "queued" => Some(JobStatus::Queued),
            "processing" => Some(JobStatus::Processing),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }

    /// `completed` and `failed` end the polling loop.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    pub fn label(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

/// One backend-delegated unit of work.
///
/// Fields are read-only from outside this module; the only way to change a
/// job is through the transition methods, which keep these invariants:
///
/// * `result` is `Some` only when `status == Completed`, `error` only when
///   `status == Failed`, and a terminal job has exactly one of them.
/// * `progress` never decreases, and is 100 once completed.
/// * A terminal job ignores every further update.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Job {
    id: String,
    kind: JobKind,
    status: JobStatus,
    progress: u8,
    result: Option<Value>,
    error: Option<String>,
}

impl Job {
    /// A freshly accepted job, as returned by a successful submission.
    pub fn submitted(id: impl Into<String>, kind: JobKind, polling: &PollingConfig) -> Self {
        let mut progress = polling.submitted_progress.min(100);
        if let Some(confirmed) = polling.confirmed_progress {
            progress = progress.max(confirmed.min(100));
        }
        Self {
            id: id.into(),
            kind,
            status: JobStatus::Queued,
            progress,
            result: None,
            error: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> JobKind {
        self.kind
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn result(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// `None` while running; the payload or the backend's failure once
    /// terminal.
    pub fn outcome(&self) -> Option<Result<&Value, JobError>> {
        match self.status {
            JobStatus::Completed => self.result.as_ref().map(Ok),
            JobStatus::Failed => Some(Err(JobError::JobFailed(
                self.error
                    .clone()
                    .unwrap_or_else(|| UNKNOWN_ERROR_MESSAGE.to_string()),
            ))),
            _ => None,
        }
    }

    /// Apply one status response.
    pub fn apply_status(&mut self, response: StatusResponse, polling: &PollingConfig) {
        if self.is_terminal() {
            log::debug!("job {}: ignoring update for terminal job", self.id);
            return;
        }

        match JobStatus::from_wire(&response.status) {
            Some(JobStatus::Processing) => {
                self.status = JobStatus::Processing;
                self.bump_progress(polling);
            }
            Some(JobStatus::Queued) => {
                self.status = JobStatus::Queued;
            }
            Some(JobStatus::Completed) => {
                self.status = JobStatus::Completed;
                self.progress = 100;
                self.result = Some(response.result.unwrap_or(Value::Null));
                self.error = None;
            }
            Some(JobStatus::Failed) => {
                let message = response
                    .error
                    .filter(|e| !e.trim().is_empty())
                    .unwrap_or_else(|| UNKNOWN_ERROR_MESSAGE.to_string());
                self.fail(message);
            }
            None => {
                log::debug!(
                    "job {}: unrecognised status {:?}, still waiting",
                    self.id,
                    response.status
                );
            }
        }
    }

    /// Mark the job failed after a status request could not be completed.
    pub fn fail_transport(&mut self) {
        if !self.is_terminal() {
            self.fail(TRANSPORT_ERROR_MESSAGE.to_string());
        }
    }

    fn fail(&mut self, message: String) {
        self.status = JobStatus::Failed;
        self.result = None;
        self.error = Some(message);
    }

    fn bump_progress(&mut self, polling: &PollingConfig) {
        let cap = polling.progress_cap.min(100);
        let next = self.progress.saturating_add(polling.progress_step).min(cap);
        self.progress = self.progress.max(next);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
