//! User-facing notifications emitted over the life of a job.
//!
//! The client sends a [`JobEvent`] on an optional `mpsc` channel at each
//! step of the lifecycle.  A front-end turns [`JobEvent::notice`] into a
//! toast, a status-bar line or, in the CLI, a log line.
//!
//! [`JobEvent::Progress`] is best-effort: a full channel drops it, since the
//! next tick supersedes it.  Every other event waits for channel capacity so
//! that a lagging consumer still hears how the job ended.  A closed channel
//! never affects polling.

use tokio::sync::mpsc;

use super::job::{JobKind, JobStatus, TRANSPORT_ERROR_MESSAGE};

/// Severity of a notice, for styling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Success,
    Error,
}

/// One lifecycle step of a job.
#[derive(Debug, Clone, PartialEq)]
pub enum JobEvent {
    /// The backend accepted the upload.
    Started { kind: JobKind, id: String },
    /// A poll tick updated the estimate.  No notice; drives progress bars.
    Progress {
        kind: JobKind,
        progress: u8,
        status: JobStatus,
    },
    /// The job completed with a result.
    Completed { kind: JobKind },
    /// The backend reported a failure.
    Failed { kind: JobKind, message: String },
    /// A status request failed; polling has stopped.
    TransportError { kind: JobKind },
    /// The upload was rejected; no job exists.
    SubmissionFailed { kind: JobKind },
}

impl JobEvent {
    /// `true` for the per-tick estimate, the only event that may be dropped.
    pub fn is_progress(&self) -> bool {
        matches!(self, JobEvent::Progress { .. })
    }

    /// Text and severity to show the user, or `None` for silent events.
    pub fn notice(&self) -> Option<(Level, String)> {
        match self {
            JobEvent::Started { kind, .. } => Some((
                Level::Info,
                format!("{} started. Processing in background...", kind.title()),
            )),
            JobEvent::Progress { .. } => None,
            JobEvent::Completed { kind } => Some((
                Level::Success,
                format!("{} completed successfully!", kind.title()),
            )),
            JobEvent::Failed { kind, message } => Some((
                Level::Error,
                format!("{} failed: {message}", kind.title()),
            )),
            JobEvent::TransportError { .. } => {
                Some((Level::Error, TRANSPORT_ERROR_MESSAGE.to_string()))
            }
            JobEvent::SubmissionFailed { kind } => Some((
                Level::Error,
                format!("Error starting {kind}. Please try again."),
            )),
        }
    }
}

/// Optional sender half used by the client.
pub(crate) type EventSender = Option<mpsc::Sender<JobEvent>>;

/// Send without waiting; drop the event if nobody can take it.
fn emit(events: &EventSender, event: JobEvent) {
    if let Some(tx) = events {
        if let Err(e) = tx.try_send(event) {
            log::debug!("job event dropped: {e}");
        }
    }
}

/// Send `event`.  Progress goes through [`emit`]; any other event waits
/// until the consumer has room for it.
pub(crate) async fn deliver(events: &EventSender, event: JobEvent) {
    match events {
        Some(tx) if !event.is_progress() => {
            if let Err(e) = tx.send(event).await {
                log::debug!("job event not delivered, receiver closed: {:?}", e.0);
            }
        }
        _ => emit(events, event),
    }
}
