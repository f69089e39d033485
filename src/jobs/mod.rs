//! Asynchronous backend jobs for read-assist.
//!
//! This module provides:
//! * [`AsyncJobClient`]: submits uploads and polls jobs to a terminal state.
//! * [`JobHandle`]: exclusive owner of one job's polling timer.
//! * [`Job`] / [`JobKind`] / [`JobStatus`]: the job record and its states.
//! * [`JobBackend`]: async trait over the backend endpoints, implemented by
//!   [`HttpJobBackend`].
//! * [`JobEvent`]: user-facing notifications.
//! * [`JobResult`]: typed view over a completed job's payload.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use read_assist::config::AppConfig;
//! use read_assist::jobs::{AsyncJobClient, JobKind, JobResult};
//! use read_assist::upload::Upload;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = AppConfig::default();
//!     let client = AsyncJobClient::from_config(&config);
//!
//!     let upload = Upload::from_path("lecture.mp4").await?;
//!     let mut handle = client.submit_and_start(upload, JobKind::Summarization).await?;
//!
//!     let job = handle.wait().await;
//!     if let Some(Ok(payload)) = job.outcome() {
//!         println!("{}", JobResult::from_value(payload).download_text());
//!     }
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod client;
pub mod events;
pub mod job;
pub mod result;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use backend::{BackendError, HttpJobBackend, JobBackend, StatusResponse, SubmitResponse};
pub use client::{AsyncJobClient, JobError, JobHandle};
pub use events::{JobEvent, Level};
pub use job::{Job, JobKind, JobStatus, UnknownJobKind};
pub use result::{download_file_name, JobResult, Segment};
