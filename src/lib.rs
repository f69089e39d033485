//! read-assist: client for the accessibility backend's asynchronous
//! video jobs (transcription, translation, summarization).
//!
//! * [`config`]: TOML settings and platform paths.
//! * [`upload`]: loading and validating files before submission.
//! * [`jobs`]: submitting jobs and polling them to completion.

pub mod config;
pub mod jobs;
pub mod upload;
