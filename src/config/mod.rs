//! Configuration module for read-assist.
//!
//! Provides `AppConfig` (top-level settings), sub-configs for the backend
//! connection, the polling loop and upload limits, `AppPaths` for
//! cross-platform directories, and TOML persistence via `AppConfig::load` /
//! `AppConfig::save`.

pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{AppConfig, BackendConfig, PollingConfig, UploadConfig, BACKEND_URL_ENV};
