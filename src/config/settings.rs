//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across tasks.
//! Every section is `#[serde(default)]`, so a hand-written `settings.toml`
//! only needs the keys it wants to change.

use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;

/// Environment variable that overrides [`BackendConfig::base_url`].
pub const BACKEND_URL_ENV: &str = "READ_ASSIST_BACKEND_URL";

// ---------------------------------------------------------------------------
// BackendConfig
// ---------------------------------------------------------------------------

/// Connection settings for the processing backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL of the backend, without a trailing slash
    /// (e.g. `http://localhost:8000`).
    pub base_url: String,
    /// Bearer token, or `None` for backends that need no authentication.
    pub api_key: Option<String>,
    /// Per-request timeout in seconds.  Applies to the upload as well, so
    /// it must cover the largest accepted video.  `0` disables the timeout.
    pub timeout_secs: u64,
}

impl BackendConfig {
    /// The per-request timeout, or `None` when `timeout_secs` is 0.
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".into(),
            api_key: None,
            timeout_secs: 120,
        }
    }
}

// ---------------------------------------------------------------------------
// PollingConfig
// ---------------------------------------------------------------------------

/// Timing and progress-estimate settings for the job polling loop.
///
/// The backend never reports a real percentage, so progress is a
/// client-side estimate:
///
/// | Event                    | Progress                                  |
/// |--------------------------|-------------------------------------------|
/// | submission accepted      | `submitted_progress`                      |
/// | identifier confirmed     | `confirmed_progress` (when set)           |
/// | `processing` poll        | `+progress_step`, capped at `progress_cap`|
/// | `completed` poll         | 100                                       |
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Fixed period between status requests, in milliseconds.
    pub interval_ms: u64,
    /// Progress reported as soon as the backend accepts the upload.
    pub submitted_progress: u8,
    /// Optional floor applied once the backend has returned a task id.
    pub confirmed_progress: Option<u8>,
    /// Increment applied on every `processing` response.
    pub progress_step: u8,
    /// Ceiling for the estimate while the job is still running.
    pub progress_cap: u8,
}

impl PollingConfig {
    /// The polling period as a [`Duration`].
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: 3_000,
            submitted_progress: 10,
            confirmed_progress: None,
            progress_step: 3,
            progress_cap: 90,
        }
    }
}

// ---------------------------------------------------------------------------
// UploadConfig
// ---------------------------------------------------------------------------

/// Limits applied to files before they are sent to the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Largest accepted upload in bytes.
    pub max_bytes: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_bytes: 100 * 1024 * 1024,
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use read_assist::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
///
/// // Modify and save
/// // config.save().unwrap();
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Backend connection settings.
    pub backend: BackendConfig,
    /// Polling loop settings.
    pub polling: PollingConfig,
    /// Upload limits.
    pub upload: UploadConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`, then
    /// apply the [`BACKEND_URL_ENV`] override.
    ///
    /// Returns the defaults when the file does not exist yet (first-run
    /// scenario) so callers never need to special-case a missing file.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&AppPaths::new().settings_file)?;
        config.apply_backend_url_override(std::env::var(BACKEND_URL_ENV).ok());
        Ok(config)
    }

    /// Load from an explicit path.  No environment overrides are applied.
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path.
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Replace the backend base URL when `value` is a non-blank string.
    /// A trailing slash is stripped so endpoint paths can be appended.
    pub fn apply_backend_url_override(&mut self, value: Option<String>) {
        if let Some(url) = value {
            let url = url.trim().trim_end_matches('/');
            if !url.is_empty() {
                self.backend.base_url = url.to_string();
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
