//! Typed view over a completed job's payload.
//!
//! The backend owns the result shape, so [`JobResult`] is lenient: every
//! field is optional and unknown fields are kept in `extra`.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::job::JobKind;

const NO_CONTENT: &str = "No content generated";

/// One timed transcription segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobResult {
    pub text: Option<String>,
    pub segments: Option<Vec<Segment>>,
    pub language: Option<String>,
    pub confidence: Option<f64>,
    pub summary: Option<String>,
    pub translation: Option<String>,
    pub transcript: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl JobResult {
    /// Interpret a raw payload.  Anything that is not an object (including
    /// the `null` stored for an empty completion) yields an empty result.
    pub fn from_value(value: &Value) -> Self {
        if !value.is_object() {
            return Self::default();
        }
        match serde_json::from_value(value.clone()) {
            Ok(result) => result,
            Err(e) => {
                log::warn!("result payload did not match the expected shape: {e}");
                Self::default()
            }
        }
    }

    /// Text offered for download: `text`, else `summary`, else
    /// `translation`, else empty.
    pub fn download_text(&self) -> &str {
        [&self.text, &self.summary, &self.translation]
            .into_iter()
            .flatten()
            .map(String::as_str)
            .find(|s| !s.is_empty())
            .unwrap_or("")
    }

    /// The summary or translation, for display under the transcript.
    pub fn headline(&self) -> &str {
        [&self.summary, &self.translation]
            .into_iter()
            .flatten()
            .map(String::as_str)
            .find(|s| !s.is_empty())
            .unwrap_or(NO_CONTENT)
    }

    pub fn confidence_percent(&self) -> Option<u32> {
        self.confidence
            .filter(|c| c.is_finite() && *c > 0.0)
            .map(|c| (c * 100.0).round() as u32)
    }

    pub fn segment_count(&self) -> usize {
        self.segments.as_ref().map_or(0, Vec::len)
    }

    /// Write [`download_text`](Self::download_text) to `path`.
    pub async fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, self.download_text()).await
    }
}

/// Default file name for a downloaded result.
pub fn download_file_name(kind: JobKind) -> String {
    format!("{kind}_result.txt")
}
