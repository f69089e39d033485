//! Upload payloads sent to the backend submission endpoint.
//!
//! An [`Upload`] is the raw file bytes plus the name and MIME type the
//! backend sees in the multipart form.  [`Upload::validate_video`] applies
//! the same acceptance rules the dashboard applies before a video job is
//! started: a known video type and a size limit.

use std::path::Path;

use thiserror::Error;

/// MIME types accepted as video uploads.  Matched as substrings so that
/// parameters such as `; codecs=...` do not cause a rejection.
const VIDEO_MIME_TYPES: &[&str] = &[
    "video/mp4",
    "video/avi",
    "video/mov",
    "video/quicktime",
    "video/x-msvideo",
    "video/mkv",
    "video/webm",
];

/// File extensions accepted as video uploads (lower-case, no dot).
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv", "webm"];

const FALLBACK_MIME: &str = "application/octet-stream";

// ---------------------------------------------------------------------------
// UploadError
// ---------------------------------------------------------------------------

/// Errors raised while loading or validating an upload.
#[derive(Debug, Error)]
pub enum UploadError {
    /// The file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Neither the MIME type nor the extension identifies a supported video.
    #[error("invalid file type; select a video file (MP4, AVI, MOV, MKV, WebM)")]
    UnsupportedType,

    /// The payload exceeds the configured size limit.
    #[error("file too large ({size} bytes); the limit is {limit} bytes")]
    TooLarge { size: u64, limit: u64 },
}

// ---------------------------------------------------------------------------
// Upload
// ---------------------------------------------------------------------------

/// A binary payload ready to be submitted as a job.
#[derive(Debug, Clone, PartialEq)]
pub struct Upload {
    file_name: String,
    mime: String,
    bytes: Vec<u8>,
}

impl Upload {
    pub fn new(file_name: impl Into<String>, mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            mime: mime.into(),
            bytes,
        }
    }

    /// Read `path` into memory.  The MIME type is derived from the file
    /// extension.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, UploadError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| io_error(path, source))?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        let mime = mime_for_extension(&file_name);

        log::debug!("loaded upload {file_name} ({} bytes, {mime})", bytes.len());
        Ok(Self::new(file_name, mime, bytes))
    }

    /// Like [`from_path`](Self::from_path), but a file whose on-disk size
    /// exceeds `max_bytes` is rejected from its metadata before any byte is
    /// read.
    pub async fn from_path_limited(
        path: impl AsRef<Path>,
        max_bytes: u64,
    ) -> Result<Self, UploadError> {
        let path = path.as_ref();
        let size = tokio::fs::metadata(path)
            .await
            .map_err(|source| io_error(path, source))?
            .len();
        if size > max_bytes {
            return Err(UploadError::TooLarge {
                size,
                limit: max_bytes,
            });
        }
        Self::from_path(path).await
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Consume the upload, returning `(file_name, mime, bytes)`.
    pub fn into_parts(self) -> (String, String, Vec<u8>) {
        (self.file_name, self.mime, self.bytes)
    }

    /// Check that this upload is a supported video no larger than `max_bytes`.
    ///
    /// The type check passes when either the MIME type or the file extension
    /// is recognised; browsers and file managers frequently report a generic
    /// MIME type for `.mkv` and `.mov`.
    pub fn validate_video(&self, max_bytes: u64) -> Result<(), UploadError> {
        let mime = self.mime.to_ascii_lowercase();
        let mime_ok = VIDEO_MIME_TYPES.iter().any(|t| mime.contains(t));
        let ext_ok = extension(&self.file_name)
            .is_some_and(|ext| VIDEO_EXTENSIONS.contains(&ext.as_str()));

        if !mime_ok && !ext_ok {
            return Err(UploadError::UnsupportedType);
        }

        if self.len() > max_bytes {
            return Err(UploadError::TooLarge {
                size: self.len(),
                limit: max_bytes,
            });
        }

        Ok(())
    }
}

fn io_error(path: &Path, source: std::io::Error) -> UploadError {
    UploadError::Io {
        path: path.display().to_string(),
        source,
    }
}

fn extension(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
}

fn mime_for_extension(file_name: &str) -> &'static str {
    match extension(file_name).as_deref() {
        Some("mp4") => "video/mp4",
        Some("avi") => "video/x-msvideo",
        Some("mov") => "video/quicktime",
        Some("mkv") => "video/x-matroska",
        Some("webm") => "video/webm",
        _ => FALLBACK_MIME,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const LIMIT: u64 = 100 * 1024 * 1024;

    #[test]
    fn accepts_known_mime_type() {
        let upload = Upload::new("clip", "video/mp4", vec![0; 16]);
        assert!(upload.validate_video(LIMIT).is_ok());
    }

    #[test]
    fn accepts_known_extension_with_generic_mime() {
        let upload = Upload::new("Lecture.MKV", FALLBACK_MIME, vec![0; 16]);
        assert!(upload.validate_video(LIMIT).is_ok());
    }

    #[test]
    fn rejects_non_video() {
        let upload = Upload::new("notes.pdf", "application/pdf", vec![0; 16]);
        assert!(matches!(
            upload.validate_video(LIMIT),
            Err(UploadError::UnsupportedType)
        ));
    }

    #[test]
    fn rejects_oversized_video() {
        let upload = Upload::new("clip.mp4", "video/mp4", vec![0; 11]);
        match upload.validate_video(10) {
            Err(UploadError::TooLarge { size, limit }) => {
                assert_eq!(size, 11);
                assert_eq!(limit, 10);
            }
            other => panic!("expected TooLarge, got {other:?}"),
        }
    }

    #[test]
    fn size_limit_is_inclusive() {
        let upload = Upload::new("clip.webm", "video/webm", vec![0; 10]);
        assert!(upload.validate_video(10).is_ok());
    }

    #[tokio::test]
    async fn from_path_reads_bytes_and_guesses_mime() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("talk.mov");
        std::fs::write(&path, b"moov").expect("write");

        let upload = Upload::from_path(&path).await.expect("load");
        assert_eq!(upload.file_name(), "talk.mov");
        assert_eq!(upload.mime(), "video/quicktime");
        assert_eq!(upload.bytes(), b"moov");
        assert!(upload.validate_video(LIMIT).is_ok());
    }

    #[tokio::test]
    async fn from_path_missing_file_is_io_error() {
        let dir = tempdir().expect("temp dir");
        let err = Upload::from_path(dir.path().join("missing.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::Io { .. }));
    }

    /// A sparse 1 GiB file is turned away on its metadata alone.
    #[tokio::test]
    async fn oversized_file_is_rejected_before_reading() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("huge.mp4");
        let file = std::fs::File::create(&path).expect("create");
        file.set_len(1 << 30).expect("set_len");

        match Upload::from_path_limited(&path, LIMIT).await {
            Err(UploadError::TooLarge { size, limit }) => {
                assert_eq!(size, 1 << 30);
                assert_eq!(limit, LIMIT);
            }
            other => panic!("expected TooLarge, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn from_path_limited_loads_files_within_limit() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("short.webm");
        std::fs::write(&path, [0u8; 10]).expect("write");

        let upload = Upload::from_path_limited(&path, 10).await.expect("load");
        assert_eq!(upload.len(), 10);
        assert_eq!(upload.mime(), "video/webm");
    }

    #[tokio::test]
    async fn from_path_limited_missing_file_is_io_error() {
        let dir = tempdir().expect("temp dir");
        let err = Upload::from_path_limited(dir.path().join("missing.mp4"), LIMIT)
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::Io { .. }));
    }
}
