use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub mod youtube;

use crate::credentials::CredentialSet;

pub use youtube::YtDlpExtractor;

/// A transcoded audio file sitting in the work directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionResult {
    /// Local path of the audio file
    pub path: PathBuf,

    /// Title of the source media
    pub title: String,

    /// File size in bytes
    pub size_bytes: u64,
}

/// Terminal extraction failures surfaced to the coordinator
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("no audio stream matched the requested formats")]
    NoMatchingStream,

    #[error("the video requires authentication and no credential set granted access")]
    AuthenticationRequired,

    #[error("network failure during extraction: {0}")]
    NetworkFailure(String),

    #[error("extraction failed: {0}")]
    Unknown(String),
}

impl ExtractionError {
    /// Classify the extraction engine's stderr output.
    ///
    /// Authentication markers win over network markers since YouTube answers
    /// blocked sessions with HTTP errors as well.
    pub fn classify(stderr: &str) -> Self {
        let lower = stderr.to_lowercase();

        const NO_STREAM: &[&str] = &[
            "requested format is not available",
            "no video formats found",
            "no audio formats found",
        ];
        const AUTH: &[&str] = &[
            "sign in to confirm",
            "use --cookies",
            "cookies-from-browser",
            "login required",
            "private video",
            "members-only",
            "confirm your age",
            "http error 403",
        ];
        const NETWORK: &[&str] = &[
            "unable to download webpage",
            "timed out",
            "connection reset",
            "connection refused",
            "temporary failure in name resolution",
            "name or service not known",
            "getaddrinfo failed",
            "network is unreachable",
            "http error 5",
        ];

        if NO_STREAM.iter().any(|m| lower.contains(m)) {
            return Self::NoMatchingStream;
        }
        if AUTH.iter().any(|m| lower.contains(m)) {
            return Self::AuthenticationRequired;
        }

        let detail = last_error_line(stderr);
        if NETWORK.iter().any(|m| lower.contains(m)) {
            return Self::NetworkFailure(detail);
        }

        Self::Unknown(detail)
    }

    /// Short hint shown to the user under the generic failure text
    pub fn user_hint(&self) -> &'static str {
        match self {
            Self::NoMatchingStream => "No downloadable audio stream was found for this video.",
            Self::AuthenticationRequired => "The video needs a signed-in session (private, age-restricted or members-only).",
            Self::NetworkFailure(_) => "The video platform could not be reached.",
            Self::Unknown(_) => "Please try again or check if the video is available.",
        }
    }
}

/// Pick the most relevant line from engine stderr for logs and error detail
fn last_error_line(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().map(str::trim).filter(|l| !l.is_empty()).collect();

    lines
        .iter()
        .rev()
        .find(|l| l.starts_with("ERROR"))
        .or_else(|| lines.last())
        .map(|l| l.to_string())
        .unwrap_or_else(|| "no output from extraction engine".to_string())
}

/// Retry budget handed to the extraction engine.
///
/// These are the engine's own internal retries; the coordinator never
/// retries a failed extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// HTTP connection retries
    pub retries: u32,

    /// Per-fragment retries
    pub fragment_retries: u32,

    /// Retries on known extractor errors
    pub extractor_retries: u32,

    /// Retries on file access errors
    pub file_access_retries: u32,

    /// Seconds to sleep between any two attempts
    pub retry_sleep_secs: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 10,
            fragment_retries: 10,
            extractor_retries: 10,
            file_access_retries: 10,
            retry_sleep_secs: 0,
        }
    }
}

impl RetryPolicy {
    /// Render the policy as engine command-line arguments
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![
            "--retries".to_string(),
            self.retries.to_string(),
            "--fragment-retries".to_string(),
            self.fragment_retries.to_string(),
            "--extractor-retries".to_string(),
            self.extractor_retries.to_string(),
            "--file-access-retries".to_string(),
            self.file_access_retries.to_string(),
        ];

        for kind in ["http", "fragment", "extractor", "file_access"] {
            args.push("--retry-sleep".to_string());
            args.push(format!("{}:{}", kind, self.retry_sleep_secs));
        }

        args
    }
}

/// Where a single request's artifact goes: `<dir>/<stem>.<ext>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactTarget {
    pub dir: PathBuf,
    pub stem: String,
}

impl ArtifactTarget {
    pub fn new(dir: impl Into<PathBuf>, stem: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            stem: stem.into(),
        }
    }

    /// Output template understood by the extraction engine
    pub fn output_template(&self) -> PathBuf {
        self.dir.join(format!("{}.%(ext)s", self.stem))
    }

    pub fn path_with_extension(&self, extension: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", self.stem, extension))
    }

    fn owns(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|name| name.to_str())
            .map(|name| name.starts_with(&format!("{}.", self.stem)))
            .unwrap_or(false)
    }

    /// Delete every file in the work directory that belongs to this target,
    /// including partial downloads. Returns how many files were removed.
    pub async fn sweep(&self) -> usize {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::debug!("Cannot list {} for cleanup: {}", self.dir.display(), e);
                return 0;
            }
        };

        let mut removed = 0;
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if !self.owns(&path) {
                continue;
            }
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    tracing::debug!("Removed leftover file {}", path.display());
                    removed += 1;
                }
                Err(e) => tracing::warn!("Failed to remove leftover file {}: {}", path.display(), e),
            }
        }
        removed
    }
}

/// Extracts audio for a validated URL into a local file
#[async_trait]
pub trait MediaExtractor: Send + Sync {
    /// Run one extraction attempt.
    ///
    /// `credentials` is in priority order; the first set is used.
    async fn extract(
        &self,
        url: &str,
        credentials: &[CredentialSet],
        target: &ArtifactTarget,
    ) -> Result<ExtractionResult, ExtractionError>;

    /// Get the name of this engine
    fn engine_name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_stderr() {
        assert_eq!(
            ExtractionError::classify("ERROR: [youtube] abc: Requested format is not available. Use --list-formats"),
            ExtractionError::NoMatchingStream
        );
        assert_eq!(
            ExtractionError::classify("ERROR: [youtube] abc: Sign in to confirm you're not a bot. Use --cookies-from-browser"),
            ExtractionError::AuthenticationRequired
        );
        assert_eq!(
            ExtractionError::classify("ERROR: [youtube] abc: Private video. Sign in if you've been granted access"),
            ExtractionError::AuthenticationRequired
        );
        assert_eq!(
            ExtractionError::classify(
                "WARNING: retrying\nERROR: [youtube] abc: Unable to download webpage: <urlopen error [Errno -3] Temporary failure in name resolution>"
            ),
            ExtractionError::NetworkFailure(
                "ERROR: [youtube] abc: Unable to download webpage: <urlopen error [Errno -3] Temporary failure in name resolution>"
                    .to_string()
            )
        );
        assert_eq!(
            ExtractionError::classify("ERROR: Postprocessing: ffprobe and ffmpeg not found"),
            ExtractionError::Unknown("ERROR: Postprocessing: ffprobe and ffmpeg not found".to_string())
        );
        assert_eq!(
            ExtractionError::classify(""),
            ExtractionError::Unknown("no output from extraction engine".to_string())
        );
    }

    #[test]
    fn test_default_retry_policy_is_bounded_with_zero_sleep() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.retries, 10);
        assert_eq!(policy.fragment_retries, 10);
        assert_eq!(policy.extractor_retries, 10);
        assert_eq!(policy.file_access_retries, 10);
        assert_eq!(policy.retry_sleep_secs, 0);

        let args = policy.to_args();
        let joined = args.join(" ");
        assert!(joined.contains("--retries 10"));
        assert!(joined.contains("--fragment-retries 10"));
        assert!(joined.contains("--retry-sleep http:0"));
        assert!(joined.contains("--retry-sleep file_access:0"));
        assert_eq!(args.iter().filter(|a| *a == "--retry-sleep").count(), 4);
    }

    #[tokio::test]
    async fn test_sweep_only_removes_own_files() {
        let dir = tempfile::tempdir().unwrap();
        let target = ArtifactTarget::new(dir.path(), "req-1");

        fs_err::write(target.path_with_extension("mp3"), b"a").unwrap();
        fs_err::write(target.path_with_extension("webm.part"), b"b").unwrap();
        fs_err::write(dir.path().join("req-10.mp3"), b"c").unwrap();
        fs_err::write(dir.path().join("other.mp3"), b"d").unwrap();

        assert_eq!(target.sweep().await, 2);
        assert!(!target.path_with_extension("mp3").exists());
        assert!(dir.path().join("req-10.mp3").exists());
        assert!(dir.path().join("other.mp3").exists());
    }

    #[test]
    fn test_output_template() {
        let target = ArtifactTarget::new("downloads", "abc");
        assert_eq!(target.output_template(), PathBuf::from("downloads").join("abc.%(ext)s"));
    }
}
