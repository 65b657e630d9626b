use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use teloxide::types::ChatId;

pub mod size_gate;

pub use size_gate::{SizeGate, SizeVerdict, MAX_UPLOAD_BYTES};

use crate::extractors::ExtractionResult;
use crate::utils::sanitize_title;

/// Performer label attached to every upload
pub const PERFORMER: &str = "YouTube Audio";

/// Longest title sent as audio metadata
pub const MAX_TITLE_CHARS: usize = 200;

/// Timeouts applied to one upload attempt.
///
/// The HTTP client cannot bound each phase on its own: `connect` maps to the
/// connect timeout, the larger of `read`/`write` caps the whole request
/// including the body upload, and `pool` only limits how long an idle pooled
/// connection is kept. There is no separate wait-for-connection bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutTier {
    pub connect: Duration,
    pub read: Duration,
    pub write: Duration,
    pub pool: Duration,
}

impl TimeoutTier {
    /// Same bound on every phase
    pub fn uniform(timeout: Duration) -> Self {
        Self {
            connect: timeout,
            read: timeout,
            write: timeout,
            pool: timeout,
        }
    }

    /// Upper bound for a whole request, body upload included
    pub fn request_timeout(&self) -> Duration {
        self.read.max(self.write)
    }
}

/// Two-tier upload policy: one attempt, then exactly one longer retry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryPolicy {
    /// Per-phase timeout of the first attempt, in seconds
    pub first_attempt_secs: u64,

    /// Per-phase timeout of the single retry, in seconds
    pub retry_secs: u64,
}

impl Default for DeliveryPolicy {
    fn default() -> Self {
        Self {
            first_attempt_secs: 60,
            retry_secs: 520,
        }
    }
}

impl DeliveryPolicy {
    pub fn tiers(&self) -> [TimeoutTier; 2] {
        [
            TimeoutTier::uniform(Duration::from_secs(self.first_attempt_secs)),
            TimeoutTier::uniform(Duration::from_secs(self.retry_secs)),
        ]
    }
}

/// Audio file plus the metadata sent along with it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioUpload {
    pub path: PathBuf,
    pub title: String,
    pub performer: String,
    pub caption: String,
}

impl AudioUpload {
    pub fn from_artifact(artifact: &ExtractionResult, performer: &str) -> Self {
        let title = sanitize_title(&artifact.title, MAX_TITLE_CHARS);
        Self {
            path: artifact.path.clone(),
            caption: format!("🎵 {}", title),
            title,
            performer: performer.to_string(),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum UploadError {
    #[error("upload timed out: {0}")]
    Timeout(String),

    #[error("upload rejected by the API: {0}")]
    Api(String),

    #[error("upload transport error: {0}")]
    Transport(String),
}

/// Final result of handing an artifact to the channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    TooLarge,
    UploadFailed(String),
}

/// Sends one audio file to a chat within the given timeouts
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AudioUploader: Send + Sync {
    async fn send_audio(&self, chat_id: ChatId, audio: &AudioUpload, timeouts: TimeoutTier) -> Result<(), UploadError>;
}

/// Size gate followed by tiered upload attempts
pub struct DeliveryPipeline {
    uploader: Arc<dyn AudioUploader>,
    gate: SizeGate,
    policy: DeliveryPolicy,
}

impl DeliveryPipeline {
    pub fn new(uploader: Arc<dyn AudioUploader>, gate: SizeGate, policy: DeliveryPolicy) -> Self {
        Self { uploader, gate, policy }
    }

    pub fn gate(&self) -> &SizeGate {
        &self.gate
    }

    /// Deliver an artifact to `chat_id`.
    ///
    /// Oversized artifacts are refused without any upload. Otherwise the first
    /// tier is tried and, on any failure, the retry tier once. The caller still
    /// owns the file and must delete it whatever the outcome.
    pub async fn deliver(&self, artifact: &ExtractionResult, chat_id: ChatId) -> DeliveryOutcome {
        if self.gate.check(artifact.size_bytes) == SizeVerdict::Reject {
            tracing::warn!(
                "Artifact {} is {} bytes, over the {} byte limit",
                artifact.path.display(),
                artifact.size_bytes,
                self.gate.limit_bytes()
            );
            return DeliveryOutcome::TooLarge;
        }

        let upload = AudioUpload::from_artifact(artifact, PERFORMER);
        let [first, retry] = self.policy.tiers();

        tracing::info!("Uploading {} to chat {}", upload.path.display(), chat_id.0);
        let first_error = match self.uploader.send_audio(chat_id, &upload, first).await {
            Ok(()) => return DeliveryOutcome::Delivered,
            Err(e) => e,
        };

        tracing::error!(
            "Upload error for chat {}: {}; retrying with {}s timeouts",
            chat_id.0,
            first_error,
            retry.connect.as_secs()
        );

        match self.uploader.send_audio(chat_id, &upload, retry).await {
            Ok(()) => DeliveryOutcome::Delivered,
            Err(retry_error) => {
                tracing::error!("Retry upload failed for chat {}: {}", chat_id.0, retry_error);
                DeliveryOutcome::UploadFailed(retry_error.to_string())
            }
        }
    }
}
