use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use teloxide::types::{ChatId, MessageId};
use tracing::Instrument;
use uuid::Uuid;

pub mod artifact;

pub use artifact::Artifact;

use crate::config::Config;
use crate::credentials::CredentialSupplier;
use crate::delivery::{DeliveryOutcome, DeliveryPipeline};
use crate::extractors::{ArtifactTarget, ExtractionError, MediaExtractor};
use crate::utils::format_file_size;
use crate::validation::{self, ValidationResult};

pub const PROCESSING_TEXT: &str =
    "⏳ Processing your request...\nThis may take a few minutes depending on the video length.";

pub const INVALID_URL_TEXT: &str =
    "❌ Please send a valid YouTube URL.\n\nExample: https://www.youtube.com/watch?v=...";

pub const DELIVERED_TEXT: &str = "✅ Successfully processed and sent!";

/// One inbound message routed to the pipeline
#[derive(Debug, Clone)]
pub struct Request {
    /// Generated per request; also names the artifact on disk
    pub id: Uuid,
    pub user_id: u64,
    pub chat_id: ChatId,
    pub text: String,
    pub received_at: DateTime<Utc>,
}

impl Request {
    pub fn new(user_id: u64, chat_id: ChatId, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            chat_id,
            text: text.into(),
            received_at: Utc::now(),
        }
    }
}

/// Pipeline position of a request, used for tracing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Received,
    Validating,
    Rejected,
    Extracting,
    ExtractFailed,
    SizeChecking,
    TooLarge,
    Delivering,
    Delivered,
    DeliveryFailed,
}

impl RequestState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestState::Received => "received",
            RequestState::Validating => "validating",
            RequestState::Rejected => "rejected",
            RequestState::Extracting => "extracting",
            RequestState::ExtractFailed => "extract_failed",
            RequestState::SizeChecking => "size_checking",
            RequestState::TooLarge => "too_large",
            RequestState::Delivering => "delivering",
            RequestState::Delivered => "delivered",
            RequestState::DeliveryFailed => "delivery_failed",
        }
    }
}

/// Terminal state of a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestOutcome {
    Rejected,
    ExtractFailed(ExtractionError),
    TooLarge { size_bytes: u64, limit_bytes: u64 },
    Delivered,
    DeliveryFailed(String),
}

impl RequestOutcome {
    pub fn state(&self) -> RequestState {
        match self {
            RequestOutcome::Rejected => RequestState::Rejected,
            RequestOutcome::ExtractFailed(_) => RequestState::ExtractFailed,
            RequestOutcome::TooLarge { .. } => RequestState::TooLarge,
            RequestOutcome::Delivered => RequestState::Delivered,
            RequestOutcome::DeliveryFailed(_) => RequestState::DeliveryFailed,
        }
    }

    /// The single status text the user sees for this outcome
    pub fn user_message(&self) -> String {
        match self {
            RequestOutcome::Rejected => INVALID_URL_TEXT.to_string(),
            RequestOutcome::ExtractFailed(error) => format!(
                "❌ Sorry, there was an error processing your request.\n{}",
                error.user_hint()
            ),
            RequestOutcome::TooLarge { size_bytes, limit_bytes } => format!(
                "❌ Sorry, this audio file is too large for Telegram ({}, limit {}).\nPlease try a shorter video.",
                format_file_size(*size_bytes),
                format_file_size(*limit_bytes)
            ),
            RequestOutcome::Delivered => DELIVERED_TEXT.to_string(),
            RequestOutcome::DeliveryFailed(_) => {
                "❌ Sorry, the audio could not be uploaded after two attempts.\nPlease try again later.".to_string()
            }
        }
    }
}

#[derive(thiserror::Error, Debug)]
#[error("chat API error: {0}")]
pub struct ChannelError(pub String);

/// Text side of the chat: status messages and their in-place edits
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatChannel: Send + Sync {
    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<MessageId, ChannelError>;

    async fn edit_text(&self, chat_id: ChatId, message_id: MessageId, text: &str) -> Result<(), ChannelError>;
}

/// Runs one request through validation, extraction and delivery
pub struct RequestCoordinator {
    config: Arc<Config>,
    credentials: Arc<dyn CredentialSupplier>,
    extractor: Arc<dyn MediaExtractor>,
    delivery: DeliveryPipeline,
    channel: Arc<dyn ChatChannel>,
}

impl RequestCoordinator {
    pub fn new(
        config: Arc<Config>,
        credentials: Arc<dyn CredentialSupplier>,
        extractor: Arc<dyn MediaExtractor>,
        delivery: DeliveryPipeline,
        channel: Arc<dyn ChatChannel>,
    ) -> Self {
        Self {
            config,
            credentials,
            extractor,
            delivery,
            channel,
        }
    }

    /// Handle a request to its terminal state and report it to the user.
    ///
    /// Never fails: every error ends up as a status message. Any artifact the
    /// request produced is gone from disk by the time this returns.
    pub async fn handle(&self, request: Request) -> RequestOutcome {
        let span = tracing::info_span!(
            "request",
            request_id = %request.id,
            user_id = request.user_id,
            chat_id = request.chat_id.0
        );
        self.process(request).instrument(span).await
    }

    async fn process(&self, request: Request) -> RequestOutcome {
        transition(RequestState::Received);
        tracing::info!("Received {:?} at {}", request.text, request.received_at);

        transition(RequestState::Validating);
        let url = match validation::validate(&request.text) {
            ValidationResult::Valid(url) => {
                tracing::info!("Valid YouTube URL for video {}", validation::video_id(&url).unwrap_or_default());
                url
            }
            ValidationResult::Invalid => {
                tracing::warn!("Invalid YouTube URL received");
                let outcome = RequestOutcome::Rejected;
                self.report(request.chat_id, None, &outcome).await;
                return outcome;
            }
        };

        let status = match self.channel.send_text(request.chat_id, PROCESSING_TEXT).await {
            Ok(message_id) => Some(message_id),
            Err(e) => {
                tracing::warn!("Could not send processing message: {}", e);
                None
            }
        };

        let outcome = self.acquire_and_deliver(&request, &url).await;
        transition(outcome.state());

        self.report(request.chat_id, status, &outcome).await;
        outcome
    }

    async fn acquire_and_deliver(&self, request: &Request, url: &str) -> RequestOutcome {
        transition(RequestState::Extracting);

        let credentials = self.credentials.credential_sets().await;
        let target = ArtifactTarget::new(&self.config.app.work_dir, request.id.to_string());
        tracing::info!(
            "Extracting {} with {} ({} credential sets)",
            url,
            self.extractor.engine_name(),
            credentials.len()
        );

        let extracted = match self.extractor.extract(url, &credentials, &target).await {
            Ok(result) => result,
            Err(error) => {
                tracing::error!("Error downloading {}: {}", url, error);
                target.sweep().await;
                return RequestOutcome::ExtractFailed(error);
            }
        };

        let artifact = Artifact::new(extracted);
        let size_bytes = artifact.result().size_bytes;
        tracing::info!("File size: {}", format_file_size(size_bytes));

        transition(RequestState::SizeChecking);
        let delivered = self.delivery.deliver(artifact.result(), request.chat_id).await;

        // Deleted before any status reaches the user, whatever the outcome
        let path = artifact.path().to_path_buf();
        if !artifact.discard().await {
            tracing::error!("Artifact {} may still be on disk", path.display());
        }

        match delivered {
            DeliveryOutcome::Delivered => {
                tracing::info!("Successfully processed and sent file");
                RequestOutcome::Delivered
            }
            DeliveryOutcome::TooLarge => RequestOutcome::TooLarge {
                size_bytes,
                limit_bytes: self.delivery.gate().limit_bytes(),
            },
            DeliveryOutcome::UploadFailed(reason) => RequestOutcome::DeliveryFailed(reason),
        }
    }

    /// Put the outcome text in the status message, or send it fresh
    async fn report(&self, chat_id: ChatId, status: Option<MessageId>, outcome: &RequestOutcome) {
        let text = outcome.user_message();

        if let Some(message_id) = status {
            match self.channel.edit_text(chat_id, message_id, &text).await {
                Ok(()) => return,
                Err(e) => tracing::warn!("Could not edit status message: {}", e),
            }
        }

        if let Err(e) = self.channel.send_text(chat_id, &text).await {
            tracing::error!("Could not send status to chat {}: {}", chat_id.0, e);
        }
    }
}

fn transition(state: RequestState) {
    tracing::debug!(state = state.as_str(), "request state");
}
