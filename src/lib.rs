//! ytaudio-bot - A Telegram bot that converts YouTube links to MP3
//!
//! This library validates incoming links, extracts audio with yt-dlp using
//! browser or file cookies, and uploads the result back to the chat with a
//! tiered timeout policy, deleting every artifact once a request finishes.

pub mod bot;
pub mod cli;
pub mod config;
pub mod coordinator;
pub mod credentials;
pub mod delivery;
pub mod extractors;
pub mod preflight;
pub mod utils;
pub mod validation;

pub use cli::{Cli, Commands, LogFormat};
pub use config::Config;
pub use coordinator::{Request, RequestCoordinator, RequestOutcome};
pub use credentials::{CredentialSet, CredentialSource, CredentialSupplier};
pub use delivery::{DeliveryOutcome, DeliveryPipeline, SizeGate};
pub use extractors::{ExtractionError, ExtractionResult, MediaExtractor};
pub use validation::{validate, ValidationResult};

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;

/// Process-level errors that stop the bot from starting
#[derive(thiserror::Error, Debug)]
pub enum BotError {
    #[error("TELEGRAM_TOKEN is not set; add it to the environment or a .env file")]
    MissingToken,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Connectivity check failed: {0}")]
    Preflight(#[from] preflight::PreflightError),
}
