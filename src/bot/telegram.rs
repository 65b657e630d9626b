use async_trait::async_trait;
use teloxide::payloads::SendAudioSetters;
use teloxide::prelude::*;
use teloxide::types::{InputFile, MessageId};
use teloxide::RequestError;

use crate::coordinator::{ChannelError, ChatChannel};
use crate::delivery::{AudioUpload, AudioUploader, TimeoutTier, UploadError};

/// Status messages through the shared Bot API client
pub struct TelegramChannel {
    bot: Bot,
}

impl TelegramChannel {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl ChatChannel for TelegramChannel {
    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<MessageId, ChannelError> {
        self.bot
            .send_message(chat_id, text)
            .await
            .map(|message| message.id)
            .map_err(|e| ChannelError(e.to_string()))
    }

    async fn edit_text(&self, chat_id: ChatId, message_id: MessageId, text: &str) -> Result<(), ChannelError> {
        self.bot
            .edit_message_text(chat_id, message_id, text)
            .await
            .map(|_| ())
            .map_err(|e| ChannelError(e.to_string()))
    }
}

/// Uploads audio with a dedicated HTTP client per timeout tier
pub struct TelegramUploader {
    token: String,
}

impl TelegramUploader {
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: token.into() }
    }

    /// Bot whose HTTP client enforces `timeouts`
    fn bot_for(&self, timeouts: &TimeoutTier) -> Result<Bot, UploadError> {
        let client = teloxide::net::default_reqwest_settings()
            .connect_timeout(timeouts.connect)
            .timeout(timeouts.request_timeout())
            .pool_idle_timeout(timeouts.pool)
            .build()
            .map_err(|e| UploadError::Transport(format!("cannot build HTTP client: {}", e)))?;

        Ok(Bot::with_client(self.token.clone(), client))
    }
}

#[async_trait]
impl AudioUploader for TelegramUploader {
    async fn send_audio(&self, chat_id: ChatId, audio: &AudioUpload, timeouts: TimeoutTier) -> Result<(), UploadError> {
        let bot = self.bot_for(&timeouts)?;

        // Duration stays unset so Telegram works it out from the file
        bot.send_audio(chat_id, InputFile::file(audio.path.clone()))
            .caption(audio.caption.clone())
            .title(audio.title.clone())
            .performer(audio.performer.clone())
            .await
            .map(|_| ())
            .map_err(classify_request_error)
    }
}

fn classify_request_error(error: RequestError) -> UploadError {
    match &error {
        RequestError::Network(e) if e.is_timeout() => UploadError::Timeout(error.to_string()),
        RequestError::Network(_) | RequestError::Io(_) => UploadError::Transport(error.to_string()),
        _ => UploadError::Api(error.to_string()),
    }
}
