use anyhow::Result;
use std::sync::Arc;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;

pub mod telegram;

pub use telegram::{TelegramChannel, TelegramUploader};

use crate::config::Config;
use crate::coordinator::{Request, RequestCoordinator};
use crate::credentials::SourceListSupplier;
use crate::delivery::{DeliveryPipeline, SizeGate};
use crate::extractors::YtDlpExtractor;

pub const START_TEXT: &str = "Hi! 👋\n\n\
    Please send me a valid YouTube link and I will convert it to high-quality MP3 for you.\n\n\
    Example: https://www.youtube.com/watch?v=...";

pub const HELP_TEXT: &str = "How to use this bot:\n\n\
    1. Send me a YouTube video URL\n\
    2. Wait while I download and convert it to MP3\n\
    3. I will send you the high-quality MP3 file\n\n\
    Note: Only valid YouTube URLs are accepted.";

#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "These commands are supported:")]
pub enum Command {
    #[command(description = "introduce the bot.")]
    Start,
    #[command(description = "show usage instructions.")]
    Help,
}

impl Command {
    pub fn reply_text(&self) -> &'static str {
        match self {
            Command::Start => START_TEXT,
            Command::Help => HELP_TEXT,
        }
    }
}

/// Wire the pipeline components described by `config` around `bot`
pub fn build_coordinator(config: Arc<Config>, bot: Bot, token: &str) -> RequestCoordinator {
    let credentials = SourceListSupplier::new(
        config.credentials.sources.clone(),
        config.credentials.domain.clone(),
    );

    let extractor = YtDlpExtractor::new(
        config.extractor.yt_dlp_path.clone(),
        config.extractor.retry.clone(),
        config.extractor.options(),
    );

    let delivery = DeliveryPipeline::new(
        Arc::new(TelegramUploader::new(token)),
        SizeGate::new(config.app.max_upload_bytes),
        config.delivery,
    );

    RequestCoordinator::new(
        config,
        Arc::new(credentials),
        Arc::new(extractor),
        delivery,
        Arc::new(TelegramChannel::new(bot)),
    )
}

/// Update routing: known commands, then plain text for the pipeline.
/// Unknown commands fall through and are ignored.
pub fn schema() -> UpdateHandler<teloxide::RequestError> {
    Update::filter_message()
        .branch(
            dptree::entry()
                .filter_command::<Command>()
                .endpoint(answer_command),
        )
        .branch(dptree::filter(is_pipeline_text).endpoint(handle_text))
}

fn is_pipeline_text(msg: Message) -> bool {
    msg.text().map(|text| !text.starts_with('/')).unwrap_or(false)
}

async fn answer_command(bot: Bot, msg: Message, update: Update, cmd: Command) -> ResponseResult<()> {
    let user_id = update.from().map(|user| user.id.0).unwrap_or_default();
    tracing::info!("{:?} command received from user {}", cmd, user_id);

    bot.send_message(msg.chat.id, cmd.reply_text()).await?;
    Ok(())
}

async fn handle_text(msg: Message, update: Update, coordinator: Arc<RequestCoordinator>) -> ResponseResult<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };

    let user_id = update
        .from()
        .map(|user| user.id.0)
        .unwrap_or_else(|| chat_user_id(msg.chat.id));

    let request = Request::new(user_id, msg.chat.id, text);
    let outcome = coordinator.handle(request).await;
    tracing::info!("Request from user {} finished as {}", user_id, outcome.state().as_str());

    Ok(())
}

/// Stand-in user id for updates without a sender, such as channel posts.
/// Group and channel chat ids are negative.
fn chat_user_id(chat_id: ChatId) -> u64 {
    chat_id.0.unsigned_abs()
}

/// Start long polling until Ctrl-C.
///
/// Updates from one chat are handled in order; different chats run
/// concurrently.
pub async fn run(config: Arc<Config>) -> Result<()> {
    let token = config.telegram_token()?.to_string();
    let bot = Bot::new(token.clone());
    let coordinator = Arc::new(build_coordinator(config, bot.clone(), &token));

    tracing::info!("Starting bot polling...");
    Dispatcher::builder(bot, schema())
        .dependencies(dptree::deps![coordinator])
        .default_handler(|update| async move {
            tracing::debug!("Ignoring update {:?}", update.id);
        })
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("/start", "ytaudio_bot").unwrap(), Command::Start);
        assert_eq!(Command::parse("/help", "ytaudio_bot").unwrap(), Command::Help);
        assert!(Command::parse("/convert", "ytaudio_bot").is_err());
    }

    #[test]
    fn test_command_texts() {
        assert!(Command::Start.reply_text().contains("YouTube link"));
        assert!(Command::Help.reply_text().starts_with("How to use this bot"));
    }

    #[test]
    fn test_chat_user_id_for_group_chats() {
        assert_eq!(chat_user_id(ChatId(42)), 42);
        assert_eq!(chat_user_id(ChatId(-1001234567890)), 1001234567890);
    }
}
