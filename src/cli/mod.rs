use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "ytaudio-bot",
    about = "Telegram bot that converts YouTube links to MP3",
    version,
    long_about = "A Telegram bot that accepts YouTube links, extracts the audio with yt-dlp (using browser or file cookies when available) and sends it back as an MP3. Requires TELEGRAM_TOKEN in the environment or a .env file."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to a YAML config file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value = "text")]
    pub log_format: LogFormat,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Run connectivity checks, then start polling for messages (default)
    Run,

    /// Run the connectivity checks only
    Check,

    /// Show which credential sets would be used, in priority order
    Cookies {
        /// Export cookies from the first browser store found to FILE instead
        #[arg(long, value_name = "FILE")]
        export: Option<PathBuf>,

        /// Browser to export from (default: the configured browsers in order)
        #[arg(long, requires = "export")]
        browser: Option<String>,
    },

    /// Show the effective configuration
    Config,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines
    Text,
    /// One JSON object per line
    Json,
}

impl Cli {
    /// The subcommand to run; no subcommand means `run`
    pub fn subcommand(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Run)
    }
}
