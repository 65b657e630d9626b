use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::credentials::{CredentialSource, DEFAULT_COOKIE_DOMAIN};
use crate::delivery::{DeliveryPolicy, MAX_UPLOAD_BYTES};
use crate::extractors::youtube::YtDlpOptions;
use crate::extractors::RetryPolicy;
use crate::preflight::PreflightConfig;
use crate::utils::mask_secret;
use crate::BotError;

/// Environment variable holding the Bot API token
pub const TOKEN_ENV: &str = "TELEGRAM_TOKEN";

/// File name looked up in the working directory before the user config dir
const LOCAL_CONFIG_FILE: &str = "ytaudio-bot.yaml";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Bot API token; only ever read from the environment
    #[serde(skip)]
    pub telegram_token: Option<String>,

    /// Application settings
    pub app: AppConfig,

    /// Extraction engine settings
    pub extractor: ExtractorConfig,

    /// Credential sources in priority order
    pub credentials: CredentialsConfig,

    /// Upload timeouts
    pub delivery: DeliveryPolicy,

    /// Startup connectivity checks
    pub preflight: PreflightConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory for in-flight artifacts
    pub work_dir: PathBuf,

    /// Largest artifact that will be uploaded
    pub max_upload_bytes: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("downloads"),
            max_upload_bytes: MAX_UPLOAD_BYTES,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Path or name of the yt-dlp executable
    pub yt_dlp_path: String,

    pub socket_timeout_secs: u64,

    pub concurrent_fragments: u32,

    pub ffmpeg_threads: u32,

    /// Engine-internal retry budget
    pub retry: RetryPolicy,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        let options = YtDlpOptions::default();
        Self {
            yt_dlp_path: "yt-dlp".to_string(),
            socket_timeout_secs: options.socket_timeout_secs,
            concurrent_fragments: options.concurrent_fragments,
            ffmpeg_threads: options.ffmpeg_threads,
            retry: RetryPolicy::default(),
        }
    }
}

impl ExtractorConfig {
    pub fn options(&self) -> YtDlpOptions {
        YtDlpOptions {
            socket_timeout_secs: self.socket_timeout_secs,
            concurrent_fragments: self.concurrent_fragments,
            ffmpeg_threads: self.ffmpeg_threads,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialsConfig {
    /// Cookie domain scope
    pub domain: String,

    /// Sources tried in this order; the first usable one is used
    pub sources: Vec<CredentialSource>,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            domain: DEFAULT_COOKIE_DOMAIN.to_string(),
            sources: vec![
                CredentialSource::Browser("chrome".to_string()),
                CredentialSource::Browser("firefox".to_string()),
                CredentialSource::File(PathBuf::from("cookies.txt")),
            ],
        }
    }
}

/// Merge a `.env` file from the working directory (or a parent) into the
/// process environment. Variables that are already set win.
pub fn load_env() -> Option<PathBuf> {
    dotenvy::dotenv().ok()
}

impl Config {
    /// Load configuration from `path`, the default locations, or defaults.
    ///
    /// The token is read from the environment, so call [`load_env`] first
    /// when a `.env` file should be honoured.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::config_path() {
                Some(path) => Self::from_file(&path)?,
                None => Self::default(),
            },
        };

        config.telegram_token = std::env::var(TOKEN_ENV).ok().filter(|t| !t.trim().is_empty());
        config.validate()?;
        Ok(config)
    }

    /// Parse a YAML config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs_err::read_to_string(path).context("Failed to read config file")?;

        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        Ok(config)
    }

    /// First existing config file among the default locations
    fn config_path() -> Option<PathBuf> {
        // Current directory first for easy testing
        let local_config = PathBuf::from(LOCAL_CONFIG_FILE);
        if local_config.exists() {
            return Some(local_config);
        }

        dirs::config_dir()
            .map(|dir| dir.join("ytaudio-bot").join("config.yaml"))
            .filter(|path| path.exists())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), BotError> {
        if self.app.max_upload_bytes == 0 {
            return Err(BotError::InvalidConfig("app.max_upload_bytes must be positive".into()));
        }

        if self.delivery.first_attempt_secs == 0 || self.delivery.retry_secs == 0 {
            return Err(BotError::InvalidConfig("delivery timeouts must be positive".into()));
        }

        if self.preflight.probe_timeout_secs == 0 || self.preflight.api_timeout_secs == 0 {
            return Err(BotError::InvalidConfig("preflight timeouts must be positive".into()));
        }

        if self.extractor.yt_dlp_path.trim().is_empty() {
            return Err(BotError::InvalidConfig("extractor.yt_dlp_path is empty".into()));
        }

        for source in &self.credentials.sources {
            let empty = match source {
                CredentialSource::Browser(name) => name.trim().is_empty(),
                CredentialSource::File(path) => path.as_os_str().is_empty(),
            };
            if empty {
                return Err(BotError::InvalidConfig(format!("empty credential source: {:?}", source)));
            }
        }

        Ok(())
    }

    /// The Bot API token, required for anything that talks to Telegram
    pub fn telegram_token(&self) -> Result<&str, BotError> {
        self.telegram_token.as_deref().ok_or(BotError::MissingToken)
    }

    /// Create the work directory if it does not exist yet
    pub fn ensure_work_dir(&self) -> Result<()> {
        fs_err::create_dir_all(&self.app.work_dir).context("Failed to create work directory")?;
        Ok(())
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        match &self.telegram_token {
            Some(token) => println!("  Token: {}", mask_secret(token)),
            None => println!("  Token: <not set, export {}>", TOKEN_ENV),
        }
        println!("  Work Dir: {}", self.app.work_dir.display());
        println!("  Max Upload: {} bytes", self.app.max_upload_bytes);
        println!("  yt-dlp: {}", self.extractor.yt_dlp_path);
        println!(
            "  Retries: {} (sleep {}s)",
            self.extractor.retry.retries, self.extractor.retry.retry_sleep_secs
        );
        println!(
            "  Upload Timeouts: {}s, retry {}s",
            self.delivery.first_attempt_secs, self.delivery.retry_secs
        );
        println!("  Credential Sources ({}):", self.credentials.domain);
        for source in &self.credentials.sources {
            println!("    • {}", source);
        }
    }
}
