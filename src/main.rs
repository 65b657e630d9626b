use anyhow::{Context, Result};
use clap::Parser;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ytaudio_bot::cli::{Cli, Commands, LogFormat};
use ytaudio_bot::config::{self, Config};
use ytaudio_bot::credentials::{browser, SourceListSupplier};
use ytaudio_bot::{bot, preflight, utils, BotError};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG may come from .env, so it has to be loaded before tracing
    let env_file = config::load_env();
    init_tracing(cli.verbose, cli.log_format);
    if let Some(env_file) = env_file {
        tracing::debug!("Loaded environment from {}", env_file.display());
    }

    let config = Config::load(cli.config.as_deref())?;

    match cli.subcommand() {
        Commands::Run => run(config).await?,
        Commands::Check => check(&config).await?,
        Commands::Cookies { export: None, .. } => show_cookies(&config).await,
        Commands::Cookies {
            export: Some(path),
            browser,
        } => export_cookies(&config, &path, browser).await?,
        Commands::Config => config.display(),
    }

    Ok(())
}

async fn export_cookies(config: &Config, path: &Path, only_browser: Option<String>) -> Result<()> {
    let supplier = credential_supplier(config);
    let browsers = match only_browser {
        Some(name) => vec![name],
        None => supplier.browsers(),
    };
    let home = supplier.home().context("Cannot determine the home directory")?;

    let set = browser::export_first(&browsers, home, supplier.domain())
        .await
        .context("Cookie export failed")?;

    let file = fs_err::File::create(path)?;
    set.write_cookie_file(file)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!(
        "{} Exported {} {} cookies from {} to {}",
        style("✓").green(),
        set.cookies.len(),
        set.domain,
        set.source,
        path.display()
    );
    Ok(())
}

fn credential_supplier(config: &Config) -> SourceListSupplier {
    SourceListSupplier::new(config.credentials.sources.clone(), config.credentials.domain.clone())
}

fn init_tracing(verbose: bool, format: LogFormat) {
    let default_filter = if verbose { "ytaudio_bot=debug" } else { "ytaudio_bot=info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into());

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
    }
}

async fn run(config: Config) -> Result<()> {
    tracing::info!("Starting bot initialization...");

    let token = config.telegram_token()?;
    tracing::info!("Bot token loaded: {}", utils::mask_secret(token));

    let missing_deps = utils::check_dependencies(&config.extractor.yt_dlp_path).await;
    for dep in &missing_deps {
        tracing::warn!("Dependency check warning: {}", dep);
    }

    config.ensure_work_dir()?;

    preflight::run(&config.preflight)
        .await
        .map_err(BotError::from)
        .context("Cannot start bot")?;

    bot::run(Arc::new(config)).await
}

async fn check(config: &Config) -> Result<()> {
    let progress = ProgressBar::new_spinner();
    progress.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    progress.enable_steady_tick(Duration::from_millis(100));

    let settings = &config.preflight;

    progress.set_message(format!("Connecting to {}...", settings.probe_address));
    if let Err(e) = preflight::check_network(
        &settings.probe_address,
        Duration::from_secs(settings.probe_timeout_secs),
    )
    .await
    {
        progress.finish_with_message(format!("{} {}", style("✗").red(), e));
        return Err(BotError::from(e).into());
    }
    progress.println(format!("{} Internet connection is available", style("✓").green()));

    progress.set_message(format!("Requesting {}...", settings.api_url));
    if let Err(e) = preflight::check_api(&settings.api_url, Duration::from_secs(settings.api_timeout_secs)).await {
        progress.finish_with_message(format!("{} {}", style("✗").red(), e));
        return Err(BotError::from(e).into());
    }
    progress.finish_with_message(format!("{} {} is accessible", style("✓").green(), settings.api_url));

    let missing_deps = utils::check_dependencies(&config.extractor.yt_dlp_path).await;
    if !missing_deps.is_empty() {
        eprintln!("⚠️  Dependency check warnings:");
        for dep in missing_deps {
            eprintln!("   • {}", dep);
        }
    }

    Ok(())
}

async fn show_cookies(config: &Config) {
    let supplier = credential_supplier(config);

    println!("Credential sources for {} (highest priority first):", config.credentials.domain);

    let mut chosen = false;
    for source in supplier.sources() {
        match supplier.resolve(source).await {
            Some(set) => {
                let marker = if chosen { " " } else { "→" };
                chosen = true;

                let detail = if set.is_browser_reference() {
                    "read by yt-dlp at extraction time".to_string()
                } else {
                    let expiry = set
                        .expires_at
                        .map(|at| format!(", earliest expiry {}", at.format("%Y-%m-%d %H:%M UTC")))
                        .unwrap_or_default();
                    format!("{} cookies{}", set.cookies.len(), expiry)
                };

                println!("  {} {} ({})", style(marker).green(), source, detail);
            }
            None => println!("  {} {} (unavailable)", style("✗").red(), source),
        }
    }

    if !chosen {
        println!("No credential set available; extraction will run without cookies.");
    }
}
