//! Local browser cookie stores: where they live and how to read them.
//!
//! Stores are SQLite databases that the browser keeps locked and rewrites
//! while running, so they are only ever read from a private copy.

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::FromRow;
use std::path::{Path, PathBuf};

use super::cookie_file::Cookie;
use super::{CredentialSet, CredentialSource};

/// Chromium keeps the store under the profile, newer versions in `Network/`
const CHROMIUM_STORE_FILES: &[&str] = &["Default/Network/Cookies", "Default/Cookies"];

const FIREFOX_STORE_FILE: &str = "cookies.sqlite";

/// File name of the scratch copy a store is read from
const SCRATCH_COPY: &str = "store.sqlite";

/// Seconds between 1601-01-01 (Chromium epoch) and 1970-01-01
const CHROMIUM_EPOCH_OFFSET_SECS: i64 = 11_644_473_600;

/// Expiry values above this are milliseconds rather than seconds
const FIREFOX_MILLIS_THRESHOLD: i64 = 10_000_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreFormat {
    Chromium,
    Firefox,
}

/// A cookie database found on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieStore {
    pub browser: String,
    pub format: StoreFormat,
    pub path: PathBuf,
}

#[derive(thiserror::Error, Debug)]
pub enum ExportError {
    #[error("cannot copy cookie store {path}: {source}")]
    Copy {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot read cookie store: {0}")]
    Database(#[from] sqlx::Error),

    #[error("no browser cookie store with {domain} cookies was found")]
    NothingExported { domain: String },
}

/// Profile roots relative to the home directory (Linux, macOS, Windows)
fn profile_roots(browser: &str) -> Option<(StoreFormat, &'static [&'static str])> {
    let found: (StoreFormat, &'static [&'static str]) = match browser.to_ascii_lowercase().as_str() {
        "chrome" => (
            StoreFormat::Chromium,
            &[
                ".config/google-chrome",
                "Library/Application Support/Google/Chrome",
                "AppData/Local/Google/Chrome/User Data",
            ],
        ),
        "chromium" => (
            StoreFormat::Chromium,
            &[
                ".config/chromium",
                "snap/chromium/common/chromium",
                "Library/Application Support/Chromium",
                "AppData/Local/Chromium/User Data",
            ],
        ),
        "brave" => (
            StoreFormat::Chromium,
            &[
                ".config/BraveSoftware/Brave-Browser",
                "Library/Application Support/BraveSoftware/Brave-Browser",
                "AppData/Local/BraveSoftware/Brave-Browser/User Data",
            ],
        ),
        "edge" => (
            StoreFormat::Chromium,
            &[
                ".config/microsoft-edge",
                "Library/Application Support/Microsoft Edge",
                "AppData/Local/Microsoft/Edge/User Data",
            ],
        ),
        "firefox" => (
            StoreFormat::Firefox,
            &[
                ".mozilla/firefox",
                "snap/firefox/common/.mozilla/firefox",
                "Library/Application Support/Firefox/Profiles",
                "AppData/Roaming/Mozilla/Firefox/Profiles",
            ],
        ),
        _ => return None,
    };
    Some(found)
}

/// Whether the store location of `browser` is known
pub fn is_supported(browser: &str) -> bool {
    profile_roots(browser).is_some()
}

/// Find the cookie store of `browser` under `home`
pub fn locate(browser: &str, home: &Path) -> Option<CookieStore> {
    let (format, roots) = profile_roots(browser)?;

    let path = roots.iter().map(|root| home.join(root)).find_map(|root| match format {
        StoreFormat::Chromium => CHROMIUM_STORE_FILES
            .iter()
            .map(|file| root.join(file))
            .find(|path| path.is_file()),
        StoreFormat::Firefox => firefox_profile_store(&root),
    })?;

    Some(CookieStore {
        browser: browser.to_string(),
        format,
        path,
    })
}

/// Store of the `*.default-release` profile, else the first profile by name
fn firefox_profile_store(root: &Path) -> Option<PathBuf> {
    let mut profiles: Vec<PathBuf> = fs_err::read_dir(root)
        .ok()?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|profile| profile.join(FIREFOX_STORE_FILE).is_file())
        .collect();

    profiles.sort_by_key(|profile| {
        let release = profile
            .file_name()
            .map(|name| name.to_string_lossy().ends_with(".default-release"))
            .unwrap_or(false);
        (!release, profile.clone())
    });

    profiles.into_iter().next().map(|profile| profile.join(FIREFOX_STORE_FILE))
}

#[derive(Debug, FromRow)]
struct ChromiumRow {
    host_key: String,
    name: String,
    value: String,
    path: String,
    expires_utc: i64,
    is_secure: i64,
    is_httponly: i64,
}

impl ChromiumRow {
    /// `None` for encrypted cookies, which carry an empty plain value
    fn into_cookie(self) -> Option<Cookie> {
        if self.value.is_empty() {
            return None;
        }

        let expires = match self.expires_utc {
            0 => None,
            micros => Some(micros / 1_000_000 - CHROMIUM_EPOCH_OFFSET_SECS).filter(|secs| *secs > 0),
        };

        Some(Cookie {
            include_subdomains: self.host_key.starts_with('.'),
            domain: self.host_key,
            path: self.path,
            secure: self.is_secure != 0,
            expires,
            name: self.name,
            value: self.value,
            http_only: self.is_httponly != 0,
        })
    }
}

#[derive(Debug, FromRow)]
struct FirefoxRow {
    host: String,
    name: String,
    value: String,
    path: String,
    expiry: i64,
    is_secure: i64,
    is_http_only: i64,
}

impl FirefoxRow {
    fn into_cookie(self) -> Cookie {
        let expires = match self.expiry {
            secs if secs <= 0 => None,
            millis if millis > FIREFOX_MILLIS_THRESHOLD => Some(millis / 1000),
            secs => Some(secs),
        };

        Cookie {
            include_subdomains: self.host.starts_with('.'),
            domain: self.host,
            path: self.path,
            secure: self.is_secure != 0,
            expires,
            name: self.name,
            value: self.value,
            http_only: self.is_http_only != 0,
        }
    }
}

impl CookieStore {
    /// Read the `domain` cookies from a scratch copy of the store
    pub async fn read_cookies(&self, domain: &str) -> Result<CredentialSet, ExportError> {
        let scratch = tempfile::tempdir().map_err(|source| ExportError::Copy {
            path: self.path.clone(),
            source,
        })?;
        let copy = scratch.path().join(SCRATCH_COPY);
        self.copy_to(&copy).await?;

        let options = SqliteConnectOptions::new().filename(&copy);
        let pool = SqlitePoolOptions::new().max_connections(1).connect_with(options).await?;

        let pattern = format!("%{}", domain.trim_start_matches('.'));
        let cookies = match self.format {
            StoreFormat::Chromium => {
                let rows = sqlx::query_as::<_, ChromiumRow>(
                    "SELECT host_key, name, value, path, expires_utc, is_secure, is_httponly \
                     FROM cookies WHERE host_key LIKE ?",
                )
                .bind(pattern.as_str())
                .fetch_all(&pool)
                .await?;

                let total = rows.len();
                let cookies: Vec<Cookie> = rows.into_iter().filter_map(ChromiumRow::into_cookie).collect();
                if cookies.len() < total {
                    tracing::warn!(
                        "{} encrypted {} cookies in {} were skipped",
                        total - cookies.len(),
                        self.browser,
                        self.path.display()
                    );
                }
                cookies
            }
            StoreFormat::Firefox => sqlx::query_as::<_, FirefoxRow>(
                "SELECT host, name, value, path, expiry, isSecure AS is_secure, isHttpOnly AS is_http_only \
                 FROM moz_cookies WHERE host LIKE ?",
            )
            .bind(pattern.as_str())
            .fetch_all(&pool)
            .await?
            .into_iter()
            .map(FirefoxRow::into_cookie)
            .collect(),
        };

        pool.close().await;

        Ok(CredentialSet::from_cookies(
            cookies,
            domain,
            CredentialSource::Browser(self.browser.clone()),
        ))
    }

    /// Copy the database and its write-ahead log, if the browser left one
    async fn copy_to(&self, copy: &Path) -> Result<(), ExportError> {
        let copy_err = |source| ExportError::Copy {
            path: self.path.clone(),
            source,
        };

        tokio::fs::copy(&self.path, copy).await.map_err(copy_err)?;

        let wal = sidecar(&self.path, "-wal");
        if tokio::fs::try_exists(&wal).await.unwrap_or(false) {
            tokio::fs::copy(&wal, sidecar(copy, "-wal")).await.map_err(copy_err)?;
        }

        Ok(())
    }
}

fn sidecar(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

/// Export the `domain` cookies of the first browser in `browsers` whose
/// store exists under `home` and holds any
pub async fn export_first(browsers: &[String], home: &Path, domain: &str) -> Result<CredentialSet, ExportError> {
    for browser in browsers {
        let Some(store) = locate(browser, home) else {
            tracing::debug!("No {} cookie store under {}", browser, home.display());
            continue;
        };

        match store.read_cookies(domain).await {
            Ok(set) if !set.cookies.is_empty() => {
                tracing::info!(
                    "Read {} {} cookies from {}",
                    set.cookies.len(),
                    domain,
                    store.path.display()
                );
                return Ok(set);
            }
            Ok(_) => tracing::warn!("{} has no usable {} cookies", store.path.display(), domain),
            Err(e) => tracing::warn!("Skipping {}: {}", browser, e),
        }
    }

    Err(ExportError::NothingExported {
        domain: domain.to_string(),
    })
}
