use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};

pub mod browser;
pub mod cookie_file;

pub use browser::{CookieStore, ExportError};
pub use cookie_file::{parse_cookie_lines, Cookie};

/// Domain the extraction engine needs session cookies for
pub const DEFAULT_COOKIE_DOMAIN: &str = "youtube.com";

/// Where a credential set comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum CredentialSource {
    /// A local browser profile, resolved by the extraction engine
    Browser(String),

    /// A cookie file in the browser-export line format
    File(PathBuf),
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::Browser(name) => write!(f, "browser:{}", name),
            CredentialSource::File(path) => write!(f, "file:{}", path.display()),
        }
    }
}

/// Session cookies scoped to one domain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialSet {
    /// Domain scope, e.g. `youtube.com`
    pub domain: String,

    /// Cookies in the order they were read
    pub cookies: Vec<Cookie>,

    /// Earliest expiry among the cookies, if any of them expire
    pub expires_at: Option<DateTime<Utc>>,

    /// Origin of the set
    pub source: CredentialSource,
}

impl CredentialSet {
    /// A browser profile set; cookies are read by the engine at extraction time
    pub fn from_browser(browser: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            cookies: Vec::new(),
            expires_at: None,
            source: CredentialSource::Browser(browser.into()),
        }
    }

    /// Build a set from already-parsed cookies, keeping only those in `domain`
    pub fn from_cookies(cookies: Vec<Cookie>, domain: &str, source: CredentialSource) -> Self {
        let cookies: Vec<Cookie> = cookies.into_iter().filter(|c| c.matches_domain(domain)).collect();

        let expires_at = cookies
            .iter()
            .filter_map(|c| c.expires)
            .min()
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single());

        Self {
            domain: domain.to_string(),
            cookies,
            expires_at,
            source,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|at| at <= now).unwrap_or(false)
    }

    /// Whether the engine has to resolve this set from a browser itself
    pub fn is_browser_reference(&self) -> bool {
        self.cookies.is_empty() && matches!(self.source, CredentialSource::Browser(_))
    }

    /// Serialize the cookies back to the browser-export line format
    pub fn write_cookie_file<W: Write>(&self, mut out: W) -> std::io::Result<()> {
        writeln!(out, "# Netscape HTTP Cookie File")?;
        for cookie in &self.cookies {
            writeln!(out, "{}", cookie.to_line())?;
        }
        out.flush()
    }
}

/// Produces credential sets in priority order
#[async_trait]
pub trait CredentialSupplier: Send + Sync {
    async fn credential_sets(&self) -> Vec<CredentialSet>;
}

/// Resolves an explicit, caller-ordered list of credential sources
pub struct SourceListSupplier {
    sources: Vec<CredentialSource>,
    domain: String,
    home: Option<PathBuf>,
}

impl SourceListSupplier {
    pub fn new(sources: Vec<CredentialSource>, domain: impl Into<String>) -> Self {
        Self {
            sources,
            domain: domain.into(),
            home: dirs::home_dir(),
        }
    }

    /// Look for browser profiles under `home` instead of the user's home
    pub fn with_home(mut self, home: impl Into<PathBuf>) -> Self {
        self.home = Some(home.into());
        self
    }

    pub fn sources(&self) -> &[CredentialSource] {
        &self.sources
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn home(&self) -> Option<&Path> {
        self.home.as_deref()
    }

    /// Browser names among the sources, in priority order
    pub fn browsers(&self) -> Vec<String> {
        self.sources
            .iter()
            .filter_map(|source| match source {
                CredentialSource::Browser(name) => Some(name.clone()),
                CredentialSource::File(_) => None,
            })
            .collect()
    }

    /// Resolve one source into a set, or `None` when it has nothing usable
    pub async fn resolve(&self, source: &CredentialSource) -> Option<CredentialSet> {
        match source {
            CredentialSource::Browser(browser) => self.browser_reference(browser),
            CredentialSource::File(path) => self.load_file(path).await,
        }
    }

    /// A browser set only when the browser's cookie store exists locally
    fn browser_reference(&self, name: &str) -> Option<CredentialSet> {
        if !browser::is_supported(name) {
            tracing::debug!("Cookie store location of {} is unknown, leaving it to the engine", name);
            return Some(CredentialSet::from_browser(name, self.domain.clone()));
        }

        let Some(home) = self.home.as_deref() else {
            tracing::debug!("No home directory, skipping browser {}", name);
            return None;
        };

        match browser::locate(name, home) {
            Some(store) => {
                tracing::debug!("Found {} cookie store at {}", name, store.path.display());
                Some(CredentialSet::from_browser(name, self.domain.clone()))
            }
            None => {
                tracing::debug!("No {} cookie store under {}, skipping", name, home.display());
                None
            }
        }
    }

    async fn load_file(&self, path: &Path) -> Option<CredentialSet> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("Cookie file {} not found, skipping", path.display());
                return None;
            }
            Err(e) => {
                tracing::warn!("Cannot read cookie file {}: {}", path.display(), e);
                return None;
            }
        };

        let set = CredentialSet::from_cookies(
            parse_cookie_lines(&content),
            &self.domain,
            CredentialSource::File(path.to_path_buf()),
        );

        if set.cookies.is_empty() {
            tracing::warn!("Cookie file {} has no cookies for {}", path.display(), self.domain);
            return None;
        }

        if set.is_expired(Utc::now()) {
            tracing::warn!(
                "Cookie file {} contains expired cookies for {}; using it anyway",
                path.display(),
                self.domain
            );
        }

        Some(set)
    }
}

#[async_trait]
impl CredentialSupplier for SourceListSupplier {
    async fn credential_sets(&self) -> Vec<CredentialSet> {
        let mut sets = Vec::with_capacity(self.sources.len());
        for source in &self.sources {
            if let Some(set) = self.resolve(source).await {
                sets.push(set);
            }
        }
        sets
    }
}
