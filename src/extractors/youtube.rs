use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tempfile::NamedTempFile;
use tokio::process::Command;

use super::{ArtifactTarget, ExtractionError, ExtractionResult, MediaExtractor, RetryPolicy};
use crate::credentials::{CredentialSet, CredentialSource};

/// Mobile Safari user agent sent with every engine request
pub const MOBILE_USER_AGENT: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_2_1 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Mobile/15E148 Safari/604.1";

/// Audio codec the artifact is transcoded to
pub const AUDIO_FORMAT: &str = "mp3";

/// What the engine prints once the file has reached its final location
#[derive(Debug, Deserialize)]
struct PrintedInfo {
    title: Option<String>,
    filepath: Option<String>,
}

/// Tuning knobs for the yt-dlp invocation
#[derive(Debug, Clone)]
pub struct YtDlpOptions {
    pub socket_timeout_secs: u64,
    pub concurrent_fragments: u32,
    pub ffmpeg_threads: u32,
}

impl Default for YtDlpOptions {
    fn default() -> Self {
        Self {
            socket_timeout_secs: 30,
            concurrent_fragments: 10,
            ffmpeg_threads: 8,
        }
    }
}

/// YouTube audio extractor using yt-dlp
pub struct YtDlpExtractor {
    yt_dlp_path: String,
    retry: RetryPolicy,
    options: YtDlpOptions,
}

impl YtDlpExtractor {
    pub fn new(yt_dlp_path: impl Into<String>, retry: RetryPolicy, options: YtDlpOptions) -> Self {
        Self {
            yt_dlp_path: yt_dlp_path.into(),
            retry,
            options,
        }
    }

    /// Build the full argument list for one extraction.
    ///
    /// `cookie_file` is the on-disk copy of `credential` when it carries cookies.
    pub fn build_args(
        &self,
        url: &str,
        credential: Option<&CredentialSet>,
        cookie_file: Option<&Path>,
        target: &ArtifactTarget,
    ) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "--no-playlist".into(),
            "--no-warnings".into(),
            "--no-progress".into(),
            // Audio selection and conversion
            "--format".into(),
            "m4a/bestaudio/best".into(),
            "--extract-audio".into(),
            "--audio-format".into(),
            AUDIO_FORMAT.into(),
            "--audio-quality".into(),
            "0".into(),
            "--postprocessor-args".into(),
            format!("ExtractAudio:-threads {}", self.options.ffmpeg_threads),
            // Mobile clients without DASH/HLS get past most bot checks
            "--extractor-args".into(),
            "youtube:player_client=android,ios;skip=dash,hls".into(),
            "--user-agent".into(),
            MOBILE_USER_AGENT.into(),
            "--add-header".into(),
            "Accept-Language:en-US,en;q=0.9".into(),
            // Network
            "--socket-timeout".into(),
            self.options.socket_timeout_secs.to_string(),
            "--concurrent-fragments".into(),
            self.options.concurrent_fragments.to_string(),
        ];

        args.extend(self.retry.to_args());

        match (credential, cookie_file) {
            (_, Some(path)) => {
                args.push("--cookies".into());
                args.push(path.to_string_lossy().into_owned());
            }
            (Some(set), None) => {
                if let CredentialSource::Browser(browser) = &set.source {
                    args.push("--cookies-from-browser".into());
                    args.push(browser.clone());
                }
            }
            (None, None) => {}
        }

        args.extend([
            "--output".into(),
            target.output_template().to_string_lossy().into_owned(),
            "--no-simulate".into(),
            "--print".into(),
            "after_move:%(.{title,filepath})j".into(),
            "--".into(),
            url.into(),
        ]);

        args
    }

    /// Write a credential set to a temporary cookie file for the engine.
    /// The file is removed when the returned handle drops.
    fn write_cookie_file(&self, set: &CredentialSet, dir: &Path) -> Result<NamedTempFile, ExtractionError> {
        let mut file = tempfile::Builder::new()
            .prefix(".cookies-")
            .suffix(".txt")
            .tempfile_in(dir)
            .map_err(|e| ExtractionError::Unknown(format!("cannot create cookie file: {}", e)))?;

        set.write_cookie_file(file.as_file_mut())
            .map_err(|e| ExtractionError::Unknown(format!("cannot write cookie file: {}", e)))?;

        Ok(file)
    }

    /// Pull title and final path out of the engine's printed JSON line
    fn parse_printed(stdout: &str, target: &ArtifactTarget) -> (String, PathBuf) {
        let info = stdout
            .lines()
            .rev()
            .map(str::trim)
            .filter(|l| l.starts_with('{'))
            .find_map(|l| serde_json::from_str::<PrintedInfo>(l).ok());

        let title = info
            .as_ref()
            .and_then(|i| i.title.clone())
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| target.stem.clone());

        let path = info
            .and_then(|i| i.filepath)
            .map(PathBuf::from)
            .unwrap_or_else(|| target.path_with_extension(AUDIO_FORMAT));

        (title, path)
    }
}

#[async_trait]
impl MediaExtractor for YtDlpExtractor {
    async fn extract(
        &self,
        url: &str,
        credentials: &[CredentialSet],
        target: &ArtifactTarget,
    ) -> Result<ExtractionResult, ExtractionError> {
        let credential = credentials.first();
        match credential {
            Some(set) => tracing::debug!("Using credential set {} for {}", set.source, set.domain),
            None => tracing::debug!("No credential set available, extracting anonymously"),
        }

        let cookie_file = match credential {
            Some(set) if !set.cookies.is_empty() => Some(self.write_cookie_file(set, &target.dir)?),
            _ => None,
        };

        let args = self.build_args(url, credential, cookie_file.as_ref().map(|f| f.path()), target);

        tracing::debug!("Running {} for {}", self.yt_dlp_path, url);

        let output = Command::new(&self.yt_dlp_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ExtractionError::Unknown(format!("failed to start {}: {}", self.yt_dlp_path, e)))?;

        drop(cookie_file);

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let error = ExtractionError::classify(&stderr);
            tracing::warn!("{} exited with {}: {}", self.yt_dlp_path, output.status, error);
            target.sweep().await;
            return Err(error);
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let (title, path) = Self::parse_printed(&stdout, target);

        let size_bytes = match tokio::fs::metadata(&path).await {
            Ok(meta) => meta.len(),
            Err(e) => {
                target.sweep().await;
                return Err(ExtractionError::Unknown(format!(
                    "engine reported {} but it cannot be read: {}",
                    path.display(),
                    e
                )));
            }
        };

        tracing::info!("Extracted \"{}\" to {} ({} bytes)", title, path.display(), size_bytes);

        Ok(ExtractionResult {
            path,
            title,
            size_bytes,
        })
    }

    fn engine_name(&self) -> &'static str {
        "yt-dlp"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::{parse_cookie_lines, CredentialSource};

    const URL: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";

    fn extractor(path: &str) -> YtDlpExtractor {
        YtDlpExtractor::new(path, RetryPolicy::default(), YtDlpOptions::default())
    }

    fn value_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .map(String::as_str)
    }

    #[test]
    fn test_args_select_mobile_clients_and_best_mp3() {
        let target = ArtifactTarget::new("downloads", "req");
        let args = extractor("yt-dlp").build_args(URL, None, None, &target);

        assert_eq!(value_after(&args, "--format"), Some("m4a/bestaudio/best"));
        assert_eq!(value_after(&args, "--audio-format"), Some("mp3"));
        assert_eq!(value_after(&args, "--audio-quality"), Some("0"));
        assert_eq!(
            value_after(&args, "--extractor-args"),
            Some("youtube:player_client=android,ios;skip=dash,hls")
        );
        assert_eq!(value_after(&args, "--retries"), Some("10"));
        assert_eq!(value_after(&args, "--socket-timeout"), Some("30"));
        assert_eq!(args.last().map(String::as_str), Some(URL));
        assert!(!args.iter().any(|a| a.starts_with("--cookies")));
    }

    #[test]
    fn test_args_use_injected_retry_policy() {
        let retry = RetryPolicy {
            retries: 3,
            fragment_retries: 2,
            extractor_retries: 1,
            file_access_retries: 0,
            retry_sleep_secs: 0,
        };
        let target = ArtifactTarget::new("downloads", "req");
        let args = YtDlpExtractor::new("yt-dlp", retry, YtDlpOptions::default()).build_args(URL, None, None, &target);

        assert_eq!(value_after(&args, "--retries"), Some("3"));
        assert_eq!(value_after(&args, "--fragment-retries"), Some("2"));
        assert_eq!(value_after(&args, "--extractor-retries"), Some("1"));
        assert_eq!(value_after(&args, "--file-access-retries"), Some("0"));
    }

    #[test]
    fn test_args_for_browser_and_file_credentials() {
        let target = ArtifactTarget::new("downloads", "req");
        let browser = CredentialSet::from_browser("chrome", "youtube.com");
        let args = extractor("yt-dlp").build_args(URL, Some(&browser), None, &target);
        assert_eq!(value_after(&args, "--cookies-from-browser"), Some("chrome"));

        let file_set = CredentialSet::from_cookies(
            parse_cookie_lines(".youtube.com\tTRUE\t/\tTRUE\t0\tSID\tabc"),
            "youtube.com",
            CredentialSource::File("cookies.txt".into()),
        );
        let args = extractor("yt-dlp").build_args(URL, Some(&file_set), Some(Path::new("/tmp/c.txt")), &target);
        assert_eq!(value_after(&args, "--cookies"), Some("/tmp/c.txt"));
        assert!(!args.iter().any(|a| a == "--cookies-from-browser"));
    }

    #[test]
    fn test_parse_printed_falls_back_to_target() {
        let target = ArtifactTarget::new("downloads", "req");

        let (title, path) = YtDlpExtractor::parse_printed(
            "[youtube] noise\n{\"title\": \"Never Gonna Give You Up\", \"filepath\": \"downloads/req.mp3\"}\n",
            &target,
        );
        assert_eq!(title, "Never Gonna Give You Up");
        assert_eq!(path, PathBuf::from("downloads/req.mp3"));

        let (title, path) = YtDlpExtractor::parse_printed("garbage", &target);
        assert_eq!(title, "req");
        assert_eq!(path, target.path_with_extension("mp3"));
    }

    #[tokio::test]
    async fn test_missing_engine_is_unknown_failure() {
        let dir = tempfile::tempdir().unwrap();
        let target = ArtifactTarget::new(dir.path(), "req");

        let result = extractor("/nonexistent/yt-dlp").extract(URL, &[], &target).await;
        assert!(matches!(result, Err(ExtractionError::Unknown(_))));
    }

    #[cfg(unix)]
    mod engine_script {
        use super::*;
        use crate::credentials::CredentialSet;
        use crate::extractors::{ArtifactTarget, ExtractionError};
        use std::os::unix::fs::PermissionsExt;
        use std::path::{Path, PathBuf};

        fn write_script(dir: &Path, body: &str) -> PathBuf {
            let path = dir.join("fake-yt-dlp");
            fs_err::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        #[tokio::test]
        async fn test_successful_run_reports_size_and_title() {
            let bin = tempfile::tempdir().unwrap();
            let work = tempfile::tempdir().unwrap();
            let target = ArtifactTarget::new(work.path(), "req");
            let out = target.path_with_extension("mp3");

            let script = write_script(
                bin.path(),
                &format!(
                    "printf 'abcdef' > '{path}'\necho '{{\"title\": \"Song\", \"filepath\": \"{path}\"}}'",
                    path = out.display()
                ),
            );

            let result = extractor(script.to_str().unwrap()).extract(URL, &[], &target).await.unwrap();
            assert_eq!(result.title, "Song");
            assert_eq!(result.path, out);
            assert_eq!(result.size_bytes, 6);
        }

        #[tokio::test]
        async fn test_failed_run_is_classified_and_swept() {
            let bin = tempfile::tempdir().unwrap();
            let work = tempfile::tempdir().unwrap();
            let target = ArtifactTarget::new(work.path(), "req");
            let partial = target.path_with_extension("webm.part");

            let script = write_script(
                bin.path(),
                &format!(
                    "touch '{}'\necho \"ERROR: [youtube] x: Sign in to confirm you're not a bot\" >&2\nexit 1",
                    partial.display()
                ),
            );

            let result = extractor(script.to_str().unwrap()).extract(URL, &[], &target).await;
            assert_eq!(result, Err(ExtractionError::AuthenticationRequired));
            assert!(!partial.exists());
        }

        #[tokio::test]
        async fn test_first_credential_set_is_handed_to_engine() {
            let bin = tempfile::tempdir().unwrap();
            let work = tempfile::tempdir().unwrap();
            let target = ArtifactTarget::new(work.path(), "req");
            let seen = work.path().join("args.seen");

            // Records its arguments, then fails so nothing else needs faking
            let script = write_script(
                bin.path(),
                &format!("echo \"$@\" > '{}'\necho 'ERROR: boom' >&2\nexit 1", seen.display()),
            );

            let sets = vec![
                CredentialSet::from_browser("chrome", "youtube.com"),
                CredentialSet::from_browser("firefox", "youtube.com"),
            ];
            let _ = extractor(script.to_str().unwrap()).extract(URL, &sets, &target).await;

            let recorded = fs_err::read_to_string(&seen).unwrap();
            assert!(recorded.contains("--cookies-from-browser chrome"));
            assert!(!recorded.contains("firefox"));
        }
    }
}
