use std::process::Stdio;
use tokio::process::Command;

/// Format file size in human-readable format
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    const THRESHOLD: f64 = 1024.0;

    if bytes == 0 {
        return "0 B".to_string();
    }

    let bytes_f = bytes as f64;
    let unit_index = (bytes_f.log10() / THRESHOLD.log10()).floor() as usize;
    let unit_index = unit_index.min(UNITS.len() - 1);

    let size = bytes_f / THRESHOLD.powi(unit_index as i32);

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.2} {}", size, UNITS[unit_index])
    }
}

/// Clean up a media title for use in captions and audio metadata.
///
/// Control characters are dropped, runs of whitespace collapse to one space
/// and the result is capped at `max_chars` characters.
pub fn sanitize_title(title: &str, max_chars: usize) -> String {
    let cleaned = title
        .chars()
        .filter(|c| !c.is_control() || c.is_whitespace())
        .collect::<String>();

    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() <= max_chars {
        return collapsed;
    }

    let mut truncated: String = collapsed.chars().take(max_chars.saturating_sub(1)).collect();
    truncated.push('…');
    truncated
}

/// Mask a secret for logging, keeping only a short prefix
pub fn mask_secret(secret: &str) -> String {
    let prefix: String = secret.chars().take(10).collect();
    format!("{}...", prefix)
}

/// Check if the current environment has the tools the extraction engine needs
pub async fn check_dependencies(yt_dlp_path: &str) -> Vec<String> {
    let mut missing = Vec::new();

    if !check_command_available(yt_dlp_path).await {
        missing.push(format!("{} - required for YouTube extraction", yt_dlp_path));
    }

    // yt-dlp shells out to ffmpeg for the MP3 conversion
    if !check_command_available_with("ffmpeg", "-version").await {
        missing.push("ffmpeg - required for audio transcoding".to_string());
    }

    missing
}

/// Check if a command is available in PATH
async fn check_command_available(command: &str) -> bool {
    check_command_available_with(command, "--version").await
}

async fn check_command_available_with(command: &str, version_flag: &str) -> bool {
    Command::new(command)
        .arg(version_flag)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map(|status| status.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(0), "0 B");
        assert_eq!(format_file_size(512), "512 B");
        assert_eq!(format_file_size(1024), "1.00 KB");
        assert_eq!(format_file_size(1536), "1.50 KB");
        assert_eq!(format_file_size(3 * 1024 * 1024), "3.00 MB");
    }

    #[test]
    fn test_sanitize_title() {
        assert_eq!(sanitize_title("  Never   Gonna\nGive You Up ", 64), "Never Gonna Give You Up");
        assert_eq!(sanitize_title("bell\u{7}ring", 64), "bellring");
        assert_eq!(sanitize_title("abcdefgh", 5), "abcd…");
        assert_eq!(sanitize_title("", 5), "");
    }

    #[test]
    fn test_mask_secret() {
        assert_eq!(mask_secret("123456789:AAE-secret-part"), "123456789:...");
        assert_eq!(mask_secret("short"), "short...");
    }

    #[tokio::test]
    async fn test_missing_engine_is_reported() {
        let missing = check_dependencies("definitely-not-a-real-yt-dlp-binary").await;
        assert!(missing
            .iter()
            .any(|m| m.starts_with("definitely-not-a-real-yt-dlp-binary")));
    }
}
