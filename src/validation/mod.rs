use once_cell::sync::Lazy;
use regex::Regex;

/// Canonical watch URL prefix every accepted link is normalized to
pub const WATCH_URL_PREFIX: &str = "https://www.youtube.com/watch?v=";

/// Long-form `watch?v=` or short-form `youtu.be/` link followed by an
/// 11-character video id. Query parameters after the id are tolerated.
static WATCH_URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:https?://)?(?:www\.)?(?:youtube\.com/watch\?v=|youtu\.be/)([A-Za-z0-9_-]{11})(?:[?&#]\S*)?$",
    )
    .expect("watch url pattern is valid")
});

/// Outcome of checking user input against the accepted URL shape
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    /// Input was a watch URL; holds the normalized form
    Valid(String),
    Invalid,
}

/// Classify raw message text as a YouTube watch URL.
///
/// Surrounding whitespace is trimmed; anything else that does not match the
/// accepted shape exactly is rejected.
pub fn validate(input: &str) -> ValidationResult {
    let trimmed = input.trim();

    match WATCH_URL_RE.captures(trimmed) {
        Some(caps) => {
            let video_id = &caps[1];
            ValidationResult::Valid(format!("{}{}", WATCH_URL_PREFIX, video_id))
        }
        None => ValidationResult::Invalid,
    }
}

/// Extract the video id from a normalized watch URL
pub fn video_id(normalized: &str) -> Option<&str> {
    normalized.strip_prefix(WATCH_URL_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CANONICAL: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";

    #[test]
    fn test_accepts_every_prefix_combination() {
        let hosts = ["youtube.com/watch?v=", "www.youtube.com/watch?v=", "youtu.be/", "www.youtu.be/"];
        let schemes = ["", "http://", "https://"];

        for scheme in schemes {
            for host in hosts {
                let input = format!("{}{}dQw4w9WgXcQ", scheme, host);
                assert_eq!(
                    validate(&input),
                    ValidationResult::Valid(CANONICAL.to_string()),
                    "expected {} to be valid",
                    input
                );
            }
        }
    }

    #[test]
    fn test_url_safe_alphabet() {
        assert_eq!(
            validate("https://youtu.be/a-_Z09zzAAb"),
            ValidationResult::Valid(format!("{}a-_Z09zzAAb", WATCH_URL_PREFIX))
        );
    }

    #[test]
    fn test_trims_surrounding_whitespace() {
        assert_eq!(
            validate("  https://www.youtube.com/watch?v=dQw4w9WgXcQ\n"),
            ValidationResult::Valid(CANONICAL.to_string())
        );
    }

    #[test]
    fn test_drops_trailing_parameters() {
        assert_eq!(
            validate("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=42s"),
            ValidationResult::Valid(CANONICAL.to_string())
        );
        assert_eq!(
            validate("https://youtu.be/dQw4w9WgXcQ?si=abcdef"),
            ValidationResult::Valid(CANONICAL.to_string())
        );
    }

    #[test]
    fn test_rejects_wrong_identifier_length() {
        assert_eq!(validate("https://www.youtube.com/watch?v=dQw4w9WgXc"), ValidationResult::Invalid);
        assert_eq!(validate("https://www.youtube.com/watch?v=dQw4w9WgXcQQ"), ValidationResult::Invalid);
        assert_eq!(validate("https://youtu.be/"), ValidationResult::Invalid);
    }

    #[test]
    fn test_rejects_everything_else() {
        let inputs = [
            "",
            "   ",
            "not a url",
            "https://vimeo.com/watch?v=dQw4w9WgXcQ",
            "https://www.youtube.com/embed/dQw4w9WgXcQ",
            "ftp://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://www.youtube.com/watch?v=dQw4w9W gXcQ",
            "https://www.youtube.com/watch?v=dQw4w9WgXc!",
            "look at https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ please",
        ];

        for input in inputs {
            assert_eq!(validate(input), ValidationResult::Invalid, "expected {:?} to be rejected", input);
        }
    }

    #[test]
    fn test_video_id() {
        assert_eq!(video_id(CANONICAL), Some("dQw4w9WgXcQ"));
        assert_eq!(video_id("https://example.com"), None);
    }
}
