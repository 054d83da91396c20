use std::path::{Path, PathBuf};
use url::Url;

/// Characters that cannot appear in a file name on at least one supported platform
const FORBIDDEN_FILENAME_CHARS: &[char] = &['\\', '/', '*', '?', ':', '"', '<', '>', '|'];

/// Sanitize filename for safe filesystem usage.
///
/// Path-breaking characters are deleted, every other character is kept as-is.
pub fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .filter(|c| !FORBIDDEN_FILENAME_CHARS.contains(c))
        .collect()
}

/// Format duration in human-readable format
pub fn format_duration(seconds: f64) -> String {
    let total_seconds = seconds as u64;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}

/// Extract domain from URL for display purposes
pub fn extract_domain(url: &str) -> Option<String> {
    Url::parse(url).ok()?.host_str().map(|host| {
        // Remove 'www.' prefix if present
        host.strip_prefix("www.").unwrap_or(host).to_string()
    })
}

/// Absolute form of `path` for user-facing messages, falling back to the path itself
pub fn display_path(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_filename_deletes_forbidden_characters() {
        assert_eq!(sanitize_filename(r#"Test: "Video"?"#), "Test Video");
        assert_eq!(sanitize_filename(r"a\b/c*d?e:f"), "abcdef");
        assert_eq!(sanitize_filename(r#"<x>|"y""#), "xy");
    }

    #[test]
    fn test_sanitize_filename_keeps_everything_else() {
        let title = "  Ünïcode — & 100% [live] (2024) #1 ";
        assert_eq!(sanitize_filename(title), title);
    }

    #[test]
    fn test_sanitize_filename_only_forbidden() {
        assert_eq!(sanitize_filename(r#"\/*?:"<>|"#), "");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(30.0), "30s");
        assert_eq!(format_duration(90.0), "1m 30s");
        assert_eq!(format_duration(3661.0), "1h 1m 1s");
    }

    #[test]
    fn test_extract_domain() {
        assert_eq!(
            extract_domain("https://www.youtube.com/watch?v=123"),
            Some("youtube.com".to_string())
        );
        assert_eq!(
            extract_domain("https://vimeo.com/123"),
            Some("vimeo.com".to_string())
        );
        assert_eq!(extract_domain("invalid-url"), None);
    }
}
