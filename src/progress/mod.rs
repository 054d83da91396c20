//! Best-effort progress scraping from the downloader's human-readable output.
//!
//! yt-dlp prints lines such as `[download]  45.3% of 10.00MiB at 1.2MiB/s ETA 00:07`.
//! Only the number directly in front of the first `%` is read; anything else on
//! the line is ignored. Lines that do not yield a number are not an error.

/// Range of the overall progress bar occupied by the video download
pub const VIDEO_FETCH_WINDOW: (u8, u8) = (30, 70);

/// Parse the percentage embedded in a progress line
pub fn parse_percent(line: &str) -> Option<f64> {
    let (head, _) = line.split_once('%')?;
    let token = head.split_whitespace().last()?;
    let value: f64 = token.parse().ok()?;

    if value.is_finite() && (0.0..=100.0).contains(&value) {
        Some(value)
    } else {
        None
    }
}

/// Linearly rescale a 0-100 percentage into the `(low, high)` window
pub fn rescale(percent: f64, (low, high): (u8, u8)) -> u8 {
    let span = f64::from(high.saturating_sub(low));
    let scaled = f64::from(low) + percent.clamp(0.0, 100.0) / 100.0 * span;
    (scaled as u8).clamp(low, high)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_download_line() {
        assert_eq!(
            parse_percent("[download]  45.3% of 10.00MiB at 1.20MiB/s ETA 00:07"),
            Some(45.3)
        );
        assert_eq!(parse_percent("[download] 100% of 3.5MiB in 00:02"), Some(100.0));
        assert_eq!(parse_percent("[download]   0.0% of ~ 120.00MiB"), Some(0.0));
    }

    #[test]
    fn test_parse_ignores_lines_without_percentage() {
        assert_eq!(parse_percent("[youtube] abc: Downloading webpage"), None);
        assert_eq!(parse_percent("[Merger] Merging formats into \"out.mp4\""), None);
        assert_eq!(parse_percent(""), None);
    }

    #[test]
    fn test_parse_rejects_garbage_before_marker() {
        assert_eq!(parse_percent("[download] N/A% of 3MiB"), None);
        assert_eq!(parse_percent("%"), None);
        assert_eq!(parse_percent("progress 250%"), None);
        assert_eq!(parse_percent("progress -5%"), None);
    }

    #[test]
    fn test_rescale_into_video_window() {
        assert_eq!(rescale(0.0, VIDEO_FETCH_WINDOW), 30);
        assert_eq!(rescale(50.0, VIDEO_FETCH_WINDOW), 50);
        assert_eq!(rescale(100.0, VIDEO_FETCH_WINDOW), 70);
        assert_eq!(rescale(45.3, VIDEO_FETCH_WINDOW), 48);
    }

    #[test]
    fn test_rescale_stays_in_window() {
        for step in 0..=1000 {
            let value = rescale(step as f64 / 10.0, VIDEO_FETCH_WINDOW);
            assert!((30..=70).contains(&value));
        }
        assert_eq!(rescale(-10.0, VIDEO_FETCH_WINDOW), 30);
        assert_eq!(rescale(500.0, VIDEO_FETCH_WINDOW), 70);
    }
}
