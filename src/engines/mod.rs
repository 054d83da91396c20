use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub mod ffmpeg;
mod process;
pub mod ytdlp;

use crate::config::Config;
use crate::pipeline::Reporter;
use crate::progress;

/// Metadata returned by the downloader's JSON dump.
///
/// Only the title drives the pipeline; the rest is shown in log lines.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VideoMetadata {
    pub title: Option<String>,
    pub id: Option<String>,
    pub duration: Option<f64>,
    pub uploader: Option<String>,
}

impl VideoMetadata {
    /// Title used for output names, `"video"` when the downloader reported none
    pub fn title(&self) -> &str {
        self.title.as_deref().unwrap_or("video")
    }
}

/// Format selection for a video download attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoQuality {
    /// Best MP4-compatible video and audio, merged
    Preferred,
    /// Whatever single stream the downloader considers best
    AnyBest,
}

/// Failure of a single external tool invocation
#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    #[error("Failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error while running {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Non-zero exit; `diagnostic` is the tool's stderr as captured
    #[error("{diagnostic}")]
    Failed {
        program: String,
        code: Option<i32>,
        diagnostic: String,
    },

    #[error("Unparsable output from {program}: {reason}")]
    InvalidOutput { program: String, reason: String },

    #[error("{program} timed out after {}s", .after.as_secs())]
    TimedOut { program: String, after: Duration },

    #[error("cancelled")]
    Cancelled,
}

/// Per-step execution context handed to every engine call
#[derive(Clone)]
pub struct RunContext {
    reporter: Reporter,
    cancel: CancellationToken,
    timeout: Option<Duration>,
    window: Option<(u8, u8)>,
}

impl RunContext {
    pub fn new(reporter: Reporter, cancel: CancellationToken, timeout: Option<Duration>) -> Self {
        Self {
            reporter,
            cancel,
            timeout,
            window: None,
        }
    }

    /// Copy of this context whose percentages land in `window` of the overall bar
    pub fn with_progress_window(&self, window: (u8, u8)) -> Self {
        Self {
            window: Some(window),
            ..self.clone()
        }
    }

    pub fn reporter(&self) -> &Reporter {
        &self.reporter
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Report a 0-100 percentage of the current step
    pub fn report_percent(&self, percent: f64) {
        if let Some(window) = self.window {
            self.reporter.progress(progress::rescale(percent, window));
        }
    }
}

/// The operations the pipeline needs from the external tools
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// Fetch metadata without downloading media
    async fn fetch_metadata(
        &self,
        locator: &str,
        ctx: &RunContext,
    ) -> Result<VideoMetadata, EngineError>;

    /// Download muxed video and audio to `dest`
    async fn fetch_video(
        &self,
        locator: &str,
        quality: VideoQuality,
        dest: &Path,
        ctx: &RunContext,
    ) -> Result<(), EngineError>;

    /// Download the best audio straight to an MP3 at `dest`
    async fn fetch_audio(
        &self,
        locator: &str,
        dest: &Path,
        ctx: &RunContext,
    ) -> Result<(), EngineError>;

    /// Transcode the audio track of a downloaded video to an MP3 at `dest`
    async fn extract_audio(
        &self,
        video: &Path,
        dest: &Path,
        ctx: &RunContext,
    ) -> Result<(), EngineError>;
}

/// yt-dlp for everything fetched from the network, ffmpeg for transcoding
pub struct ExternalEngine {
    downloader: ytdlp::YtDlp,
    transcoder: ffmpeg::Ffmpeg,
}

impl ExternalEngine {
    pub fn new(downloader: ytdlp::YtDlp, transcoder: ffmpeg::Ffmpeg) -> Self {
        Self {
            downloader,
            transcoder,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            ytdlp::YtDlp::from_config(config),
            ffmpeg::Ffmpeg::from_config(config),
        )
    }
}

#[async_trait]
impl MediaEngine for ExternalEngine {
    async fn fetch_metadata(
        &self,
        locator: &str,
        ctx: &RunContext,
    ) -> Result<VideoMetadata, EngineError> {
        self.downloader.fetch_metadata(locator, ctx).await
    }

    async fn fetch_video(
        &self,
        locator: &str,
        quality: VideoQuality,
        dest: &Path,
        ctx: &RunContext,
    ) -> Result<(), EngineError> {
        self.downloader.fetch_video(locator, quality, dest, ctx).await
    }

    async fn fetch_audio(
        &self,
        locator: &str,
        dest: &Path,
        ctx: &RunContext,
    ) -> Result<(), EngineError> {
        self.downloader.fetch_audio(locator, dest, ctx).await
    }

    async fn extract_audio(
        &self,
        video: &Path,
        dest: &Path,
        ctx: &RunContext,
    ) -> Result<(), EngineError> {
        self.transcoder.extract_audio(video, dest, ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_title_defaults_to_video() {
        let metadata: VideoMetadata = serde_json::from_str(r#"{"id": "abc"}"#).unwrap();
        assert_eq!(metadata.title(), "video");

        let metadata: VideoMetadata = serde_json::from_str(r#"{"title": null}"#).unwrap();
        assert_eq!(metadata.title(), "video");
    }

    #[test]
    fn test_metadata_ignores_unknown_fields() {
        let metadata: VideoMetadata = serde_json::from_str(
            r#"{"title": "Clip", "duration": 12.5, "formats": [{"format_id": "18"}], "view_count": 3}"#,
        )
        .unwrap();
        assert_eq!(metadata.title(), "Clip");
        assert_eq!(metadata.duration, Some(12.5));
    }

    #[test]
    fn test_failed_error_displays_diagnostic_verbatim() {
        let err = EngineError::Failed {
            program: "yt-dlp".into(),
            code: Some(1),
            diagnostic: "ERROR: [youtube] abc: Video unavailable\n".into(),
        };
        assert_eq!(err.to_string(), "ERROR: [youtube] abc: Video unavailable\n");
    }
}
