use std::path::Path;
use tokio::process::Command;

use super::process::{self, run_captured, run_streaming};
use super::{EngineError, RunContext, VideoMetadata, VideoQuality};
use crate::config::Config;
use crate::progress;

/// Downloader driven through the yt-dlp command line
pub struct YtDlp {
    yt_dlp_path: String,
    search_path: Option<String>,
    video_format: String,
    fallback_format: String,
    audio_quality: String,
    extra_args: Vec<String>,
}

impl YtDlp {
    pub fn from_config(config: &Config) -> Self {
        Self {
            yt_dlp_path: config.engines.downloader.clone(),
            search_path: config.engines.search_path.clone(),
            video_format: config.download.video_format.clone(),
            fallback_format: config.download.fallback_format.clone(),
            audio_quality: config.download.audio_quality.clone(),
            extra_args: config.download.extra_args.clone(),
        }
    }

    fn command(&self) -> Command {
        let mut cmd = process::tool_command(&self.yt_dlp_path, self.search_path.as_deref());
        cmd.arg("--no-playlist").args(&self.extra_args);
        cmd
    }

    fn format_selector(&self, quality: VideoQuality) -> &str {
        match quality {
            VideoQuality::Preferred => &self.video_format,
            VideoQuality::AnyBest => &self.fallback_format,
        }
    }

    /// Get video information using `--dump-json`
    pub async fn fetch_metadata(
        &self,
        url: &str,
        ctx: &RunContext,
    ) -> Result<VideoMetadata, EngineError> {
        tracing::debug!("Extracting video info for: {}", url);

        let mut cmd = self.command();
        cmd.arg("--dump-json").arg(url);

        let program = process::program_name(&cmd);
        let output = run_captured(cmd, ctx).await?.success(&program)?;

        serde_json::from_slice(&output.stdout).map_err(|e| EngineError::InvalidOutput {
            program,
            reason: e.to_string(),
        })
    }

    /// Download video to `output_path`, reporting the downloader's own percentages
    pub async fn fetch_video(
        &self,
        url: &str,
        quality: VideoQuality,
        output_path: &Path,
        ctx: &RunContext,
    ) -> Result<(), EngineError> {
        let format = self.format_selector(quality);
        tracing::debug!("Downloading video for {} with format {}", url, format);

        let mut cmd = self.command();
        cmd.args(["-f", format, "--newline", "-o"])
            .arg(output_path)
            .arg(url);

        self.run_with_progress(cmd, ctx).await
    }

    /// Download and convert the best audio straight to MP3
    pub async fn fetch_audio(
        &self,
        url: &str,
        output_path: &Path,
        ctx: &RunContext,
    ) -> Result<(), EngineError> {
        tracing::debug!("Downloading audio directly for: {}", url);

        let mut cmd = self.command();
        cmd.args([
            "--extract-audio",
            "--audio-format",
            "mp3",
            "--audio-quality",
            self.audio_quality.as_str(),
            "--newline",
            "-o",
        ])
        .arg(output_path)
        .arg(url);

        self.run_with_progress(cmd, ctx).await
    }

    async fn run_with_progress(&self, cmd: Command, ctx: &RunContext) -> Result<(), EngineError> {
        let program = process::program_name(&cmd);

        run_streaming(cmd, ctx, |line| {
            if let Some(percent) = progress::parse_percent(line) {
                ctx.report_percent(percent);
            }
        })
        .await?
        .success(&program)?;

        Ok(())
    }
}
