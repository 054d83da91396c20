use std::path::Path;

use super::process::{self, run_captured};
use super::{EngineError, RunContext};
use crate::config::Config;

/// Audio extraction through the ffmpeg command line
pub struct Ffmpeg {
    ffmpeg_path: String,
    search_path: Option<String>,
    audio_codec: String,
    audio_quality: String,
}

impl Ffmpeg {
    pub fn from_config(config: &Config) -> Self {
        Self {
            ffmpeg_path: config.engines.transcoder.clone(),
            search_path: config.engines.search_path.clone(),
            audio_codec: config.transcode.audio_codec.clone(),
            audio_quality: config.transcode.audio_quality.clone(),
        }
    }

    /// Strip the video stream and encode the audio, overwriting `target_path`
    pub async fn extract_audio(
        &self,
        source_path: &Path,
        target_path: &Path,
        ctx: &RunContext,
    ) -> Result<(), EngineError> {
        tracing::debug!(
            "Extracting audio {} -> {}",
            source_path.display(),
            target_path.display()
        );

        let mut cmd = process::tool_command(&self.ffmpeg_path, self.search_path.as_deref());
        cmd.arg("-i")
            .arg(source_path)
            .args([
                "-vn", // No video
                "-acodec",
                self.audio_codec.as_str(),
                "-q:a",
                self.audio_quality.as_str(),
            ])
            .arg(target_path)
            .arg("-y"); // Overwrite output file

        let program = process::program_name(&cmd);
        run_captured(cmd, ctx).await?.success(&program)?;

        Ok(())
    }
}
