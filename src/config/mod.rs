use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Primary format selection: best MP4 video with M4A audio, then any MP4, then anything
pub const DEFAULT_VIDEO_FORMAT: &str = "bestvideo[ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]/best";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// External tool locations
    pub engines: EnginesConfig,

    /// Downloader settings
    pub download: DownloadConfig,

    /// Transcoder settings
    pub transcode: TranscodeConfig,

    /// Application settings
    pub app: AppConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnginesConfig {
    /// Downloader executable name or path
    pub downloader: String,

    /// Transcoder executable name or path
    pub transcoder: String,

    /// Overrides PATH when resolving and spawning the tools
    pub search_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Format selector for the first video attempt
    pub video_format: String,

    /// Format selector for the single retry
    pub fallback_format: String,

    /// `--audio-quality` for audio-only downloads (0 is best)
    pub audio_quality: String,

    /// Extra arguments passed to every downloader invocation
    pub extra_args: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscodeConfig {
    /// Audio encoder
    pub audio_codec: String,

    /// VBR quality passed as `-q:a`
    pub audio_quality: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Output directory used when none is given on the command line
    pub default_output_dir: PathBuf,

    /// Kill an external tool that runs longer than this
    pub engine_timeout_secs: Option<u64>,
}

impl Default for EnginesConfig {
    fn default() -> Self {
        Self {
            downloader: "yt-dlp".to_string(),
            transcoder: "ffmpeg".to_string(),
            search_path: None,
        }
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            video_format: DEFAULT_VIDEO_FORMAT.to_string(),
            fallback_format: "best".to_string(),
            audio_quality: "0".to_string(),
            extra_args: Vec::new(),
        }
    }
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            audio_codec: "libmp3lame".to_string(),
            audio_quality: "2".to_string(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_output_dir: PathBuf::from("downloads"),
            engine_timeout_secs: None,
        }
    }
}

impl Config {
    /// Load configuration from an explicit file, the usual locations, or defaults
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => Self::config_path().filter(|path| path.exists()),
        };

        let Some(path) = path else {
            tracing::debug!("No config file found, using defaults");
            return Ok(Self::default());
        };

        tracing::debug!("Loading config from {}", path.display());
        let content = fs_err::read_to_string(&path).context("Failed to read config file")?;
        Self::from_yaml(&content)
    }

    /// Parse and validate a YAML document
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Config =
            serde_yaml::from_str(content).context("Failed to parse config file")?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self).context("Failed to serialize config")?;

        fs_err::write(path, content).context("Failed to write config file")?;

        Ok(())
    }

    /// Get configuration file path
    fn config_path() -> Option<PathBuf> {
        // First try current directory for easy testing
        let local_config = PathBuf::from("tubegrab.yaml");
        if local_config.exists() {
            return Some(local_config);
        }

        dirs::config_dir().map(|dir| dir.join("tubegrab").join("config.yaml"))
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.engines.downloader.trim().is_empty() {
            anyhow::bail!("engines.downloader must not be empty");
        }
        if self.engines.transcoder.trim().is_empty() {
            anyhow::bail!("engines.transcoder must not be empty");
        }
        if self.download.video_format.trim().is_empty()
            || self.download.fallback_format.trim().is_empty()
        {
            anyhow::bail!("download format selectors must not be empty");
        }
        if self.engine_timeout() == Some(Duration::ZERO) {
            anyhow::bail!("app.engine_timeout_secs must be greater than zero");
        }

        Ok(())
    }

    /// Per-invocation limit for external tools
    pub fn engine_timeout(&self) -> Option<Duration> {
        self.app.engine_timeout_secs.map(Duration::from_secs)
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  Downloader: {}", self.engines.downloader);
        println!("  Transcoder: {}", self.engines.transcoder);
        if let Some(search_path) = &self.engines.search_path {
            println!("  Search Path: {}", search_path);
        }
        println!("  Video Format: {}", self.download.video_format);
        println!("  Fallback Format: {}", self.download.fallback_format);
        println!(
            "  Audio: {} (quality {})",
            self.transcode.audio_codec, self.transcode.audio_quality
        );
        println!(
            "  Default Output: {}",
            self.app.default_output_dir.display()
        );
        match self.app.engine_timeout_secs {
            Some(secs) => println!("  Engine Timeout: {}s", secs),
            None => println!("  Engine Timeout: none"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.engines.downloader, "yt-dlp");
        assert_eq!(config.engines.transcoder, "ffmpeg");
        assert_eq!(config.download.video_format, DEFAULT_VIDEO_FORMAT);
        assert_eq!(config.download.fallback_format, "best");
        assert_eq!(config.app.default_output_dir, PathBuf::from("downloads"));
        assert_eq!(config.engine_timeout(), None);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = Config::from_yaml(
            "engines:\n  search_path: /opt/media/bin\napp:\n  engine_timeout_secs: 600\n",
        )
        .unwrap();

        assert_eq!(config.engines.downloader, "yt-dlp");
        assert_eq!(config.engines.search_path.as_deref(), Some("/opt/media/bin"));
        assert_eq!(config.engine_timeout(), Some(Duration::from_secs(600)));
        assert_eq!(config.transcode.audio_codec, "libmp3lame");
    }

    #[test]
    fn test_rejects_empty_engine_name() {
        let err = Config::from_yaml("engines:\n  downloader: \"\"\n").unwrap_err();
        assert!(err.to_string().contains("downloader"));
    }

    #[test]
    fn test_rejects_zero_timeout() {
        assert!(Config::from_yaml("app:\n  engine_timeout_secs: 0\n").is_err());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.yaml");

        let mut config = Config::default();
        config.download.extra_args = vec!["--cookies".into(), "cookies.txt".into()];
        config.save(&path).unwrap();

        let loaded = Config::load(Some(&path)).unwrap();
        assert_eq!(loaded.download.extra_args, config.download.extra_args);
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(Config::load(Some(&dir.path().join("absent.yaml"))).is_err());
    }
}
