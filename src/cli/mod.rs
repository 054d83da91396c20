use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "tubegrab",
    about = "Tubegrab - Download online videos as MP4 and extract MP3 audio with yt-dlp and ffmpeg",
    version,
    long_about = "Downloads a video with yt-dlp, then extracts its audio track to MP3 with ffmpeg. Both tools must be installed and on PATH (or configured in the config file)."
)]
pub struct Cli {
    /// Video URL to download
    #[arg(
        value_name = "URL",
        required_unless_present_any = ["interactive", "show_config"]
    )]
    pub url: Option<String>,

    /// Output folder (defaults to "downloads", or app.default_output_dir from the config)
    #[arg(value_name = "OUTPUT_DIR")]
    pub output: Option<PathBuf>,

    /// Skip the MP4 download; fetch the MP3 directly
    #[arg(long)]
    pub no_video: bool,

    /// Skip the MP3 extraction
    #[arg(long)]
    pub no_audio: bool,

    /// Configuration file (YAML)
    #[arg(short, long, value_name = "FILE", env = "TUBEGRAB_CONFIG")]
    pub config: Option<PathBuf>,

    /// Kill yt-dlp/ffmpeg if a single invocation runs longer than this
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: Option<u64>,

    /// Fill in the download form interactively
    #[arg(short, long, conflicts_with = "url")]
    pub interactive: bool,

    /// Show the effective configuration and exit
    #[arg(long)]
    pub show_config: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print status lines and the final result
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl Cli {
    /// Default tracing filter for the chosen verbosity
    pub fn log_filter(&self) -> &'static str {
        if self.verbose {
            "tubegrab=debug"
        } else if self.quiet {
            "tubegrab=error"
        } else {
            "tubegrab=warn"
        }
    }
}
