//! Tubegrab - A Rust CLI tool for downloading online videos and extracting MP3 audio
//!
//! This library drives two external tools, `yt-dlp` for fetching and `ffmpeg` for
//! transcoding, through a single sequential pipeline that reports progress to the
//! caller either inline (blocking) or over a channel from a worker thread.

use std::path::PathBuf;

pub mod cli;
pub mod config;
pub mod deps;
pub mod engines;
pub mod interactive;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod utils;

pub use cli::Cli;
pub use config::Config;
pub use deps::{MissingDependency, Prober};
pub use engines::{EngineError, ExternalEngine, MediaEngine, VideoMetadata, VideoQuality};
pub use pipeline::{
    EventSink, Orchestrator, OutputPaths, PipelineEvent, Request, RunHandle, RunResult,
};

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;

/// Terminal failure of one pipeline run
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("{0}")]
    Validation(String),

    #[error("Missing required dependencies: {}", .0.join(", "))]
    MissingDependencies(Vec<String>),

    #[error("Failed to create output directory {}: {source}", .path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Error getting video info: {0}")]
    MetadataFetch(String),

    #[error("Error downloading video: {0}")]
    VideoFetch(String),

    #[error("Error extracting audio: {0}")]
    AudioExtraction(String),

    #[error("Download cancelled")]
    Cancelled,
}
