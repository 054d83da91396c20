use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio_util::sync::CancellationToken;

mod events;

pub use events::{EventSink, PipelineEvent, Reporter};

use crate::config::Config;
use crate::deps::Prober;
use crate::engines::{EngineError, ExternalEngine, MediaEngine, RunContext, VideoQuality};
use crate::progress::VIDEO_FETCH_WINDOW;
use crate::utils;
use crate::PipelineError;

/// Terminal state of one run: the output directory, or why it failed
pub type RunResult = std::result::Result<PathBuf, PipelineError>;

/// Share of the bar used by a direct audio download
const AUDIO_FETCH_WINDOW: (u8, u8) = (70, 95);

/// One download request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub locator: String,
    pub output_dir: PathBuf,
    pub want_video: bool,
    pub want_audio: bool,
}

impl Request {
    /// Request both the video and its MP3 extract
    pub fn new(locator: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            locator: locator.into(),
            output_dir: output_dir.into(),
            want_video: true,
            want_audio: true,
        }
    }

    pub fn video(mut self, want_video: bool) -> Self {
        self.want_video = want_video;
        self
    }

    pub fn audio(mut self, want_audio: bool) -> Self {
        self.want_audio = want_audio;
        self
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.locator.trim().is_empty() {
            return Err(PipelineError::Validation(
                "Please enter a video URL".to_string(),
            ));
        }
        if self.output_dir.as_os_str().is_empty() {
            return Err(PipelineError::Validation(
                "Please select an output folder".to_string(),
            ));
        }
        if !self.want_video && !self.want_audio {
            return Err(PipelineError::Validation(
                "Please select at least one format to download".to_string(),
            ));
        }
        Ok(())
    }
}

/// Where the video and audio of one request are written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub video_file: PathBuf,
    pub audio_file: PathBuf,
}

impl OutputPaths {
    pub fn derive(output_dir: &Path, title: &str) -> Self {
        let mut name = utils::sanitize_filename(title);
        if name.trim().is_empty() {
            name = "video".to_string();
        }

        Self {
            video_file: output_dir.join(format!("{}.mp4", name)),
            audio_file: output_dir.join(format!("{}.mp3", name)),
        }
    }
}

/// Drives one request through dependency check, metadata, video and audio steps
pub struct Orchestrator<E = ExternalEngine> {
    prober: Prober,
    engine: E,
    timeout: Option<Duration>,
}

impl Orchestrator<ExternalEngine> {
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            Prober::from_config(config),
            ExternalEngine::from_config(config),
        )
        .with_timeout(config.engine_timeout())
    }
}

impl<E: MediaEngine> Orchestrator<E> {
    pub fn new(prober: Prober, engine: E) -> Self {
        Self {
            prober,
            engine,
            timeout: None,
        }
    }

    /// Limit every external tool invocation to `timeout`
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run `request` to a terminal state, emitting events to `sink` along the way.
    ///
    /// Failures are written to the log stream before the `Failed` event.
    pub async fn run(
        &self,
        request: Request,
        sink: Arc<dyn EventSink>,
        cancel: CancellationToken,
    ) -> RunResult {
        let reporter = Reporter::new(sink);
        let result = self.execute(&request, &reporter, cancel).await;

        match &result {
            Ok(output_dir) => {
                tracing::info!("Files saved to: {}", output_dir.display());
                reporter.finished(output_dir);
            }
            Err(e) => {
                tracing::error!("Download failed: {}", e);
                let reason = e.to_string();
                reporter.log(reason.clone());
                reporter.failed(reason);
            }
        }

        result
    }

    async fn execute(
        &self,
        request: &Request,
        reporter: &Reporter,
        cancel: CancellationToken,
    ) -> RunResult {
        request.validate()?;
        reporter.start();

        reporter.status("Checking dependencies...");
        let missing = self.prober.probe();
        if !missing.is_empty() {
            return Err(PipelineError::MissingDependencies(
                missing.into_iter().map(|dep| dep.name).collect(),
            ));
        }

        tokio::fs::create_dir_all(&request.output_dir)
            .await
            .map_err(|source| PipelineError::Filesystem {
                path: request.output_dir.clone(),
                source,
            })?;

        let ctx = RunContext::new(reporter.clone(), cancel, self.timeout);

        checkpoint(&ctx)?;
        reporter.status("Getting video information...");
        reporter.progress(10);
        if let Some(domain) = utils::extract_domain(&request.locator) {
            tracing::info!("Fetching video information from {}", domain);
        }

        let metadata = self
            .engine
            .fetch_metadata(&request.locator, &ctx)
            .await
            .map_err(|e| step_failure(e, PipelineError::MetadataFetch))?;
        reporter.progress(20);

        let title = metadata.title();
        let paths = OutputPaths::derive(&request.output_dir, title);
        reporter.status(format!("Downloading: {}", title));
        match metadata.duration {
            Some(seconds) => reporter.log(format!(
                "Downloading: {} ({})",
                title,
                utils::format_duration(seconds)
            )),
            None => reporter.log(format!("Downloading: {}", title)),
        }

        if request.want_video {
            self.fetch_video(request, &paths, &ctx).await?;
        }

        if request.want_audio {
            checkpoint(&ctx)?;
            reporter.status("Extracting MP3 (audio)...");
            reporter.log("Extracting MP3 audio...");
            reporter.progress(70);

            let extracted = if request.want_video {
                self.engine
                    .extract_audio(&paths.video_file, &paths.audio_file, &ctx)
                    .await
            } else {
                let audio_ctx = ctx.with_progress_window(AUDIO_FETCH_WINDOW);
                self.engine
                    .fetch_audio(&request.locator, &paths.audio_file, &audio_ctx)
                    .await
            };
            extracted.map_err(|e| step_failure(e, PipelineError::AudioExtraction))?;

            reporter.log(format!(
                "MP3 extraction complete: {}",
                paths.audio_file.display()
            ));
        }

        reporter.progress(100);
        reporter.status("Download complete!");
        Ok(request.output_dir.clone())
    }

    /// Preferred format first, then exactly one retry with the permissive selector
    async fn fetch_video(
        &self,
        request: &Request,
        paths: &OutputPaths,
        ctx: &RunContext,
    ) -> Result<(), PipelineError> {
        checkpoint(ctx)?;
        let reporter = ctx.reporter();
        reporter.status("Downloading MP4 (video)...");
        reporter.log("Downloading video...");
        reporter.progress(VIDEO_FETCH_WINDOW.0);

        let video_ctx = ctx.with_progress_window(VIDEO_FETCH_WINDOW);
        let first = self
            .engine
            .fetch_video(
                &request.locator,
                VideoQuality::Preferred,
                &paths.video_file,
                &video_ctx,
            )
            .await;

        match first {
            Ok(()) => {}
            Err(EngineError::Cancelled) => return Err(PipelineError::Cancelled),
            Err(e) => {
                tracing::warn!("Preferred video format failed, trying fallback: {}", e);
                reporter.log(format!("Error downloading video: {}", e));
                reporter.status("Trying alternative video format...");
                reporter.log("Trying alternative video format...");
                checkpoint(ctx)?;

                self.engine
                    .fetch_video(
                        &request.locator,
                        VideoQuality::AnyBest,
                        &paths.video_file,
                        &video_ctx,
                    )
                    .await
                    .map_err(|e| step_failure(e, PipelineError::VideoFetch))?;

                reporter.log(format!(
                    "Fallback format used, {} may not contain MP4 data",
                    paths.video_file.display()
                ));
            }
        }

        reporter.progress(VIDEO_FETCH_WINDOW.1);
        reporter.log(format!(
            "MP4 download complete: {}",
            paths.video_file.display()
        ));
        Ok(())
    }
}

impl<E: MediaEngine + 'static> Orchestrator<E> {
    /// Start the run on a dedicated worker thread and return immediately.
    ///
    /// The worker owns its own single-threaded runtime, so the caller does not
    /// need one; events arrive through the returned handle.
    pub fn spawn(self, request: Request) -> std::io::Result<RunHandle> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let worker = std::thread::Builder::new()
            .name("tubegrab-worker".to_string())
            .spawn(move || runtime.block_on(self.run(request, Arc::new(tx), token)))?;

        Ok(RunHandle {
            events: rx,
            cancel,
            worker,
        })
    }
}

/// Caller's side of a run started with [`Orchestrator::spawn`]
pub struct RunHandle {
    events: mpsc::UnboundedReceiver<PipelineEvent>,
    cancel: CancellationToken,
    worker: JoinHandle<RunResult>,
}

impl RunHandle {
    /// Next pending event without waiting
    pub fn try_next_event(&mut self) -> Result<PipelineEvent, TryRecvError> {
        self.events.try_recv()
    }

    /// Wait for the next event; `None` once the run is over and drained
    pub async fn next_event(&mut self) -> Option<PipelineEvent> {
        self.events.recv().await
    }

    /// Ask the run to stop; an in-flight tool is killed
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.worker.is_finished()
    }

    /// Wait for the worker and return its result
    pub fn join(self) -> std::thread::Result<RunResult> {
        self.worker.join()
    }
}

fn checkpoint(ctx: &RunContext) -> Result<(), PipelineError> {
    if ctx.cancel_token().is_cancelled() {
        Err(PipelineError::Cancelled)
    } else {
        Ok(())
    }
}

fn step_failure(err: EngineError, kind: fn(String) -> PipelineError) -> PipelineError {
    match err {
        EngineError::Cancelled => PipelineError::Cancelled,
        other => kind(other.to_string()),
    }
}
