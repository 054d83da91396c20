use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

/// Notification emitted while a pipeline run makes progress
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    /// Overall completion, 0-100, never decreasing within a run
    Progress(u8),
    /// Short description of the current step
    Status(String),
    /// One line of free-form log output, including raw tool output
    Log(String),
    /// Run completed; carries the output directory
    Finished(PathBuf),
    /// Run failed; carries the full diagnostic
    Failed(String),
}

/// Receiver of pipeline events
pub trait EventSink: Send + Sync {
    fn emit(&self, event: PipelineEvent);
}

impl EventSink for UnboundedSender<PipelineEvent> {
    fn emit(&self, event: PipelineEvent) {
        // A caller that dropped its receiver no longer wants events; the run goes on.
        let _ = self.send(event);
    }
}

/// Cloneable handle used by the pipeline and engines to emit events
#[derive(Clone)]
pub struct Reporter {
    sink: Arc<dyn EventSink>,
    last_progress: Arc<AtomicU8>,
}

impl Reporter {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self {
            sink,
            last_progress: Arc::new(AtomicU8::new(0)),
        }
    }

    /// Emit the initial 0% of a run
    pub(crate) fn start(&self) {
        self.last_progress.store(0, Ordering::SeqCst);
        self.sink.emit(PipelineEvent::Progress(0));
    }

    /// Emit `value` if it moves the bar forward; smaller values are dropped
    pub fn progress(&self, value: u8) {
        let value = value.min(100);
        let previous = self.last_progress.fetch_max(value, Ordering::SeqCst);
        if value > previous {
            self.sink.emit(PipelineEvent::Progress(value));
        }
    }

    pub fn status(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::debug!("Status: {}", message);
        self.sink.emit(PipelineEvent::Status(message));
    }

    pub fn log(&self, line: impl Into<String>) {
        self.sink.emit(PipelineEvent::Log(line.into()));
    }

    pub(crate) fn finished(&self, output_dir: &Path) {
        self.sink.emit(PipelineEvent::Finished(output_dir.to_path_buf()));
    }

    pub(crate) fn failed(&self, reason: String) {
        self.sink.emit(PipelineEvent::Failed(reason));
    }
}
