use console::style;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::path::Path;

use crate::pipeline::{EventSink, PipelineEvent};
use crate::utils;

/// Renders pipeline events as plain text on standard output.
///
/// When stdout is a terminal a progress bar is drawn as well; otherwise
/// progress milestones are printed as lines.
pub struct ConsoleSink {
    bar: ProgressBar,
    quiet: bool,
}

impl ConsoleSink {
    pub fn new(quiet: bool) -> Self {
        let bar = if quiet {
            ProgressBar::hidden()
        } else {
            ProgressBar::with_draw_target(Some(100), ProgressDrawTarget::stdout())
        };
        bar.set_style(progress_style());

        Self { bar, quiet }
    }

    /// Print a line without tearing the progress bar
    fn line(&self, text: &str) {
        self.bar.suspend(|| println!("{}", text));
    }
}

impl EventSink for ConsoleSink {
    fn emit(&self, event: PipelineEvent) {
        match event {
            PipelineEvent::Progress(value) => {
                self.bar.set_position(u64::from(value));
                if self.bar.is_hidden() && !self.quiet {
                    println!("Progress: {}%", value);
                }
            }
            PipelineEvent::Status(message) => {
                self.line(&style(&message).bold().to_string());
                self.bar.set_message(message);
            }
            PipelineEvent::Log(line) => {
                if !self.quiet {
                    self.line(&line);
                }
            }
            PipelineEvent::Finished(output_dir) => {
                self.bar.finish_with_message("Download complete!");
                println!("{}", saved_to(&output_dir));
            }
            PipelineEvent::Failed(reason) => {
                self.bar.abandon_with_message("Download failed");
                // Without log lines the diagnostic would otherwise never be shown.
                if self.quiet {
                    println!("{}", reason);
                }
            }
        }
    }
}

fn progress_style() -> ProgressStyle {
    ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>3}% {msg}",
    )
    .map(|style| style.progress_chars("#>-"))
    .unwrap_or_else(|_| ProgressStyle::default_bar())
}

/// Final success line shared by both front-ends
pub fn saved_to(output_dir: &Path) -> String {
    format!(
        "Files saved to: {}",
        style(utils::display_path(output_dir).display()).green()
    )
}
