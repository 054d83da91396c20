//! Terminal form front-end.
//!
//! The form collects the same inputs as a desktop download dialog, starts the
//! pipeline on a worker thread, and keeps the foreground thread free to render
//! progress, status and log lines as events arrive.

use anyhow::{Context, Result};
use console::{style, Term};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::io::BufRead;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc::error::TryRecvError;

use crate::config::Config;
use crate::deps;
use crate::output;
use crate::pipeline::{Orchestrator, PipelineEvent, Request, RunHandle};
use crate::PipelineError;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Standard input was closed while the form was waiting for an answer
#[derive(thiserror::Error, Debug)]
#[error("input closed")]
struct InputClosed;

/// Values entered in the form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormInput {
    pub url: String,
    pub output_dir: String,
    pub download_video: bool,
    pub extract_audio: bool,
}

impl FormInput {
    pub fn defaults(config: &Config) -> Self {
        let output_dir = dirs::download_dir()
            .unwrap_or_else(|| config.app.default_output_dir.clone())
            .display()
            .to_string();

        Self {
            url: String::new(),
            output_dir,
            download_video: true,
            extract_audio: true,
        }
    }

    pub fn to_request(&self) -> Request {
        Request::new(self.url.trim(), expand_home(self.output_dir.trim()))
            .video(self.download_video)
            .audio(self.extract_audio)
    }
}

/// Show the form until the user stops, running one download per submission
pub fn run(config: &Config) -> Result<()> {
    let term = Term::stdout();
    term.write_line(&style("Tubegrab - MP4 & MP3 Downloader").bold().to_string())?;
    term.write_line("Leave the URL empty to quit.")?;

    let mut previous = FormInput::defaults(config);
    loop {
        let form = match prompt_form(&term, &previous) {
            Ok(Some(form)) => form,
            Ok(None) => break,
            Err(e) if e.is::<InputClosed>() => break,
            Err(e) => return Err(e),
        };

        let request = form.to_request();
        previous = form;

        if let Err(e) = request.validate() {
            notify(&term, false, "Error", &e.to_string())?;
            continue;
        }

        let handle = Orchestrator::from_config(config)
            .spawn(request)
            .context("Failed to start download worker")?;

        match watch(&term, handle)? {
            Ok(output_dir) => notify(
                &term,
                true,
                "Success",
                &format!("Download complete!\n{}", output::saved_to(&output_dir)),
            )?,
            Err(reason) => notify(&term, false, "Error", &format!("Download failed:\n\n{}", reason))?,
        }

        match confirm(&term, "Start another download?", false) {
            Ok(true) => continue,
            Ok(false) => break,
            Err(e) if e.is::<InputClosed>() => break,
            Err(e) => return Err(e),
        }
    }

    Ok(())
}

fn prompt_form(term: &Term, previous: &FormInput) -> Result<Option<FormInput>> {
    term.write_line("")?;
    let url = ask(term, "Video URL", &previous.url)?;
    if url.is_empty() {
        return Ok(None);
    }

    let output_dir = ask(term, "Output folder", &previous.output_dir)?;
    let download_video = confirm(term, "Download MP4 video?", previous.download_video)?;
    let extract_audio = confirm(term, "Extract MP3 audio?", previous.extract_audio)?;

    Ok(Some(FormInput {
        url,
        output_dir,
        download_video,
        extract_audio,
    }))
}

/// Render events from the worker until it finishes, then return its outcome
fn watch(term: &Term, mut handle: RunHandle) -> Result<std::result::Result<PathBuf, String>> {
    let bar = ProgressBar::with_draw_target(Some(100), ProgressDrawTarget::term(term.clone(), 20));
    bar.set_style(
        ProgressStyle::with_template("[{bar:40.cyan/blue}] {pos:>3}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    bar.set_message("Ready to download");

    loop {
        match handle.try_next_event() {
            Ok(PipelineEvent::Progress(value)) => bar.set_position(u64::from(value)),
            Ok(PipelineEvent::Status(message)) => bar.set_message(message),
            Ok(PipelineEvent::Log(line)) => bar.suspend(|| println!("{}", line)),
            Ok(PipelineEvent::Finished(_)) => bar.finish_with_message("Download complete!"),
            Ok(PipelineEvent::Failed(_)) => bar.abandon_with_message("Error: Download failed"),
            Err(TryRecvError::Empty) => {
                bar.tick();
                std::thread::sleep(POLL_INTERVAL);
            }
            Err(TryRecvError::Disconnected) => break,
        }
    }

    let result = handle
        .join()
        .map_err(|_| anyhow::anyhow!("Download worker panicked"))?;

    Ok(result.map_err(|e| match e {
        PipelineError::MissingDependencies(tools) => format!(
            "Missing required dependencies: {}\n\n{}",
            tools.join(", "),
            deps::install_hint(&tools)
        ),
        other => other.to_string(),
    }))
}

/// Framed message standing in for a modal dialog
fn notify(term: &Term, success: bool, title: &str, body: &str) -> Result<()> {
    let width = body
        .lines()
        .chain([title])
        .map(console::measure_text_width)
        .max()
        .unwrap_or(0);
    let border = format!("+{}+", "-".repeat(width + 2));

    let heading = console::pad_str(title, width, console::Alignment::Left, None);
    let heading = if success {
        style(heading).green().bold()
    } else {
        style(heading).red().bold()
    };

    term.write_line("")?;
    term.write_line(&border)?;
    term.write_line(&format!("| {} |", heading))?;
    term.write_line(&border)?;
    for line in body.lines() {
        let padded = console::pad_str(line, width, console::Alignment::Left, None);
        term.write_line(&format!("| {} |", padded))?;
    }
    term.write_line(&border)?;
    Ok(())
}

fn ask(term: &Term, label: &str, default: &str) -> Result<String> {
    if default.is_empty() {
        term.write_str(&format!("{}: ", label))?;
    } else {
        term.write_str(&format!("{} [{}]: ", label, default))?;
    }

    let answer = read_answer()?;
    Ok(if answer.is_empty() {
        default.to_string()
    } else {
        answer
    })
}

fn confirm(term: &Term, label: &str, default: bool) -> Result<bool> {
    let hint = if default { "Y/n" } else { "y/N" };
    term.write_str(&format!("{} [{}]: ", label, hint))?;
    Ok(parse_toggle(&read_answer()?, default))
}

fn read_answer() -> Result<String> {
    let mut line = String::new();
    let read = std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read answer")?;
    if read == 0 {
        return Err(InputClosed.into());
    }
    Ok(line.trim().to_string())
}

/// Interpret a yes/no answer, keeping `default` for anything unrecognised
pub fn parse_toggle(answer: &str, default: bool) -> bool {
    match answer.trim().to_lowercase().as_str() {
        "y" | "yes" | "true" | "1" => true,
        "n" | "no" | "false" | "0" => false,
        _ => default,
    }
}

/// Expand a leading `~` to the home directory
pub fn expand_home(path: &str) -> PathBuf {
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
