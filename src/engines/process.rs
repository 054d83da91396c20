use std::ffi::OsStr;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::{EngineError, RunContext};
use crate::deps;

/// What a finished tool invocation left behind
pub(crate) struct Captured {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: String,
}

impl Captured {
    /// Turn a non-zero exit into `EngineError::Failed` carrying stderr
    pub fn success(self, program: &str) -> Result<Self, EngineError> {
        if self.status.success() {
            return Ok(self);
        }

        let diagnostic = if self.stderr.trim().is_empty() {
            format!("{} exited with {}", program, self.status)
        } else {
            self.stderr
        };

        Err(EngineError::Failed {
            program: program.to_string(),
            code: self.status.code(),
            diagnostic,
        })
    }
}

/// Command for `tool`, spawning the executable the prober resolves for it.
///
/// `search_path` also becomes the child's `PATH` so helpers the tool launches
/// come from the same place.
pub(crate) fn tool_command(tool: &str, search_path: Option<&str>) -> Command {
    let program = deps::locate(tool, search_path.map(OsStr::new))
        .unwrap_or_else(|| PathBuf::from(tool));

    let mut cmd = Command::new(program);
    if let Some(path) = search_path {
        cmd.env("PATH", path);
    }
    cmd
}

/// Short tool name used in diagnostics
pub(crate) fn program_name(cmd: &Command) -> String {
    let program = Path::new(cmd.as_std().get_program());
    program
        .file_name()
        .unwrap_or(program.as_os_str())
        .to_string_lossy()
        .into_owned()
}

/// Run a tool to completion, buffering both output streams
pub(crate) async fn run_captured(mut cmd: Command, ctx: &RunContext) -> Result<Captured, EngineError> {
    let program = program_name(&cmd);
    tracing::debug!("Running {:?}", cmd.as_std());

    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = cmd.spawn().map_err(|source| EngineError::Spawn {
        program: program.clone(),
        source,
    })?;

    let output = supervise(child.wait_with_output(), &program, ctx).await?;

    Ok(Captured {
        status: output.status,
        stdout: output.stdout,
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

/// Which pipe a forwarded line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stream {
    Stdout,
    Stderr,
}

/// Run a tool while forwarding every output line to the log stream.
///
/// Lines from both pipes are handed to `on_line` in arrival order;
/// carriage-return separated updates count as separate lines. Stderr is also
/// kept for the diagnostic.
pub(crate) async fn run_streaming<F>(
    mut cmd: Command,
    ctx: &RunContext,
    mut on_line: F,
) -> Result<Captured, EngineError>
where
    F: FnMut(&str) + Send,
{
    let program = program_name(&cmd);
    tracing::debug!("Running {:?}", cmd.as_std());

    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd.spawn().map_err(|source| EngineError::Spawn {
        program: program.clone(),
        source,
    })?;

    let (tx, mut lines) = mpsc::unbounded_channel();
    let readers: Vec<_> = [
        child
            .stdout
            .take()
            .map(|stdout| forward_lines(stdout, Stream::Stdout, tx.clone())),
        child
            .stderr
            .take()
            .map(|stderr| forward_lines(stderr, Stream::Stderr, tx.clone())),
    ]
    .into_iter()
    .flatten()
    .collect();
    drop(tx);

    let reporter = ctx.reporter();
    let drive = async move {
        let mut stderr = String::new();
        while let Some((stream, line)) = lines.recv().await {
            reporter.log(line.as_str());
            on_line(&line);
            if stream == Stream::Stderr {
                stderr.push_str(&line);
                stderr.push('\n');
            }
        }

        for reader in readers {
            if let Ok(Err(e)) = reader.await {
                return Err(e);
            }
        }

        let status = child.wait().await?;
        Ok::<_, std::io::Error>((status, stderr))
    };

    let (status, stderr) = supervise(drive, &program, ctx).await?;

    Ok(Captured {
        status,
        stdout: Vec::new(),
        stderr,
    })
}

/// Read `pipe` until EOF, sending each line tagged with its stream
fn forward_lines<R>(
    pipe: R,
    stream: Stream,
    tx: mpsc::UnboundedSender<(Stream, String)>,
) -> JoinHandle<std::io::Result<()>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut segments = BufReader::new(pipe).split(b'\n');
        while let Some(raw) = segments.next_segment().await? {
            for line in split_lines(&raw) {
                if tx.send((stream, line)).is_err() {
                    // receiver gone, the run was abandoned
                    return Ok(());
                }
            }
        }
        Ok(())
    })
}

/// Split one newline-delimited segment at carriage returns.
///
/// Only the terminators are removed; everything else is kept as written.
fn split_lines(raw: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(raw)
        .split('\r')
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Await a child future under the context's timeout and cancellation token.
///
/// Dropping the future drops the child, and `kill_on_drop` terminates it.
async fn supervise<T, F>(fut: F, program: &str, ctx: &RunContext) -> Result<T, EngineError>
where
    F: Future<Output = std::io::Result<T>>,
{
    let limited = async {
        match ctx.timeout() {
            Some(limit) => tokio::time::timeout(limit, fut).await.map_err(|_| {
                tracing::warn!("{} timed out after {}s, killing it", program, limit.as_secs());
                EngineError::TimedOut {
                    program: program.to_string(),
                    after: limit,
                }
            }),
            None => Ok(fut.await),
        }
    };

    tokio::select! {
        _ = ctx.cancel_token().cancelled() => {
            tracing::warn!("Cancelling {}", program);
            Err(EngineError::Cancelled)
        }
        result = limited => match result {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(source)) => Err(EngineError::Io {
                program: program.to_string(),
                source,
            }),
            Err(e) => Err(e),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_lines_keeps_text_verbatim() {
        assert_eq!(
            split_lines(b"  [download]  5.0% of 1MiB\r  [download] 10.0% of 1MiB  \r"),
            vec!["  [download]  5.0% of 1MiB", "  [download] 10.0% of 1MiB  "]
        );
        assert_eq!(split_lines(b"ERROR: gone\r"), vec!["ERROR: gone"]);
        assert!(split_lines(b"").is_empty());
    }

    #[test]
    fn test_program_name_is_the_file_name() {
        let cmd = Command::new("/usr/local/bin/yt-dlp");
        assert_eq!(program_name(&cmd), "yt-dlp");

        let cmd = Command::new("ffmpeg");
        assert_eq!(program_name(&cmd), "ffmpeg");
    }

    #[cfg(unix)]
    #[test]
    fn test_tool_command_spawns_the_resolved_executable() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::TempDir::new().unwrap();
        let tool = dir.path().join("yt-dlp");
        fs_err::write(&tool, "#!/bin/sh\nexit 0\n").unwrap();
        fs_err::set_permissions(&tool, std::fs::Permissions::from_mode(0o755)).unwrap();
        let search_path = dir.path().display().to_string();

        let cmd = tool_command("yt-dlp", Some(&search_path));
        assert_eq!(Path::new(cmd.as_std().get_program()), tool);

        // unresolved tools are left to the OS so the spawn error names them
        let cmd = tool_command("no-such-tool", Some(&search_path));
        assert_eq!(cmd.as_std().get_program(), "no-such-tool");
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn test_stderr_lines_reach_the_line_callback() {
        use crate::pipeline::{PipelineEvent, Reporter};
        use std::sync::Arc;
        use tokio_util::sync::CancellationToken;

        let (tx, mut rx) = mpsc::unbounded_channel();
        let ctx = RunContext::new(Reporter::new(Arc::new(tx)), CancellationToken::new(), None);

        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg("echo out; echo '[download]  50.0% of 1MiB' >&2; echo '  spaced  ' >&2");

        let mut seen = Vec::new();
        let captured = run_streaming(cmd, &ctx, |line| seen.push(line.to_string()))
            .await
            .unwrap();

        seen.sort();
        assert_eq!(seen, vec!["  spaced  ", "[download]  50.0% of 1MiB", "out"]);
        assert_eq!(captured.stderr, "[download]  50.0% of 1MiB\n  spaced  \n");
        assert!(captured.status.success());

        let mut logged = Vec::new();
        while let Ok(PipelineEvent::Log(line)) = rx.try_recv() {
            logged.push(line);
        }
        assert_eq!(logged.len(), 3);
    }
}
