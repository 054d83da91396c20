#![cfg(unix)]
#![allow(dead_code)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use tubegrab::Config;

pub const METADATA_JSON: &str = r#"{"title":"Test: \"Video\"?","id":"abc123","duration":61}"#;

/// Shell-script stand-ins for yt-dlp and ffmpeg.
///
/// Every invocation is appended to `calls.log` so tests can assert on the
/// exact command lines the pipeline produced.
pub struct FakeTools {
    pub bin: TempDir,
    pub log: PathBuf,
}

impl FakeTools {
    pub fn new() -> Self {
        let bin = TempDir::new().unwrap();
        let log = bin.path().join("calls.log");
        fs_err::write(&log, "").unwrap();
        Self { bin, log }
    }

    /// Install an executable named `name` whose body follows a logging preamble
    pub fn install(&self, name: &str, body: &str) {
        let script = format!(
            "#!/bin/sh\necho \"{} $*\" >> '{}'\n{}\n",
            name,
            self.log.display(),
            body
        );
        let path = self.bin.path().join(name);
        fs_err::write(&path, script).unwrap();
        fs_err::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    /// yt-dlp that answers metadata queries and writes whatever `-o` names
    pub fn install_working_downloader(&self) {
        self.install("yt-dlp", &downloader_body(METADATA_JSON, ""));
    }

    /// yt-dlp whose video downloads fail, except for the permissive selector when `fallback_works`
    pub fn install_picky_downloader(&self, fallback_works: bool) {
        let fallback = if fallback_works {
            "write_output"
        } else {
            "echo 'ERROR: fallback format unavailable' >&2; exit 2"
        };
        let gate = format!(
            r#"case " $* " in
  *" -f best "*) {} ;;
  *" -f "*) echo 'ERROR: requested format not available' >&2; exit 1 ;;
esac"#,
            fallback
        );
        self.install("yt-dlp", &downloader_body(METADATA_JSON, &gate));
    }

    /// yt-dlp that never finishes on its own
    pub fn install_hanging_downloader(&self) {
        self.install("yt-dlp", "exec sleep 30");
    }

    /// yt-dlp that answers metadata queries but stalls on video downloads
    pub fn install_stalling_downloader(&self) {
        let gate = r#"case " $* " in
  *" -f "*) exec sleep 30 ;;
esac"#;
        self.install("yt-dlp", &downloader_body(METADATA_JSON, gate));
    }

    /// yt-dlp that reports download progress on stderr instead of stdout
    pub fn install_stderr_progress_downloader(&self) {
        let gate = r#"case " $* " in
  *" -f "*)
    prev=""
    for arg in "$@"; do
      if [ "$prev" = "-o" ]; then out="$arg"; fi
      prev="$arg"
    done
    echo "[download]  50.0% of 1MiB" >&2
    printf 'media' > "$out"
    exit 0 ;;
esac"#;
        self.install("yt-dlp", &downloader_body(METADATA_JSON, gate));
    }

    /// ffmpeg that writes the argument preceding `-y`
    pub fn install_working_transcoder(&self) {
        self.install(
            "ffmpeg",
            r#"prev=""
out=""
for arg in "$@"; do
  if [ "$arg" = "-y" ]; then out="$prev"; fi
  prev="$arg"
done
printf 'audio' > "$out""#,
        );
    }

    /// Fake tools first, then the inherited PATH for `sh`, `sleep` and friends
    pub fn search_path(&self) -> String {
        match std::env::var("PATH") {
            Ok(path) => format!("{}:{}", self.bin.path().display(), path),
            Err(_) => self.bin.path().display().to_string(),
        }
    }

    pub fn config(&self) -> Config {
        let mut config = Config::default();
        config.engines.search_path = Some(self.search_path());
        config
    }

    /// Config whose search path holds the fake tools and nothing else
    pub fn isolated_config(&self) -> Config {
        let mut config = Config::default();
        config.engines.search_path = Some(self.bin.path().display().to_string());
        config
    }

    pub fn calls(&self) -> Vec<String> {
        fs_err::read_to_string(&self.log)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    pub fn calls_to(&self, tool: &str) -> Vec<String> {
        let prefix = format!("{} ", tool);
        self.calls()
            .into_iter()
            .filter(|call| call.starts_with(&prefix))
            .collect()
    }
}

/// Script body shared by the downloader variants; `gate` runs before any file is written
fn downloader_body(metadata: &str, gate: &str) -> String {
    format!(
        r#"for arg in "$@"; do
  if [ "$arg" = "--dump-json" ]; then
    printf '%s\n' '{metadata}'
    exit 0
  fi
done
write_output() {{
  prev=""
  for arg in "$@"; do
    if [ "$prev" = "-o" ]; then out="$arg"; fi
    prev="$arg"
  done
  echo "[youtube] abc123: Downloading webpage"
  echo "[download]  25.0% of 1.00MiB at 1.00MiB/s ETA 00:01"
  echo "[download] 100.0% of 1.00MiB in 00:01"
  printf 'media' > "$out"
  exit 0
}}
{gate}
write_output "$@""#,
        metadata = metadata,
        gate = gate.replace("write_output", "write_output \"$@\""),
    )
}

pub fn file_exists(dir: &Path, name: &str) -> bool {
    dir.join(name).is_file()
}
