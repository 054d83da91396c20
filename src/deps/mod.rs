use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::PathBuf;

use crate::config::Config;

/// An external tool that could not be resolved on the search path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingDependency {
    pub name: String,
}

impl fmt::Display for MissingDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Checks that the downloader and transcoder are installed.
///
/// Resolution only inspects the filesystem; no process is spawned.
#[derive(Debug, Clone)]
pub struct Prober {
    tools: Vec<String>,
    search_path: Option<OsString>,
}

impl Prober {
    pub fn new<I, S>(tools: I, search_path: Option<OsString>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tools: tools.into_iter().map(Into::into).collect(),
            search_path,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            [
                config.engines.downloader.clone(),
                config.engines.transcoder.clone(),
            ],
            config.engines.search_path.clone().map(OsString::from),
        )
    }

    /// Return every configured tool that does not resolve, in configuration order
    pub fn probe(&self) -> Vec<MissingDependency> {
        self.tools
            .iter()
            .filter(|tool| self.resolve(tool).is_none())
            .map(|tool| MissingDependency { name: tool.clone() })
            .collect()
    }

    /// Resolve a tool to the executable that would be spawned for it
    pub fn resolve(&self, tool: &str) -> Option<PathBuf> {
        locate(tool, self.search_path.as_deref())
    }
}

/// Resolve `tool` on `search_path`, or on `PATH` when none is configured.
///
/// The engines spawn whatever this returns, so a successful probe and the
/// later spawn always refer to the same executable.
pub fn locate(tool: &str, search_path: Option<&OsStr>) -> Option<PathBuf> {
    let resolved = match search_path {
        Some(paths) => {
            let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
            which::which_in(tool, Some(paths), cwd)
        }
        None => which::which(tool),
    };

    match resolved {
        Ok(path) => {
            tracing::debug!("Resolved {} to {}", tool, path.display());
            Some(path)
        }
        Err(e) => {
            tracing::debug!("Could not resolve {}: {}", tool, e);
            None
        }
    }
}

/// Installation hint shown next to a missing-dependency report
pub fn install_hint<S: AsRef<str>>(tools: &[S]) -> String {
    let names: Vec<&str> = tools.iter().map(|tool| tool.as_ref()).collect();
    format!(
        "To install them on macOS using Homebrew:\nbrew install {}",
        names.join(" ")
    )
}
