//! Process-wide tracing setup shared by the client library and the CLI.

use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{anyhow, Context, Result};
use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset. Stream lifecycle events are at debug.
pub const DEFAULT_FILTER: &str = "info,rcstream=debug";

/// Where formatted events are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    /// Appended to this file.
    File(PathBuf),
    Stderr,
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// `$XDG_STATE_HOME/rcstream/rcstream.log`; the directory is created.
pub fn default_log_file() -> Result<PathBuf> {
    xdg::BaseDirectories::with_prefix("rcstream")?
        .place_state_file("rcstream.log")
        .context("create log directory")
}

fn open_log_file(path: &Path) -> Result<std::fs::File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open log file {}", path.display()))
}

/// Install the global subscriber. Fails if the log file cannot be opened or
/// a subscriber is already installed.
pub fn init(target: &LogTarget) -> Result<()> {
    let fmt = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_ansi(false);
    match target {
        LogTarget::File(path) => {
            let file = open_log_file(path)?;
            fmt.with_writer(Mutex::new(file))
                .try_init()
                .map_err(|e| anyhow!(e))?;
            tracing::info!(path = %path.display(), "rcstream logging initialized");
        }
        LogTarget::Stderr => fmt.with_writer(io::stderr).try_init().map_err(|e| anyhow!(e))?,
    }
    Ok(())
}

/// Log to the default state file, or to stderr when that is unusable.
pub fn init_default() -> LogTarget {
    match default_log_file().and_then(|path| {
        let target = LogTarget::File(path);
        init(&target).map(|()| target)
    }) {
        Ok(target) => target,
        Err(e) => {
            let _ = init(&LogTarget::Stderr);
            tracing::warn!("file logging unavailable ({:#}); logging to stderr", e);
            LogTarget::Stderr
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_parses() {
        assert!(EnvFilter::try_new(DEFAULT_FILTER).is_ok());
    }

    #[test]
    fn open_log_file_reports_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("no-such-dir").join("rcstream.log");
        let err = open_log_file(&missing).unwrap_err();
        assert!(format!("{err:#}").contains("no-such-dir"));
    }

    // The only test in this binary that installs the global subscriber.
    #[test]
    fn file_target_appends_events() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rcstream.log");
        std::fs::write(&path, "earlier run\n").unwrap();

        init(&LogTarget::File(path.clone())).unwrap();
        tracing::warn!("realtime stream test event");

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("earlier run\n"));
        assert!(text.contains("rcstream logging initialized"));
        assert!(text.contains("realtime stream test event"));
        assert!(init(&LogTarget::Stderr).is_err());
    }
}
