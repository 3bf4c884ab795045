//! Persist backoff metadata to disk (JSON under XDG state dir) so the failure
//! history survives across runs.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::clock::{from_unix_millis, to_unix_millis};

use super::{BackoffMetadata, MetadataStore};

/// On-disk form of [`BackoffMetadata`]. Times are Unix milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedBackoff {
    #[serde(default = "default_version")]
    pub version: u8,
    pub num_failed_streams: u32,
    pub backoff_end_time_ms: u64,
}

fn default_version() -> u8 {
    1
}

impl From<&BackoffMetadata> for PersistedBackoff {
    fn from(m: &BackoffMetadata) -> Self {
        Self {
            version: default_version(),
            num_failed_streams: m.num_failed_streams,
            backoff_end_time_ms: to_unix_millis(m.backoff_end_time),
        }
    }
}

impl From<PersistedBackoff> for BackoffMetadata {
    fn from(p: PersistedBackoff) -> Self {
        Self {
            num_failed_streams: p.num_failed_streams,
            backoff_end_time: from_unix_millis(p.backoff_end_time_ms),
        }
    }
}

/// Metadata store backed by a single JSON file.
///
/// Every `load` re-reads the file, so two clients sharing a path see each
/// other's writes (subject to the lost-update caveat on [`MetadataStore`]).
#[derive(Debug, Clone)]
pub struct JsonFileMetadataStore {
    path: PathBuf,
}

impl JsonFileMetadataStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Default path: `~/.local/state/rcstream/realtime_backoff.json`.
    pub fn default_path() -> Result<PathBuf> {
        let xdg_dirs = xdg::BaseDirectories::with_prefix("rcstream")?;
        Ok(xdg_dirs.get_state_home().join("realtime_backoff.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MetadataStore for JsonFileMetadataStore {
    /// A missing file means "no failures yet".
    fn load(&self) -> Result<BackoffMetadata> {
        let bytes = match std::fs::read(&self.path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(BackoffMetadata::default())
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("read backoff metadata: {}", self.path.display()))
            }
        };
        let persisted: PersistedBackoff = serde_json::from_slice(&bytes)
            .with_context(|| format!("parse backoff metadata: {}", self.path.display()))?;
        Ok(persisted.into())
    }

    fn save(&self, metadata: &BackoffMetadata) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create dir: {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(&PersistedBackoff::from(metadata))
            .context("serialize backoff metadata")?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("write backoff metadata: {}", self.path.display()))?;
        Ok(())
    }
}
