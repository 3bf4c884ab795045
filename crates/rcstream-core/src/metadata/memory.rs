//! Process-local metadata store.

use std::sync::Mutex;

use anyhow::Result;

use super::{BackoffMetadata, MetadataStore};

/// Keeps backoff metadata in memory only (lost on restart).
#[derive(Debug, Default)]
pub struct MemoryMetadataStore {
    current: Mutex<BackoffMetadata>,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a known failure history (e.g. to simulate a restart).
    pub fn with_metadata(metadata: BackoffMetadata) -> Self {
        Self {
            current: Mutex::new(metadata),
        }
    }
}

impl MetadataStore for MemoryMetadataStore {
    fn load(&self) -> Result<BackoffMetadata> {
        let guard = self
            .current
            .lock()
            .map_err(|_| anyhow::anyhow!("metadata lock poisoned"))?;
        Ok(*guard)
    }

    fn save(&self, metadata: &BackoffMetadata) -> Result<()> {
        let mut guard = self
            .current
            .lock()
            .map_err(|_| anyhow::anyhow!("metadata lock poisoned"))?;
        *guard = *metadata;
        Ok(())
    }
}
