//! Persisted realtime backoff metadata.
//!
//! The failure count and backoff end time are the only realtime state that
//! survives a process restart. The stream lifecycle consumes them through
//! [`MetadataStore`]; this module ships a JSON file store for real use and an
//! in-memory store for tests and embedders that bring their own persistence.

mod memory;
mod persist;

use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;

pub use memory::MemoryMetadataStore;
pub use persist::{JsonFileMetadataStore, PersistedBackoff};

/// Failure history used to time reconnection attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffMetadata {
    /// Consecutive failed stream attempts since the last successful open.
    pub num_failed_streams: u32,
    /// No attempt may start before this instant.
    pub backoff_end_time: SystemTime,
}

impl Default for BackoffMetadata {
    fn default() -> Self {
        Self {
            num_failed_streams: 0,
            backoff_end_time: UNIX_EPOCH,
        }
    }
}

/// Durable key-value storage for [`BackoffMetadata`].
///
/// Reads and writes are not atomic with respect to each other: a caller that
/// loads, increments and saves can lose an increment made concurrently by
/// another writer.
pub trait MetadataStore: Send + Sync {
    fn load(&self) -> Result<BackoffMetadata>;

    fn save(&self, metadata: &BackoffMetadata) -> Result<()>;

    /// Forget all failures (after a successful stream open).
    fn reset(&self) -> Result<()> {
        self.save(&BackoffMetadata::default())
    }
}
