//! `rcstream reset` – forget persisted stream failures.

use anyhow::Result;
use rcstream_core::config::RealtimeConfig;
use rcstream_core::metadata::MetadataStore;

use super::metadata_store;

pub fn run_reset(cfg: &RealtimeConfig) -> Result<()> {
    let store = metadata_store(cfg)?;
    store.reset()?;
    println!("Cleared backoff state at {}", store.path().display());
    Ok(())
}
