//! `rcstream status` – show persisted backoff state.

use anyhow::Result;
use rcstream_core::clock::to_unix_millis;
use rcstream_core::config::RealtimeConfig;
use rcstream_core::metadata::{JsonFileMetadataStore, MetadataStore};
use std::time::SystemTime;

/// Store at the configured path, or the default XDG state file.
pub fn metadata_store(cfg: &RealtimeConfig) -> Result<JsonFileMetadataStore> {
    let path = match &cfg.metadata_path {
        Some(p) => p.clone(),
        None => JsonFileMetadataStore::default_path()?,
    };
    Ok(JsonFileMetadataStore::new(path))
}

pub fn run_status(cfg: &RealtimeConfig) -> Result<()> {
    let store = metadata_store(cfg)?;
    let metadata = store.load()?;

    println!("{:<22} {}", "STATE FILE", store.path().display());
    println!("{:<22} {}", "FAILED STREAMS", metadata.num_failed_streams);
    println!(
        "{:<22} {}",
        "RETRY BUDGET",
        cfg.backoff_policy()
            .initial_retries(metadata.num_failed_streams)
    );
    match metadata.backoff_end_time.duration_since(SystemTime::now()) {
        Ok(remaining) => println!(
            "{:<22} {} ms since epoch ({}s from now)",
            "BACKOFF UNTIL",
            to_unix_millis(metadata.backoff_end_time),
            remaining.as_secs()
        ),
        Err(_) => println!("{:<22} -", "BACKOFF UNTIL"),
    }
    Ok(())
}
