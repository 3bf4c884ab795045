//! `rcstream fingerprint` – certificate fingerprint as sent in the cert header.

use anyhow::Result;
use rcstream_core::connection::fingerprint_path;
use std::path::Path;

pub fn run_fingerprint(path: &Path) -> Result<()> {
    let digest = fingerprint_path(path)?;
    println!("{}  {}", hex::encode_upper(digest), path.display());
    Ok(())
}
