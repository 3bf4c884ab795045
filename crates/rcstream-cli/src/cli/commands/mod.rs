//! CLI command handlers, one per file.

mod fingerprint;
mod reset;
mod status;
mod watch;

pub use fingerprint::run_fingerprint;
pub use reset::run_reset;
pub use status::{metadata_store, run_status};
pub use watch::run_watch;
