//! Reconnection backoff and response classification.
//!
//! The backoff table and jittered delay live in `policy`; `classify` maps
//! endpoint status codes to keep, retry or give up.

mod classify;
mod policy;

pub use classify::{classify_http_status, StreamStatus};
pub use policy::{BackoffPolicy, BACKOFF_DURATIONS_MINUTES, DEFAULT_MAX_RETRIES};
