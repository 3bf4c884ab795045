//! Realtime stream lifecycle.
//!
//! Attempts are scheduled on the tokio runtime and the stream itself is read
//! on the blocking pool. Each outcome either reschedules (after backoff when
//! it failed) or ends in one terminal error for listeners.

mod client;
mod guard;
mod state;

use std::io::{self, Read};

pub use client::{Collaborators, RealtimeClient, StreamControl};
pub use state::ConnectionState;

/// Consumer of an open realtime stream (the auto-fetch side).
///
/// Implementations block reading `stream` until it ends, broadcasting updates
/// and honoring server kill switches through `control`. Returning (with or
/// without an error) hands control back to the lifecycle manager, which
/// reconnects.
pub trait AutoFetch: Send + Sync {
    fn listen_for_notifications(
        &self,
        stream: &mut dyn Read,
        control: &StreamControl,
    ) -> io::Result<()>;
}
