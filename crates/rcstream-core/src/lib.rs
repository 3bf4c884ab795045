//! Client for a realtime remote-config stream: keeps one long-lived HTTP
//! stream open per namespace, reconnects with persisted exponential backoff,
//! and reports terminal failures to registered listeners.

pub mod backoff;
pub mod clock;
pub mod config;
pub mod connection;
pub mod error;
pub mod listener;
pub mod logging;
pub mod metadata;
pub mod stream;

pub use backoff::BackoffPolicy;
pub use error::{ErrorCode, RealtimeError};
pub use listener::{ConfigUpdate, Listener, ListenerId};
pub use stream::{AutoFetch, Collaborators, ConnectionState, RealtimeClient, StreamControl};
