//! Mutable lifecycle flags, guarded as one unit by the client's mutex.

/// Coarse view of the stream lifecycle, derived from [`StreamState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Running,
    /// Server kill switch received; permanent for this process.
    Disabled,
    Backgrounded,
}

#[derive(Debug)]
pub(super) struct StreamState {
    pub(super) running: bool,
    pub(super) disabled: bool,
    pub(super) backgrounded: bool,
    pub(super) retries_remaining: u32,
    /// A delayed attempt is scheduled and has not fired yet.
    pub(super) retry_pending: bool,
}

impl StreamState {
    pub(super) fn new(retries_remaining: u32) -> Self {
        Self {
            running: false,
            disabled: false,
            backgrounded: false,
            retries_remaining,
            retry_pending: false,
        }
    }

    /// Whether a new stream attempt may start now.
    pub(super) fn can_start(&self, has_listeners: bool) -> bool {
        has_listeners && !self.running && !self.disabled && !self.backgrounded
    }

    pub(super) fn connection_state(&self) -> ConnectionState {
        if self.disabled {
            ConnectionState::Disabled
        } else if self.running {
            ConnectionState::Running
        } else if self.backgrounded {
            ConnectionState::Backgrounded
        } else {
            ConnectionState::Idle
        }
    }
}
