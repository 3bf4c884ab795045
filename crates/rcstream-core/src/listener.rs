//! Realtime update listeners and the shared registry that fans events out.
//!
//! The lifecycle manager only ever broadcasts errors; updates are broadcast
//! by the notification reader (see [`crate::stream::AutoFetch`]) through the
//! same registry.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use crate::error::RealtimeError;

/// A config update announced on the realtime stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigUpdate {
    /// Keys whose values changed, when the reader knows them.
    pub updated_keys: BTreeSet<String>,
    /// Template version the server announced.
    pub template_version: Option<i64>,
}

/// Subscriber for realtime events. Callbacks run on whichever thread
/// observed the event (the stream worker or a scheduler task), so keep them short.
pub trait Listener: Send + Sync {
    fn on_update(&self, update: &ConfigUpdate);
    fn on_error(&self, error: &RealtimeError);
}

/// Handle returned by [`ListenerRegistry::add`], used to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: HashMap<ListenerId, Arc<dyn Listener>>,
}

/// Thread-safe set of listeners.
///
/// Broadcasts take a snapshot under the lock and invoke callbacks outside it,
/// so a listener may add or remove listeners from inside its own callback.
/// A listener added during a broadcast may or may not see that broadcast.
#[derive(Default)]
pub struct ListenerRegistry {
    inner: Mutex<Listeners>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener; returns the id to pass to [`remove`](Self::remove).
    pub fn add(&self, listener: Arc<dyn Listener>) -> ListenerId {
        let mut guard = self.lock();
        let id = ListenerId(guard.next_id);
        guard.next_id += 1;
        guard.entries.insert(id, listener);
        id
    }

    /// Unregister a listener. Returns false if the id was unknown.
    pub fn remove(&self, id: ListenerId) -> bool {
        self.lock().entries.remove(&id).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Deliver `error` to every current listener.
    pub fn broadcast_error(&self, error: &RealtimeError) {
        let snapshot = self.snapshot();
        tracing::debug!(listeners = snapshot.len(), "broadcasting realtime error: {}", error);
        for listener in snapshot {
            listener.on_error(error);
        }
    }

    /// Deliver `update` to every current listener.
    pub fn broadcast_update(&self, update: &ConfigUpdate) {
        for listener in self.snapshot() {
            listener.on_update(update);
        }
    }

    fn snapshot(&self) -> Vec<Arc<dyn Listener>> {
        self.lock().entries.values().cloned().collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Listeners> {
        // A listener that panicked mid-registration cannot leave the map torn.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
