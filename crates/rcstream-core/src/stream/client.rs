//! The realtime client: retry scheduling and the per-attempt state machine.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use tokio::runtime::Handle;
use tokio::sync::oneshot;

use crate::backoff::{classify_http_status, BackoffPolicy, StreamStatus};
use crate::clock::{Clock, SystemClock};
use crate::connection::{ConnectionBuilder, StreamRequest, TemplateVersionSource, Transport};
use crate::error::RealtimeError;
use crate::listener::{ConfigUpdate, Listener, ListenerId, ListenerRegistry};
use crate::metadata::{BackoffMetadata, MetadataStore};

use super::guard::ConnectionGuard;
use super::state::{ConnectionState, StreamState};
use super::AutoFetch;

/// Everything the client talks to. `clock` and `rng` default to the system
/// clock and an entropy-seeded RNG; tests replace them.
pub struct Collaborators {
    pub builder: ConnectionBuilder,
    pub versions: Arc<dyn TemplateVersionSource>,
    pub transport: Arc<dyn Transport>,
    pub auto_fetch: Arc<dyn AutoFetch>,
    pub store: Arc<dyn MetadataStore>,
    pub clock: Arc<dyn Clock>,
    pub rng: Box<dyn RngCore + Send>,
}

impl Collaborators {
    pub fn new(
        builder: ConnectionBuilder,
        versions: Arc<dyn TemplateVersionSource>,
        transport: Arc<dyn Transport>,
        auto_fetch: Arc<dyn AutoFetch>,
        store: Arc<dyn MetadataStore>,
    ) -> Self {
        Self {
            builder,
            versions,
            transport,
            auto_fetch,
            store,
            clock: Arc::new(SystemClock),
            rng: Box::new(StdRng::from_entropy()),
        }
    }
}

/// How a stream attempt ended, as seen by the lifecycle manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamOutcome {
    /// No HTTP status was received (build, connect or transfer failure).
    Unreachable,
    /// The endpoint answered with this status. For 200, the stream has
    /// since ended.
    Status(u32),
}

/// When a scheduled attempt fires.
#[derive(Debug, Clone, Copy)]
enum Delay {
    Now,
    /// When the persisted backoff window closes.
    BackoffEnd,
}

/// What a fired attempt found when it took the state lock.
enum Begin {
    Start,
    /// Persisted backoff is still running.
    Defer,
    Skip,
}

/// What `make_connection` decided while holding the state lock.
enum Attempt {
    Scheduled { retries_remaining: u32 },
    Exhausted,
    Suppressed,
}

struct Inner {
    namespace: String,
    policy: BackoffPolicy,
    state: Mutex<StreamState>,
    listeners: ListenerRegistry,
    builder: ConnectionBuilder,
    versions: Arc<dyn TemplateVersionSource>,
    transport: Arc<dyn Transport>,
    auto_fetch: Arc<dyn AutoFetch>,
    store: Arc<dyn MetadataStore>,
    clock: Arc<dyn Clock>,
    rng: Mutex<Box<dyn RngCore + Send>>,
    runtime: Handle,
}

/// Realtime stream client for one namespace.
///
/// Cheap to clone; clones share the same stream, listeners and state.
/// Must be created inside a tokio runtime: delayed attempts are spawned on
/// it and the blocking stream read runs on its blocking pool.
#[derive(Clone)]
pub struct RealtimeClient {
    inner: Arc<Inner>,
}

/// Handle given to the [`AutoFetch`] consumer while a stream is open.
pub struct StreamControl {
    inner: Arc<Inner>,
}

impl StreamControl {
    /// Deliver an update to every registered listener.
    pub fn broadcast_update(&self, update: &ConfigUpdate) {
        self.inner.listeners.broadcast_update(update);
    }

    /// Server asked to stop realtime updates. See [`RealtimeClient::disable_realtime`].
    pub fn disable_realtime(&self, message: impl Into<String>) {
        self.inner.disable_realtime(message.into());
    }

    /// Namespace the stream belongs to.
    pub fn namespace(&self) -> &str {
        &self.inner.namespace
    }
}

impl RealtimeClient {
    /// Create a client. The retry budget starts at
    /// `max(max_retries - persisted failures, 1)`.
    pub fn new(
        namespace: impl Into<String>,
        policy: BackoffPolicy,
        collaborators: Collaborators,
    ) -> Result<Self> {
        let runtime =
            Handle::try_current().context("realtime client must be created inside a tokio runtime")?;
        let Collaborators {
            builder,
            versions,
            transport,
            auto_fetch,
            store,
            clock,
            rng,
        } = collaborators;

        let persisted = load_or_default(store.as_ref());
        let retries = policy.initial_retries(persisted.num_failed_streams);
        tracing::debug!(
            failed_streams = persisted.num_failed_streams,
            retries,
            "realtime client created"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                namespace: namespace.into(),
                policy,
                state: Mutex::new(StreamState::new(retries)),
                listeners: ListenerRegistry::new(),
                builder,
                versions,
                transport,
                auto_fetch,
                store,
                clock,
                rng: Mutex::new(rng),
                runtime,
            }),
        })
    }

    pub fn add_listener(&self, listener: Arc<dyn Listener>) -> ListenerId {
        self.inner.listeners.add(listener)
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.inner.listeners.remove(id)
    }

    /// First attempt: no delay (persisted backoff still applies when it fires).
    pub fn start_immediately(&self) {
        self.inner.make_connection(Delay::Now);
    }

    /// Schedule an attempt for when the persisted backoff ends.
    pub fn retry(&self) {
        self.inner.retry();
    }

    /// App moved to the background (true) or foreground (false).
    ///
    /// Backgrounding never interrupts an open stream; it only blocks new
    /// attempts and silences exhaustion errors. Returning to the foreground
    /// starts a new attempt.
    pub fn set_backgrounded(&self, backgrounded: bool) {
        let resumed = {
            let mut st = self.inner.state();
            let was = st.backgrounded;
            st.backgrounded = backgrounded;
            was && !backgrounded
        };
        if resumed {
            tracing::debug!("app returned to foreground; restarting realtime stream");
            self.start_immediately();
        }
    }

    /// Permanently stop realtime for this process and tell listeners once.
    pub fn disable_realtime(&self, message: impl Into<String>) {
        self.inner.disable_realtime(message.into());
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.state().connection_state()
    }

    pub fn retries_remaining(&self) -> u32 {
        self.inner.state().retries_remaining
    }

    /// Reads the metadata store on the calling thread.
    pub fn num_failed_streams(&self) -> u32 {
        self.inner.load_metadata().num_failed_streams
    }

    pub fn backoff_end_time(&self) -> SystemTime {
        self.inner.load_metadata().backoff_end_time
    }
}

fn load_or_default(store: &dyn MetadataStore) -> BackoffMetadata {
    store.load().unwrap_or_else(|e| {
        tracing::warn!("could not load realtime backoff metadata: {:#}", e);
        BackoffMetadata::default()
    })
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, StreamState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn load_metadata(&self) -> BackoffMetadata {
        load_or_default(self.store.as_ref())
    }

    /// Run a metadata store call on the blocking pool.
    async fn on_blocking_pool<T, F>(self: &Arc<Self>, f: F) -> Option<T>
    where
        F: FnOnce(&Inner) -> T + Send + 'static,
        T: Send + 'static,
    {
        let inner = Arc::clone(self);
        match self.runtime.spawn_blocking(move || f(&inner)).await {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("realtime metadata task join: {}", e);
                None
            }
        }
    }

    async fn backoff_end_time(self: &Arc<Self>) -> SystemTime {
        self.on_blocking_pool(|inner| inner.load_metadata())
            .await
            .unwrap_or_default()
            .backoff_end_time
    }

    fn retry(self: &Arc<Self>) {
        self.make_connection(Delay::BackoffEnd);
    }

    fn make_connection(self: &Arc<Self>, delay: Delay) {
        let attempt = {
            let mut st = self.state();
            if !st.can_start(!self.listeners.is_empty()) || st.retry_pending {
                return;
            }
            if st.retries_remaining > 0 {
                st.retries_remaining -= 1;
                st.retry_pending = true;
                Attempt::Scheduled {
                    retries_remaining: st.retries_remaining,
                }
            } else if !st.backgrounded {
                Attempt::Exhausted
            } else {
                Attempt::Suppressed
            }
        };

        match attempt {
            Attempt::Scheduled { retries_remaining } => {
                tracing::debug!(
                    ?delay,
                    retries_remaining,
                    "scheduling realtime stream attempt"
                );
                let inner = Arc::clone(self);
                self.runtime.spawn(async move {
                    if let Delay::BackoffEnd = delay {
                        let wait = inner
                            .backoff_end_time()
                            .await
                            .duration_since(inner.clock.now())
                            .unwrap_or(Duration::ZERO);
                        tracing::debug!(
                            wait_ms = wait.as_millis() as u64,
                            "waiting out realtime backoff"
                        );
                        tokio::time::sleep(wait).await;
                    }
                    inner.begin_stream().await;
                });
            }
            Attempt::Exhausted => {
                tracing::warn!("realtime retries exhausted");
                self.listeners
                    .broadcast_error(&RealtimeError::StreamUnavailable);
            }
            Attempt::Suppressed => {
                tracing::debug!("realtime retries exhausted while in background");
            }
        }
    }

    /// Clear the pending flag and claim the running flag under one lock.
    fn try_begin(&self, backoff_end: SystemTime) -> Begin {
        let mut st = self.state();
        st.retry_pending = false;
        if !st.can_start(!self.listeners.is_empty()) {
            return Begin::Skip;
        }
        if self.clock.now() < backoff_end {
            return Begin::Defer;
        }
        st.running = true;
        Begin::Start
    }

    async fn begin_stream(self: Arc<Self>) {
        let backoff_end = self.backoff_end_time().await;
        match self.try_begin(backoff_end) {
            Begin::Start => {}
            Begin::Skip => {
                tracing::debug!("realtime stream attempt skipped");
                return;
            }
            Begin::Defer => {
                tracing::debug!("realtime backoff not over yet; deferring attempt");
                self.retry();
                return;
            }
        }

        let version = self.versions.template_version();
        let outcome = match self.builder.build(&self.namespace, version).await {
            Ok(request) => self.run_on_worker(request).await,
            Err(e) => {
                tracing::debug!("could not build realtime request: {}", e);
                StreamOutcome::Unreachable
            }
        };

        self.state().running = false;
        self.finish(outcome).await;
    }

    /// Run the blocking part of the attempt on the blocking pool and wait for
    /// its report.
    async fn run_on_worker(self: &Arc<Self>, request: StreamRequest) -> StreamOutcome {
        let (tx, rx) = oneshot::channel();
        let inner = Arc::clone(self);
        self.runtime.spawn_blocking(move || {
            let _ = tx.send(inner.run_connection(&request));
        });
        rx.await.unwrap_or_else(|_| {
            tracing::warn!("realtime stream worker exited without reporting");
            StreamOutcome::Unreachable
        })
    }

    /// Open the stream and, on 200, block in the notification reader until it
    /// ends. The connection is closed before this returns.
    fn run_connection(self: &Arc<Self>, request: &StreamRequest) -> StreamOutcome {
        let conn = match self.transport.open(request) {
            Ok(conn) => conn,
            Err(e) => {
                tracing::debug!("exception connecting to realtime stream; retrying: {}", e);
                return StreamOutcome::Unreachable;
            }
        };
        let mut conn = ConnectionGuard::new(conn);
        let status = conn.status();

        if classify_http_status(status) == StreamStatus::Ok {
            self.on_stream_opened();
            let control = StreamControl {
                inner: Arc::clone(self),
            };
            if let Err(e) = self.auto_fetch.listen_for_notifications(&mut conn, &control) {
                tracing::debug!("realtime stream ended with error: {}", e);
            } else {
                tracing::debug!("realtime stream closed by server");
            }
        } else {
            tracing::debug!(status, "realtime endpoint refused stream");
        }
        drop(conn);
        StreamOutcome::Status(status)
    }

    fn on_stream_opened(&self) {
        self.state().retries_remaining = self.policy.max_retries;
        if let Err(e) = self.store.reset() {
            tracing::warn!("could not reset realtime backoff metadata: {:#}", e);
        }
        tracing::info!(namespace = %self.namespace, "realtime stream opened");
    }

    async fn finish(self: &Arc<Self>, outcome: StreamOutcome) {
        let status = match outcome {
            StreamOutcome::Unreachable => None,
            StreamOutcome::Status(code) => Some((code, classify_http_status(code))),
        };
        match status {
            None | Some((_, StreamStatus::Retryable)) => {
                self.on_blocking_pool(|inner| inner.record_failure()).await;
                self.retry();
            }
            Some((_, StreamStatus::Ok)) => self.retry(),
            Some((code, StreamStatus::Fatal)) => {
                tracing::warn!(status = code, "realtime stream rejected; not retrying");
                self.listeners
                    .broadcast_error(&RealtimeError::ServerStatus { code });
            }
        }
    }

    /// Count one more failed stream and push the backoff end out from now.
    ///
    /// Load-increment-save is not atomic across the store boundary.
    fn record_failure(&self) {
        let failed = self.load_metadata().num_failed_streams.saturating_add(1);
        let delay = {
            let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            self.policy.next_delay(failed, &mut **rng)
        };
        let metadata = BackoffMetadata {
            num_failed_streams: failed,
            backoff_end_time: self.clock.now() + delay,
        };
        tracing::debug!(
            failed_streams = failed,
            backoff_ms = delay.as_millis() as u64,
            "realtime stream failed"
        );
        if let Err(e) = self.store.save(&metadata) {
            tracing::warn!("could not persist realtime backoff metadata: {:#}", e);
        }
    }

    fn disable_realtime(&self, message: String) {
        let newly_disabled = {
            let mut st = self.state();
            !std::mem::replace(&mut st.disabled, true)
        };
        if newly_disabled {
            tracing::info!(namespace = %self.namespace, "realtime disabled by server");
            self.listeners
                .broadcast_error(&RealtimeError::Disabled { message });
        }
    }
}
