//! Collaborators fed from the config file, plus a listener that prints events.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use rcstream_core::connection::{InstallationTokenProvider, TemplateVersionSource};
use rcstream_core::{ConfigUpdate, Listener, RealtimeError};
use tokio::sync::Notify;

/// Installation token from config. No token means the header is left out.
pub struct StaticToken(Option<String>);

impl StaticToken {
    pub fn new(token: Option<String>) -> Self {
        Self(token.filter(|t| !t.trim().is_empty()))
    }
}

#[async_trait]
impl InstallationTokenProvider for StaticToken {
    async fn token(&self, _force_refresh: bool) -> Result<String> {
        self.0
            .clone()
            .ok_or_else(|| anyhow::anyhow!("no installation_token configured"))
    }
}

/// Latest template version known to this process. Starts from config and
/// moves forward as the stream announces newer versions.
#[derive(Debug)]
pub struct VersionTracker(AtomicI64);

impl VersionTracker {
    pub fn new(initial: i64) -> Self {
        Self(AtomicI64::new(initial))
    }

    /// Record `version` if it is newer. Returns true when it was.
    pub fn advance(&self, version: i64) -> bool {
        self.0.fetch_max(version, Ordering::SeqCst) < version
    }
}

impl TemplateVersionSource for VersionTracker {
    fn template_version(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// Prints updates and errors to stdout and wakes the watch loop on the first
/// terminal error.
#[derive(Default)]
pub struct PrintListener {
    terminal: Mutex<Option<RealtimeError>>,
    done: Notify,
}

impl PrintListener {
    /// Wait until a terminal error has been seen, then return it.
    pub async fn terminal_error(&self) -> RealtimeError {
        loop {
            let notified = self.done.notified();
            if let Some(e) = self.lock().clone() {
                return e;
            }
            notified.await;
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<RealtimeError>> {
        self.terminal.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl Listener for PrintListener {
    fn on_update(&self, update: &ConfigUpdate) {
        match update.template_version {
            Some(v) => println!("update: template version {}", v),
            None => println!("update"),
        }
        if !update.updated_keys.is_empty() {
            let keys: Vec<&str> = update.updated_keys.iter().map(String::as_str).collect();
            println!("  keys: {}", keys.join(", "));
        }
    }

    fn on_error(&self, error: &RealtimeError) {
        println!("error ({:?}): {}", error.code(), error);
        self.lock().get_or_insert_with(|| error.clone());
        self.done.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn version_tracker_only_moves_forward() {
        let v = VersionTracker::new(5);
        assert!(!v.advance(3));
        assert!(!v.advance(5));
        assert!(v.advance(9));
        assert_eq!(v.template_version(), 9);
    }

    #[tokio::test]
    async fn static_token_requires_a_value() {
        assert_eq!(
            StaticToken::new(Some("t".to_string())).token(false).await.unwrap(),
            "t"
        );
        assert!(StaticToken::new(Some("  ".to_string())).token(false).await.is_err());
        assert!(StaticToken::new(None).token(true).await.is_err());
    }

    #[tokio::test]
    async fn print_listener_reports_first_terminal_error() {
        let listener = Arc::new(PrintListener::default());
        let waiter = {
            let l = Arc::clone(&listener);
            tokio::spawn(async move { l.terminal_error().await })
        };
        tokio::task::yield_now().await;
        listener.on_error(&RealtimeError::ServerStatus { code: 403 });
        listener.on_error(&RealtimeError::StreamUnavailable);

        let first = waiter.await.unwrap();
        assert_eq!(first, RealtimeError::ServerStatus { code: 403 });
        assert_eq!(
            listener.terminal_error().await,
            RealtimeError::ServerStatus { code: 403 }
        );
    }
}
