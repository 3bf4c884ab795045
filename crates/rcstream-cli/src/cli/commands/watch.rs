//! `rcstream watch` – keep the realtime stream open and print what arrives.

use anyhow::{Context, Result};
use rcstream_core::config::RealtimeConfig;
use rcstream_core::connection::{ConnectionBuilder, CurlTransport, StaticPackageIdentity};
use rcstream_core::{Collaborators, RealtimeClient, RealtimeError};
use std::sync::Arc;
use std::time::Duration;

use super::metadata_store;
use crate::notify::JsonLinesAutoFetch;
use crate::providers::{PrintListener, StaticToken, VersionTracker};

pub async fn run_watch(cfg: &RealtimeConfig, background_after: Option<u64>) -> Result<()> {
    cfg.validate().context("invalid config")?;

    let store = Arc::new(metadata_store(cfg)?);
    let versions = Arc::new(VersionTracker::new(cfg.template_version.unwrap_or(0)));
    let builder = ConnectionBuilder::new(
        cfg.endpoint_settings(),
        Arc::new(StaticPackageIdentity::new(
            cfg.package_name.clone(),
            cfg.certificate_path.clone(),
        )),
        Arc::new(StaticToken::new(cfg.installation_token.clone())),
    );
    let collaborators = Collaborators::new(
        builder,
        versions.clone(),
        Arc::new(CurlTransport::new(cfg.connect_timeout())),
        Arc::new(JsonLinesAutoFetch::new(versions)),
        store,
    );
    let client = RealtimeClient::new(cfg.namespace.clone(), cfg.backoff_policy(), collaborators)?;

    let listener = Arc::new(PrintListener::default());
    let id = client.add_listener(listener.clone());
    tracing::info!(
        namespace = %cfg.namespace,
        retries = client.retries_remaining(),
        "starting realtime stream"
    );
    println!("Watching namespace {:?} (Ctrl-C to stop)", cfg.namespace);
    client.start_immediately();

    let background = async {
        match background_after {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(background);
    let mut backgrounded = false;

    let outcome = loop {
        tokio::select! {
            res = tokio::signal::ctrl_c() => {
                res.context("listen for Ctrl-C")?;
                println!("Stopping.");
                break Ok(());
            }
            _ = &mut background, if !backgrounded => {
                backgrounded = true;
                println!("Moving to background; no new connection attempts.");
                client.set_backgrounded(true);
            }
            error = listener.terminal_error() => {
                break match error {
                    RealtimeError::Disabled { .. } => Ok(()),
                    other => Err(anyhow::Error::new(other)),
                };
            }
        }
    };

    client.remove_listener(id);
    outcome
}
