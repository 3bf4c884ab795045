//! Minimal consumer of the realtime stream body.
//!
//! The server writes JSON objects, usually one per line but possibly split
//! across lines or chunks. Each object may announce a newer template version
//! (`latestTemplateVersionNumber`) or switch realtime off (`featureDisabled`).

use std::io::{self, BufRead, BufReader, Read};
use std::sync::Arc;

use rcstream_core::{AutoFetch, ConfigUpdate, StreamControl};
use serde::Deserialize;

use crate::providers::VersionTracker;

/// Longest unfinished object kept while waiting for more lines.
const MAX_PENDING_BYTES: usize = 64 * 1024;

const DISABLED_MESSAGE: &str = "The server is temporarily unavailable. Try again in a few minutes.";

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum VersionNumber {
    Number(i64),
    Text(String),
}

impl VersionNumber {
    fn value(&self) -> Option<i64> {
        match self {
            VersionNumber::Number(n) => Some(*n),
            VersionNumber::Text(s) => s.trim().parse().ok(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StreamMessage {
    #[serde(default)]
    feature_disabled: bool,
    #[serde(default)]
    latest_template_version_number: Option<VersionNumber>,
}

/// Broadcasts an update for every announced version newer than the last one
/// seen. Fetching the new config is left to the listener.
pub struct JsonLinesAutoFetch {
    versions: Arc<VersionTracker>,
}

impl JsonLinesAutoFetch {
    pub fn new(versions: Arc<VersionTracker>) -> Self {
        Self { versions }
    }

    /// Returns false when the stream should stop being read.
    fn handle(&self, message: StreamMessage, control: &StreamControl) -> bool {
        if message.feature_disabled {
            control.disable_realtime(DISABLED_MESSAGE);
            return false;
        }
        let Some(version) = message
            .latest_template_version_number
            .as_ref()
            .and_then(VersionNumber::value)
        else {
            return true;
        };
        if self.versions.advance(version) {
            tracing::debug!(version, namespace = control.namespace(), "new template version");
            control.broadcast_update(&ConfigUpdate {
                updated_keys: Default::default(),
                template_version: Some(version),
            });
        } else {
            tracing::debug!(version, "ignoring stale template version");
        }
        true
    }
}

/// Accumulates lines until they form one complete JSON object.
#[derive(Debug, Default)]
struct MessageBuffer {
    pending: String,
}

impl MessageBuffer {
    /// Feed one line. Returns a message once an object is complete.
    fn push_line(&mut self, line: &str) -> Option<StreamMessage> {
        self.pending.push_str(line);
        self.pending.push('\n');
        // Skip anything before the start of an object.
        let Some(start) = self.pending.find('{') else {
            self.pending.clear();
            return None;
        };
        match serde_json::from_str::<StreamMessage>(&self.pending[start..]) {
            Ok(message) => {
                self.pending.clear();
                Some(message)
            }
            Err(e) if e.is_eof() => {
                if self.pending.len() > MAX_PENDING_BYTES {
                    tracing::warn!(
                        bytes = self.pending.len(),
                        "dropping oversized unfinished realtime message"
                    );
                    self.pending.clear();
                }
                None
            }
            Err(e) => {
                tracing::warn!("unparseable realtime message: {}", e);
                self.pending.clear();
                None
            }
        }
    }
}

impl AutoFetch for JsonLinesAutoFetch {
    fn listen_for_notifications(
        &self,
        stream: &mut dyn Read,
        control: &StreamControl,
    ) -> io::Result<()> {
        let mut buffer = MessageBuffer::default();
        for line in BufReader::new(stream).lines() {
            if let Some(message) = buffer.push_line(&line?) {
                if !self.handle(message, control) {
                    return Ok(());
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(lines: &[&str]) -> Vec<StreamMessage> {
        let mut buffer = MessageBuffer::default();
        lines.iter().filter_map(|l| buffer.push_line(l)).collect()
    }

    #[test]
    fn one_object_per_line() {
        let messages = feed(&[
            r#"{"latestTemplateVersionNumber": 12}"#,
            r#"{"latestTemplateVersionNumber": "13"}"#,
        ]);
        let versions: Vec<_> = messages
            .iter()
            .map(|m| m.latest_template_version_number.as_ref().and_then(VersionNumber::value))
            .collect();
        assert_eq!(versions, vec![Some(12), Some(13)]);
    }

    #[test]
    fn object_split_across_lines() {
        let messages = feed(&["{", r#"  "featureDisabled": true"#, "}"]);
        assert_eq!(messages.len(), 1);
        assert!(messages[0].feature_disabled);
        assert!(messages[0].latest_template_version_number.is_none());
    }

    #[test]
    fn garbage_is_dropped_and_parsing_recovers() {
        let messages = feed(&[
            "",
            "keep-alive",
            r#"{"latestTemplateVersionNumber": ]"#,
            r#"{"latestTemplateVersionNumber": 4}"#,
        ]);
        assert_eq!(messages.len(), 1);
        assert_eq!(
            messages[0]
                .latest_template_version_number
                .as_ref()
                .and_then(VersionNumber::value),
            Some(4)
        );
    }

    #[test]
    fn unterminated_object_is_capped_and_parsing_recovers() {
        let mut buffer = MessageBuffer::default();
        assert!(buffer.push_line("{").is_none());
        let pad = format!(r#""pad": "{}","#, "x".repeat(1000));
        for _ in 0..100 {
            assert!(buffer.push_line(&pad).is_none());
            assert!(buffer.pending.len() <= MAX_PENDING_BYTES + pad.len() + 1);
        }

        let message = buffer
            .push_line(r#"{"latestTemplateVersionNumber": 5}"#)
            .expect("buffer recovers after dropping the oversized object");
        assert_eq!(
            message
                .latest_template_version_number
                .as_ref()
                .and_then(VersionNumber::value),
            Some(5)
        );
    }

    #[test]
    fn non_numeric_version_text_is_ignored() {
        let messages = feed(&[r#"{"latestTemplateVersionNumber": "abc"}"#]);
        assert_eq!(
            messages[0]
                .latest_template_version_number
                .as_ref()
                .and_then(VersionNumber::value),
            None
        );
    }
}
