use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::backoff::{BackoffPolicy, DEFAULT_MAX_RETRIES};
use crate::connection::EndpointSettings;

/// Production realtime endpoint; `{project}` and `{namespace}` are filled per request.
pub const DEFAULT_ENDPOINT_TEMPLATE: &str = "https://firebaseremoteconfigrealtime.googleapis.com/v1/projects/{project}/namespaces/{namespace}:streamFetchInvalidations";

/// Retry budget (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Attempts per client before giving up (minus persisted failures, at least 1).
    pub max_retries: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

/// Transport tuning (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    pub connect_timeout_secs: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 30,
        }
    }
}

/// Realtime client configuration loaded from `~/.config/rcstream/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// Endpoint URL with `{project}` and `{namespace}` placeholders.
    pub endpoint_template: String,
    pub api_key: String,
    /// App id of the form `1:<project number>:<platform>:<hex>`.
    pub app_id: String,
    pub namespace: String,
    /// Sent as the package header for API key restrictions.
    pub package_name: String,
    pub sdk_version: String,
    #[serde(default)]
    pub retry: Option<RetryConfig>,
    #[serde(default)]
    pub transport: Option<TransportConfig>,
    /// Signing certificate whose SHA-256 is sent as the cert header.
    #[serde(default)]
    pub certificate_path: Option<PathBuf>,
    /// Pre-issued installation auth token. Without it the header is omitted.
    #[serde(default)]
    pub installation_token: Option<String>,
    /// Last fetched template version (0 when unset).
    #[serde(default)]
    pub template_version: Option<i64>,
    /// Where backoff metadata is persisted. Defaults to the XDG state dir.
    #[serde(default)]
    pub metadata_path: Option<PathBuf>,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            endpoint_template: DEFAULT_ENDPOINT_TEMPLATE.to_string(),
            api_key: String::new(),
            app_id: String::new(),
            namespace: "firebase".to_string(),
            package_name: String::new(),
            sdk_version: env!("CARGO_PKG_VERSION").to_string(),
            retry: None,
            transport: None,
            certificate_path: None,
            installation_token: None,
            template_version: None,
            metadata_path: None,
        }
    }
}

impl RealtimeConfig {
    pub fn endpoint_settings(&self) -> EndpointSettings {
        EndpointSettings {
            endpoint_template: self.endpoint_template.clone(),
            api_key: self.api_key.clone(),
            app_id: self.app_id.clone(),
            sdk_version: self.sdk_version.clone(),
        }
    }

    pub fn backoff_policy(&self) -> BackoffPolicy {
        BackoffPolicy::new(self.retry.clone().unwrap_or_default().max_retries)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.transport.clone().unwrap_or_default().connect_timeout_secs)
    }

    /// Fail early on settings the server will certainly reject.
    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            anyhow::bail!("api_key is not set");
        }
        if self.app_id.trim().is_empty() {
            anyhow::bail!("app_id is not set");
        }
        if self.namespace.trim().is_empty() {
            anyhow::bail!("namespace is not set");
        }
        Ok(())
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("rcstream")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<RealtimeConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = RealtimeConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }
    load_from_path(&path)
}

/// Load configuration from an explicit file. A missing file is an error.
pub fn load_from_path(path: &Path) -> Result<RealtimeConfig> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("read config {}", path.display()))?;
    let cfg: RealtimeConfig =
        toml::from_str(&data).with_context(|| format!("parse config {}", path.display()))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = RealtimeConfig::default();
        assert_eq!(cfg.endpoint_template, DEFAULT_ENDPOINT_TEMPLATE);
        assert_eq!(cfg.namespace, "firebase");
        assert_eq!(cfg.backoff_policy().max_retries, 8);
        assert_eq!(cfg.connect_timeout(), Duration::from_secs(30));
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn config_toml_roundtrip() {
        let mut cfg = RealtimeConfig::default();
        cfg.api_key = "key".to_string();
        cfg.template_version = Some(17);
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: RealtimeConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.api_key, "key");
        assert_eq!(parsed.template_version, Some(17));
        assert_eq!(parsed.endpoint_template, cfg.endpoint_template);
    }

    #[test]
    fn config_toml_custom_values() {
        let toml = r#"
            endpoint_template = "http://127.0.0.1:9000/{namespace}"
            api_key = "api-key-1"
            app_id = "1:123456789:android:abcdef"
            namespace = "firebase"
            package_name = "com.example.app"
            sdk_version = "21.4.0"
            installation_token = "fis-token"
            certificate_path = "/etc/app/cert.der"

            [retry]
            max_retries = 3

            [transport]
            connect_timeout_secs = 5
        "#;
        let cfg: RealtimeConfig = toml::from_str(toml).unwrap();
        cfg.validate().unwrap();
        assert_eq!(cfg.backoff_policy().max_retries, 3);
        assert_eq!(cfg.connect_timeout(), Duration::from_secs(5));
        assert_eq!(cfg.installation_token.as_deref(), Some("fis-token"));
        assert_eq!(cfg.certificate_path, Some(PathBuf::from("/etc/app/cert.der")));
        assert!(cfg.metadata_path.is_none());
        assert!(cfg.template_version.is_none());

        let settings = cfg.endpoint_settings();
        assert_eq!(settings.app_id, "1:123456789:android:abcdef");
        assert_eq!(settings.sdk_version, "21.4.0");
    }

    #[test]
    fn load_from_path_reports_missing_and_malformed_files() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(load_from_path(&missing).is_err());

        let bad = dir.path().join("bad.toml");
        fs::write(&bad, "api_key = ").unwrap();
        let err = load_from_path(&bad).unwrap_err();
        assert!(format!("{:#}", err).contains("parse config"));
    }
}
