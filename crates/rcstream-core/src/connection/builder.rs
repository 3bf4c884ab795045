//! Assemble the realtime stream request: URL, headers, auth token and body.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use super::app_id::extract_project_number;
use super::error::ConnectionError;
use super::identity::{IdentityError, PackageIdentity};
use super::StreamRequest;

pub const API_KEY_HEADER: &str = "X-Goog-Api-Key";
pub const ANDROID_PACKAGE_HEADER: &str = "X-Android-Package";
pub const ANDROID_CERT_HEADER: &str = "X-Android-Cert";
pub const GFE_CAN_RETRY_HEADER: &str = "X-Google-GFE-Can-Retry";
pub const INSTALLATIONS_AUTH_TOKEN_HEADER: &str = "X-Goog-Firebase-Installations-Auth";
pub const ACCEPT_RESPONSE_STREAMING_HEADER: &str = "X-Accept-Response-Streaming";

/// Supplies installation auth tokens. May hit the network.
#[async_trait]
pub trait InstallationTokenProvider: Send + Sync {
    async fn token(&self, force_refresh: bool) -> anyhow::Result<String>;
}

/// Template version of the most recently fetched config (0 before the first fetch).
pub trait TemplateVersionSource: Send + Sync {
    fn template_version(&self) -> i64;
}

/// Static endpoint settings, usually taken from [`crate::config::RealtimeConfig`].
#[derive(Debug, Clone)]
pub struct EndpointSettings {
    /// URL with `{project}` and `{namespace}` placeholders.
    pub endpoint_template: String,
    pub api_key: String,
    pub app_id: String,
    pub sdk_version: String,
}

/// JSON body of a stream request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamRequestBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    pub namespace: String,
    pub last_known_version_number: String,
    pub app_id: String,
    pub sdk_version: String,
}

/// Builds one [`StreamRequest`] per connection attempt.
pub struct ConnectionBuilder {
    settings: EndpointSettings,
    identity: Arc<dyn PackageIdentity>,
    tokens: Arc<dyn InstallationTokenProvider>,
}

impl ConnectionBuilder {
    pub fn new(
        settings: EndpointSettings,
        identity: Arc<dyn PackageIdentity>,
        tokens: Arc<dyn InstallationTokenProvider>,
    ) -> Self {
        Self {
            settings,
            identity,
            tokens,
        }
    }

    /// Resolve the endpoint template for `namespace`.
    ///
    /// Fails when the template needs a project number and the app id has none,
    /// or when the result is not a valid URL.
    pub fn resolve_url(&self, namespace: &str) -> Result<String, ConnectionError> {
        let mut url = self.settings.endpoint_template.replace("{namespace}", namespace);
        if url.contains("{project}") {
            let project = extract_project_number(&self.settings.app_id)
                .ok_or_else(|| ConnectionError::InvalidAppId(self.settings.app_id.clone()))?;
            url = url.replace("{project}", project);
        }
        match url::Url::parse(&url) {
            Ok(parsed) => Ok(parsed.into()),
            Err(source) => Err(ConnectionError::MalformedUrl { url, source }),
        }
    }

    pub fn body(&self, namespace: &str, current_version: i64) -> StreamRequestBody {
        StreamRequestBody {
            project: extract_project_number(&self.settings.app_id).map(str::to_string),
            namespace: namespace.to_string(),
            last_known_version_number: current_version.to_string(),
            app_id: self.settings.app_id.clone(),
            sdk_version: self.settings.sdk_version.clone(),
        }
    }

    /// Build the request for one attempt.
    ///
    /// The installation token is awaited before the request exists, so the
    /// auth header is always in place before anything is sent. Token and
    /// fingerprint failures only drop their header.
    pub async fn build(
        &self,
        namespace: &str,
        current_version: i64,
    ) -> Result<StreamRequest, ConnectionError> {
        let url = self.resolve_url(namespace)?;
        let mut headers: Vec<(String, String)> = Vec::with_capacity(9);

        match self.tokens.token(false).await {
            Ok(token) => headers.push((INSTALLATIONS_AUTH_TOKEN_HEADER.to_string(), token)),
            Err(e) => tracing::warn!("installation auth token unavailable: {:#}", e),
        }

        headers.push((API_KEY_HEADER.to_string(), self.settings.api_key.clone()));

        // Required for API key restrictions.
        headers.push((
            ANDROID_PACKAGE_HEADER.to_string(),
            self.identity.package_name().to_string(),
        ));
        if let Some(fingerprint) = self.fingerprint() {
            headers.push((ANDROID_CERT_HEADER.to_string(), fingerprint));
        }

        headers.push((GFE_CAN_RETRY_HEADER.to_string(), "yes".to_string()));
        headers.push((ACCEPT_RESPONSE_STREAMING_HEADER.to_string(), "true".to_string()));
        headers.push(("Content-Type".to_string(), "application/json".to_string()));
        headers.push(("Accept".to_string(), "application/json".to_string()));

        let body = serde_json::to_vec(&self.body(namespace, current_version))?;
        Ok(StreamRequest { url, headers, body })
    }

    /// Uppercase hex certificate fingerprint, or `None` if it can't be computed.
    fn fingerprint(&self) -> Option<String> {
        let package = self.identity.package_name();
        match self.identity.certificate_hash() {
            Ok(Some(hash)) => Some(hex::encode_upper(hash)),
            Ok(None) => {
                tracing::warn!(package, "could not get fingerprint hash for package");
                None
            }
            Err(IdentityError::PackageNotFound(_)) => {
                tracing::info!(package, "no such package");
                None
            }
            Err(e) => {
                tracing::warn!(package, "certificate fingerprint unavailable: {}", e);
                None
            }
        }
    }
}
