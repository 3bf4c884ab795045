//! Outbound realtime connection: request assembly and the transport that
//! opens the long-lived stream.

mod app_id;
mod builder;
mod error;
mod identity;
mod transport;

pub use app_id::extract_project_number;
pub use builder::{
    ConnectionBuilder, EndpointSettings, InstallationTokenProvider, StreamRequestBody,
    TemplateVersionSource, ACCEPT_RESPONSE_STREAMING_HEADER, ANDROID_CERT_HEADER,
    ANDROID_PACKAGE_HEADER, API_KEY_HEADER, GFE_CAN_RETRY_HEADER,
    INSTALLATIONS_AUTH_TOKEN_HEADER,
};
pub use error::{ConnectionError, StreamError};
pub use identity::{fingerprint_path, IdentityError, PackageIdentity, StaticPackageIdentity};
pub use transport::{CurlTransport, StreamConnection, Transport};

#[cfg(test)]
pub(crate) use builder::tests as builder_fakes;

/// A fully built stream request. Immutable once built; one per attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRequest {
    pub url: String,
    /// Header name/value pairs in send order.
    pub headers: Vec<(String, String)>,
    /// JSON body.
    pub body: Vec<u8>,
}

impl StreamRequest {
    /// First header value with the given name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}
