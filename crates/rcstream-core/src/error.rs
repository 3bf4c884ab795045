//! Errors delivered to realtime listeners.

/// Category of a listener-facing error, so apps can branch without matching
/// on message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// The stream could not be (re)established or the server rejected it.
    ConfigUpdateStreamError,
    /// The server switched realtime updates off for this app.
    ConfigUpdateUnavailable,
}

/// Terminal conditions broadcast to every registered listener.
///
/// Transport failures are not in this list: they are retried silently and
/// only surface as [`RealtimeError::StreamUnavailable`] once the retry budget
/// is spent.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RealtimeError {
    #[error("Unable to connect to the server. Check your connection and try again.")]
    StreamUnavailable,

    #[error("Unable to connect to the server. Try again in a few minutes. HTTP status code: {code}")]
    ServerStatus { code: u32 },

    #[error("realtime updates disabled by server: {message}")]
    Disabled { message: String },
}

impl RealtimeError {
    pub fn code(&self) -> ErrorCode {
        match self {
            RealtimeError::StreamUnavailable | RealtimeError::ServerStatus { .. } => {
                ErrorCode::ConfigUpdateStreamError
            }
            RealtimeError::Disabled { .. } => ErrorCode::ConfigUpdateUnavailable,
        }
    }

    /// HTTP status carried by the error, if any.
    pub fn http_status(&self) -> Option<u32> {
        match self {
            RealtimeError::ServerStatus { code } => Some(*code),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_status_message_includes_code() {
        let e = RealtimeError::ServerStatus { code: 404 };
        assert!(e.to_string().contains("404"));
        assert_eq!(e.http_status(), Some(404));
        assert_eq!(e.code(), ErrorCode::ConfigUpdateStreamError);
    }

    #[test]
    fn disabled_maps_to_unavailable_code() {
        let e = RealtimeError::Disabled {
            message: "kill switch".to_string(),
        };
        assert_eq!(e.code(), ErrorCode::ConfigUpdateUnavailable);
        assert_eq!(e.http_status(), None);
    }
}
