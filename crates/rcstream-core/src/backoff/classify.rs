//! Classify realtime endpoint HTTP status codes.

/// What the lifecycle manager should do with a response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamStatus {
    /// 200: the stream is open and can be handed to the notification reader.
    Ok,
    /// Server is overloaded or timed out (408, 429, 502, 503, 504).
    Retryable,
    /// Any other status. Reported to listeners once; no automatic retry.
    Fatal,
}

/// Classify an HTTP status code returned by the realtime endpoint.
pub fn classify_http_status(code: u32) -> StreamStatus {
    match code {
        200 => StreamStatus::Ok,
        408 | 429 | 502 | 503 | 504 => StreamStatus::Retryable,
        _ => StreamStatus::Fatal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_200_is_ok() {
        assert_eq!(classify_http_status(200), StreamStatus::Ok);
    }

    #[test]
    fn timeouts_throttling_and_gateway_errors_retryable() {
        for code in [408, 429, 502, 503, 504] {
            assert_eq!(classify_http_status(code), StreamStatus::Retryable, "{code}");
        }
    }

    #[test]
    fn other_statuses_fatal() {
        for code in [201, 204, 301, 400, 401, 403, 404, 500, 501] {
            assert_eq!(classify_http_status(code), StreamStatus::Fatal, "{code}");
        }
    }
}
