//! RAII guard that closes a stream connection when dropped.

use std::io::{self, Read};

use crate::connection::StreamConnection;

/// Closes the wrapped connection on drop, including on early return or
/// panic in the notification reader.
pub(super) struct ConnectionGuard(Box<dyn StreamConnection>);

impl ConnectionGuard {
    pub(super) fn new(conn: Box<dyn StreamConnection>) -> Self {
        Self(conn)
    }

    pub(super) fn status(&self) -> u32 {
        self.0.status()
    }
}

impl Read for ConnectionGuard {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.0.close();
    }
}
