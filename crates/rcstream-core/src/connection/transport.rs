//! Transport that opens the realtime stream.
//!
//! [`CurlTransport`] runs one libcurl transfer per stream on its own thread.
//! Body chunks are forwarded over a bounded channel and exposed through
//! [`std::io::Read`], so the notification reader can block on the stream
//! like on any other reader.

use std::io::{self, Read};
use std::str;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::error::StreamError;
use super::StreamRequest;

/// Body chunks buffered between the curl thread and the reader.
const CHANNEL_DEPTH: usize = 16;

/// An open stream whose status line has been received.
pub trait StreamConnection: Read + Send {
    fn status(&self) -> u32;

    /// Release the connection. Must be safe to call more than once and after
    /// the body has been fully read.
    fn close(&mut self);
}

/// Opens stream connections. Blocking; call from a worker thread.
pub trait Transport: Send + Sync {
    /// POST `request` and return once the response status is known.
    fn open(&self, request: &StreamRequest) -> Result<Box<dyn StreamConnection>, StreamError>;
}

/// libcurl-based transport.
#[derive(Debug, Clone, Copy)]
pub struct CurlTransport {
    connect_timeout: Duration,
}

impl Default for CurlTransport {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
        }
    }
}

impl CurlTransport {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

enum CurlEvent {
    Status(u32),
    Chunk(Vec<u8>),
    Done(Result<(), curl::Error>),
}

impl Transport for CurlTransport {
    fn open(&self, request: &StreamRequest) -> Result<Box<dyn StreamConnection>, StreamError> {
        let mut easy = curl::easy::Easy::new();
        easy.url(&request.url)?;
        easy.post(true)?;
        easy.post_fields_copy(&request.body)?;
        easy.connect_timeout(self.connect_timeout)?;
        // Progress callbacks are how an idle transfer notices `close()`.
        easy.progress(true)?;

        let mut list = curl::easy::List::new();
        for (k, v) in &request.headers {
            list.append(&format!("{}: {}", k.trim(), v.trim()))?;
        }
        easy.http_headers(list)?;

        let (tx, rx) = mpsc::sync_channel(CHANNEL_DEPTH);
        let abort = Arc::new(AtomicBool::new(false));
        let worker = thread::Builder::new()
            .name("rcstream-stream".to_string())
            .spawn({
                let abort = Arc::clone(&abort);
                move || perform_stream(easy, tx, abort)
            })
            .map_err(StreamError::Io)?;

        let first = rx.recv();
        match first {
            Ok(CurlEvent::Status(status)) => Ok(Box::new(CurlConnection {
                status,
                rx: Some(rx),
                pending: Vec::new(),
                pos: 0,
                finished: false,
                abort,
                worker: Some(worker),
            })),
            Ok(CurlEvent::Done(Err(e))) => {
                let _ = worker.join();
                Err(StreamError::Curl(e))
            }
            Ok(CurlEvent::Done(Ok(()))) | Ok(CurlEvent::Chunk(_)) | Err(_) => {
                abort.store(true, Ordering::Relaxed);
                drop(rx);
                let _ = worker.join();
                Err(StreamError::NoResponse)
            }
        }
    }
}

/// Runs the transfer to completion on the current thread, then reports how it ended.
fn perform_stream(mut easy: curl::easy::Easy, tx: SyncSender<CurlEvent>, abort: Arc<AtomicBool>) {
    let result = run_transfer(&mut easy, &tx, &abort);
    if let Err(e) = &result {
        if !abort.load(Ordering::Relaxed) {
            tracing::debug!("realtime transfer ended with error: {}", e);
        }
    }
    let _ = tx.send(CurlEvent::Done(result));
}

fn run_transfer(
    easy: &mut curl::easy::Easy,
    tx: &SyncSender<CurlEvent>,
    abort: &Arc<AtomicBool>,
) -> Result<(), curl::Error> {
    let header_tx = tx.clone();
    let body_tx = tx.clone();
    let body_abort = Arc::clone(abort);
    let progress_abort = Arc::clone(abort);
    let mut status: Option<u32> = None;
    let mut announced = false;

    let mut transfer = easy.transfer();
    transfer.header_function(move |data| {
        let Ok(line) = str::from_utf8(data) else {
            return true;
        };
        let line = line.trim_end();
        if line.is_empty() {
            // End of a header block; 1xx blocks are followed by the real one.
            if let Some(code) = status.filter(|c| *c >= 200) {
                if !announced {
                    announced = true;
                    return header_tx.send(CurlEvent::Status(code)).is_ok();
                }
            }
        } else if let Some(code) = parse_status_line(line) {
            status = Some(code);
        }
        true
    })?;
    transfer.write_function(move |data| {
        if body_abort.load(Ordering::Relaxed) {
            return Ok(0);
        }
        match body_tx.send(CurlEvent::Chunk(data.to_vec())) {
            Ok(()) => Ok(data.len()),
            // Reader went away: abort the transfer.
            Err(_) => Ok(0),
        }
    })?;
    transfer.progress_function(move |_, _, _, _| !progress_abort.load(Ordering::Relaxed))?;
    transfer.perform()
}

/// `HTTP/1.1 200 OK` -> 200.
fn parse_status_line(line: &str) -> Option<u32> {
    let mut parts = line.split_whitespace();
    let proto = parts.next()?;
    if !proto.starts_with("HTTP/") {
        return None;
    }
    parts.next()?.parse().ok()
}

struct CurlConnection {
    status: u32,
    rx: Option<Receiver<CurlEvent>>,
    pending: Vec<u8>,
    pos: usize,
    finished: bool,
    abort: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl Read for CurlConnection {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            if self.pos < self.pending.len() {
                let n = buf.len().min(self.pending.len() - self.pos);
                buf[..n].copy_from_slice(&self.pending[self.pos..self.pos + n]);
                self.pos += n;
                return Ok(n);
            }
            if self.finished {
                return Ok(0);
            }
            let Some(rx) = self.rx.as_ref() else {
                return Ok(0);
            };
            match rx.recv() {
                Ok(CurlEvent::Chunk(data)) => {
                    self.pending = data;
                    self.pos = 0;
                }
                Ok(CurlEvent::Status(_)) => {}
                Ok(CurlEvent::Done(Ok(()))) | Err(_) => self.finished = true,
                Ok(CurlEvent::Done(Err(e))) => {
                    self.finished = true;
                    return Err(io::Error::new(io::ErrorKind::Other, e));
                }
            }
        }
    }
}

impl StreamConnection for CurlConnection {
    fn status(&self) -> u32 {
        self.status
    }

    fn close(&mut self) {
        self.abort.store(true, Ordering::Relaxed);
        // Dropping the receiver unblocks a curl thread stuck on a full channel.
        self.rx = None;
        self.pending.clear();
        self.pos = 0;
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::warn!("realtime transfer thread panicked");
            }
        }
    }
}

impl Drop for CurlConnection {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_status_line_variants() {
        assert_eq!(parse_status_line("HTTP/1.1 200 OK"), Some(200));
        assert_eq!(parse_status_line("HTTP/2 503"), Some(503));
        assert_eq!(parse_status_line("HTTP/1.1 100 Continue"), Some(100));
        assert_eq!(parse_status_line("Content-Type: application/json"), None);
        assert_eq!(parse_status_line("HTTP/1.1"), None);
    }
}
