//! Minimal HTTP/1.1 server that answers one POST with a streamed body.
//!
//! Captures the request it received so tests can check headers and body.
//! The response has no Content-Length; the body ends when the server closes
//! the connection, like a long-lived stream.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct StreamServerOptions {
    /// Status line after "HTTP/1.1 ", e.g. "200 OK".
    pub status: &'static str,
    /// Written one after another with a short pause in between.
    pub chunks: Vec<Vec<u8>>,
    /// Keep the connection open (sending nothing) after the last chunk
    /// until the client goes away.
    pub hold_open: bool,
}

impl Default for StreamServerOptions {
    fn default() -> Self {
        Self {
            status: "200 OK",
            chunks: Vec::new(),
            hold_open: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub request_line: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl CapturedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Starts a server in a background thread. Returns the base URL
/// (e.g. "http://127.0.0.1:12345/") and a receiver of captured requests.
pub fn start(opts: StreamServerOptions) -> (String, Receiver<CapturedRequest>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let opts = opts.clone();
            let tx = tx.clone();
            thread::spawn(move || handle(stream, &opts, &tx));
        }
    });
    (format!("http://127.0.0.1:{}/", port), rx)
}

fn handle(mut stream: TcpStream, opts: &StreamServerOptions, tx: &Sender<CapturedRequest>) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(2)));
    let Some(request) = read_request(&mut stream) else {
        return;
    };
    let _ = tx.send(request);

    let head = format!(
        "HTTP/1.1 {}\r\nContent-Type: application/json\r\nConnection: close\r\n\r\n",
        opts.status
    );
    if stream.write_all(head.as_bytes()).is_err() {
        return;
    }
    for chunk in &opts.chunks {
        if stream.write_all(chunk).and_then(|_| stream.flush()).is_err() {
            return;
        }
        thread::sleep(Duration::from_millis(20));
    }
    if opts.hold_open {
        // Idle until the peer closes; a read returning 0 or an error ends it.
        let _ = stream.set_read_timeout(Some(Duration::from_secs(30)));
        let mut buf = [0u8; 64];
        let _ = stream.read(&mut buf);
    }
}

fn read_request(stream: &mut TcpStream) -> Option<CapturedRequest> {
    let mut data = Vec::new();
    let mut buf = [0u8; 4096];
    let header_end = loop {
        if let Some(pos) = find(&data, b"\r\n\r\n") {
            break pos;
        }
        let n = stream.read(&mut buf).ok()?;
        if n == 0 {
            return None;
        }
        data.extend_from_slice(&buf[..n]);
    };

    let head = std::str::from_utf8(&data[..header_end]).ok()?;
    let mut lines = head.split("\r\n");
    let request_line = lines.next()?.to_string();
    let headers: Vec<(String, String)> = lines
        .filter_map(|l| l.split_once(':'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect();
    let content_length: usize = headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.parse().ok())
        .unwrap_or(0);

    let mut body = data[header_end + 4..].to_vec();
    while body.len() < content_length {
        let n = stream.read(&mut buf).ok()?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&buf[..n]);
    }
    Some(CapturedRequest {
        request_line,
        headers,
        body,
    })
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}
