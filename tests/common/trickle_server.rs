//! Minimal HTTP/1.1 server that drips a static body out in small chunks, for
//! exercising mid-stream cancellation, stalls and unknown lengths.

use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct TrickleOptions {
    pub chunk: usize,
    pub delay: Duration,
    /// If false, omit Content-Length and close the connection to end the body.
    pub content_length: bool,
    /// Stop sending (but keep the socket open) after this many bytes.
    pub stall_after: Option<usize>,
}

impl Default for TrickleOptions {
    fn default() -> Self {
        Self {
            chunk: 64 * 1024,
            delay: Duration::from_millis(10),
            content_length: true,
            stall_after: None,
        }
    }
}

/// Starts a server in a background thread. Returns a URL ending in
/// `/video.mp4`. The server runs until the process exits.
pub fn start(body: Vec<u8>, opts: TrickleOptions) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let body = Arc::new(body);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let body = Arc::clone(&body);
            thread::spawn(move || handle(stream, &body, opts));
        }
    });
    format!("http://127.0.0.1:{}/video.mp4", port)
}

fn handle(mut stream: std::net::TcpStream, body: &[u8], opts: TrickleOptions) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let mut buf = [0u8; 8192];
    match stream.read(&mut buf) {
        Ok(0) | Err(_) => return,
        Ok(_) => {}
    }

    let header = if opts.content_length {
        format!(
            "HTTP/1.1 200 OK\r\nContent-Type: video/mp4\r\nContent-Length: {}\r\n\r\n",
            body.len()
        )
    } else {
        "HTTP/1.1 200 OK\r\nContent-Type: video/mp4\r\nConnection: close\r\n\r\n".to_string()
    };
    if stream.write_all(header.as_bytes()).is_err() {
        return;
    }

    let limit = opts.stall_after.unwrap_or(body.len()).min(body.len());
    for part in body[..limit].chunks(opts.chunk.max(1)) {
        if stream.write_all(part).is_err() {
            return;
        }
        let _ = stream.flush();
        thread::sleep(opts.delay);
    }

    if opts.stall_after.is_some() {
        thread::sleep(Duration::from_secs(30));
    }
}
