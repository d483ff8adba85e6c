#![allow(dead_code)]

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

/// Read one request, including its body, so the client never sees a reset.
fn drain_request(stream: &mut TcpStream) {
    let mut data = Vec::new();
    let mut buf = [0u8; 16 * 1024];
    loop {
        let n = stream.read(&mut buf).unwrap_or(0);
        if n == 0 {
            return;
        }
        data.extend_from_slice(&buf[..n]);
        let text = String::from_utf8_lossy(&data);
        if let Some(end) = text.find("\r\n\r\n") {
            let length = text[..end]
                .lines()
                .filter_map(|l| l.split_once(':'))
                .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
                .and_then(|(_, v)| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if data.len() >= end + 4 + length {
                return;
            }
        }
    }
}

/// Fake provider on `127.0.0.1:0`. `respond(n)` answers the n-th request
/// (zero-based) with a status and JSON body. Returns the base URL and a
/// counter of requests served.
pub fn start_server<F>(respond: F) -> (String, Arc<AtomicUsize>)
where
    F: Fn(usize) -> (u16, String) + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();

    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { break };
            drain_request(&mut stream);
            let n = counter.fetch_add(1, Ordering::SeqCst);
            let (status, body) = respond(n);
            let resp = format!(
                "HTTP/1.1 {} X\r\nContent-Length: {}\r\nContent-Type: application/json\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            let _ = stream.write_all(resp.as_bytes());
        }
    });

    (format!("http://{}", addr), hits)
}

/// Serves `responses` in order, then 500 for anything after.
pub fn start_scripted(responses: Vec<(u16, &'static str)>) -> (String, Arc<AtomicUsize>) {
    start_server(move |n| match responses.get(n) {
        Some((status, body)) => (*status, body.to_string()),
        None => (500, "{}".to_string()),
    })
}
