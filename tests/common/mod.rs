//! Scripted HTTP peer for integration tests
//!
//! Accepts a fixed number of connections, reads one request from each and
//! answers with whatever the handler returns.

#![allow(dead_code)]

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread::{self, JoinHandle};

pub struct TestServer {
    pub port: u16,
    handle: JoinHandle<Vec<String>>,
}

impl TestServer {
    /// Wait for the server to finish and return the raw requests it saw
    pub fn requests(self) -> Vec<String> {
        self.handle.join().unwrap()
    }
}

/// Serve `connections` requests on an ephemeral port
pub fn serve<F>(connections: usize, handler: F) -> TestServer
where
    F: Fn(&str) -> Vec<u8> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let handle = thread::spawn(move || {
        let mut seen = Vec::new();
        for _ in 0..connections {
            let (mut stream, _) = listener.accept().unwrap();
            let request = read_request(&mut stream);
            stream.write_all(&handler(&request)).unwrap();
            seen.push(request);
        }
        seen
    });

    TestServer { port, handle }
}

/// A port with nothing listening on it
pub fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

/// Build a response with a Content-Length
pub fn response(status: &str, headers: &[(&str, &str)], body: &str) -> Vec<u8> {
    let mut out = format!("HTTP/1.1 {}\r\n", status);
    for (name, value) in headers {
        out.push_str(&format!("{}: {}\r\n", name, value));
    }
    out.push_str(&format!("Content-Length: {}\r\n\r\n{}", body.len(), body));
    out.into_bytes()
}

fn read_request(stream: &mut TcpStream) -> String {
    let mut data = Vec::new();
    let mut buf = [0u8; 1024];

    loop {
        let n = stream.read(&mut buf).unwrap();
        if n == 0 {
            break;
        }
        data.extend_from_slice(&buf[..n]);

        let text = String::from_utf8_lossy(&data);
        if let Some(end) = text.find("\r\n\r\n") {
            let length = text[..end]
                .lines()
                .filter_map(|line| line.split_once(':'))
                .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
                .map_or(0, |(_, value)| value.trim().parse::<usize>().unwrap());
            if data.len() >= end + 4 + length {
                break;
            }
        }
    }

    String::from_utf8_lossy(&data).to_string()
}
