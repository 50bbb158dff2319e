//! HTTP client implementation
//!
//! One `HttpClient` drives one request/response cycle over one session.

use super::{Error, HttpRequest, HttpResponse, HttpSession, Method, ResponseParser, Result, SessionOps};
use std::time::Duration;

/// HTTP client
///
/// Provides methods for sending a request and receiving the full response.
pub struct HttpClient<S: SessionOps> {
    session: HttpSession<S>,
    head_request: bool,
}

impl<S: SessionOps> HttpClient<S> {
    /// Create a new HTTP client with a session
    pub fn new(session: S) -> Self {
        HttpClient {
            session: HttpSession::new(session),
            head_request: false,
        }
    }

    /// Set the timeout for operations
    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.session.set_timeout(timeout);
    }

    /// Send an HTTP request
    pub fn send_request(&mut self, request: &HttpRequest) -> Result<()> {
        self.head_request = *request.method() == Method::HEAD;

        let wire = request.to_wire();
        let mut written = 0;

        while written < wire.len() {
            let n = self.session.write(&wire[written..])?;
            if n == 0 {
                return Err(Error::ConnectionClosed);
            }
            written += n;
        }

        Ok(())
    }

    /// Receive an HTTP response, reading the body to its end
    pub fn receive_response(&mut self) -> Result<HttpResponse> {
        let mut parser = if self.head_request {
            ResponseParser::for_head_request()
        } else {
            ResponseParser::new()
        };
        let mut temp = vec![0u8; 4096];

        loop {
            let n = self.session.read(&mut temp)?;

            if n == 0 {
                return parser.finish();
            }

            if let Some(response) = parser.parse(&temp[..n])? {
                return Ok(response);
            }
        }
    }

    /// Send a request and receive its response
    pub fn exchange(&mut self, request: &HttpRequest) -> Result<HttpResponse> {
        self.send_request(request)?;
        self.receive_response()
    }

    /// Close the connection
    pub fn close(&mut self) -> Result<()> {
        self.session.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::session::FdSessionOps;
    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::thread;

    #[test]
    fn test_send_request() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = vec![0u8; 1024];
            let n = stream.read(&mut buf).unwrap();
            String::from_utf8_lossy(&buf[..n]).to_string()
        });

        let stream = TcpStream::connect(addr).unwrap();
        let mut client = HttpClient::new(FdSessionOps::new(stream));

        let request = HttpRequest::builder()
            .method(Method::GET)
            .uri("/")
            .header("Host", "localhost")
            .build();

        client.send_request(&request).unwrap();

        let received = handle.join().unwrap();
        assert!(received.starts_with("GET / HTTP/1.1\r\n"));
        assert!(received.contains("Host: localhost\r\n"));
    }

    #[test]
    fn test_receive_response() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = vec![0u8; 1024];
            stream.read(&mut buf).unwrap();

            stream
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: 5\r\n\r\nHello")
                .unwrap();
        });

        let stream = TcpStream::connect(addr).unwrap();
        let mut client = HttpClient::new(FdSessionOps::new(stream));

        let request = HttpRequest::builder().uri("/").build();
        let response = client.exchange(&request).unwrap();

        assert_eq!(response.status().code(), 200);
        assert_eq!(response.body(), b"Hello");
        assert_eq!(response.headers().get("Content-Type"), Some("text/plain"));

        client.close().unwrap();
        handle.join().unwrap();
    }

    #[test]
    fn test_receive_until_close() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = vec![0u8; 1024];
            stream.read(&mut buf).unwrap();

            stream.write_all(b"HTTP/1.0 200 OK\r\n\r\n").unwrap();
            stream.write_all(b"no length").unwrap();
            // Dropping the stream ends the body
        });

        let stream = TcpStream::connect(addr).unwrap();
        let mut client = HttpClient::new(FdSessionOps::new(stream));

        let request = HttpRequest::builder().uri("/").build();
        let response = client.exchange(&request).unwrap();
        assert_eq!(response.body(), b"no length");

        handle.join().unwrap();
    }

    #[test]
    fn test_head_response_has_no_body() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = vec![0u8; 1024];
            stream.read(&mut buf).unwrap();

            stream
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 1234\r\n\r\n")
                .unwrap();
            thread::sleep(std::time::Duration::from_millis(200));
        });

        let stream = TcpStream::connect(addr).unwrap();
        let mut client = HttpClient::new(FdSessionOps::new(stream));

        let request = HttpRequest::builder().method(Method::HEAD).uri("/").build();
        let response = client.exchange(&request).unwrap();
        assert_eq!(response.headers().get("Content-Length"), Some("1234"));
        assert!(response.body().is_empty());

        handle.join().unwrap();
    }
}
