//! HTTP/1.1 exchange layer for webcase
//!
//! This module performs one request/response cycle against a server under
//! test. Everything above it (the assertion context, the error signal) only
//! sees the composed [`HttpResponse`].
//!
//! # Architecture
//!
//! - `Headers` keeps header pairs in order with case-insensitive lookup and
//!   owns the request normalization rules (default content headers for
//!   submission methods)
//! - `SessionOps` abstracts the byte transport; `FdSessionOps` is the plain
//!   TCP implementation and `Connector` opens one per attempt
//! - `HttpClient` writes a request and reads back a complete response over
//!   one session
//! - `RequestExecutor` ties these together and retries transient socket
//!   failures
//!
//! # Examples
//!
//! ```no_run
//! use webcase::http::{open_url, Method};
//!
//! let response = open_url("/", None, Method::GET, None, "127.0.0.1", 8080).unwrap();
//! assert_eq!(response.status(), "200 OK");
//! ```

pub mod chunked;
pub mod client;
pub mod executor;
pub mod headers;
pub mod message;
pub mod parser;
pub mod session;

pub use client::HttpClient;
pub use executor::{open_url, RequestExecutor, RetryPolicy};
pub use headers::Headers;
pub use message::{HttpRequest, HttpResponse, Method, Status, Version};
pub use parser::ResponseParser;
pub use session::{Connector, FdSessionOps, HttpSession, SessionOps, TcpConnector, TransportConfig};

/// Result type for HTTP operations
pub type Result<T> = std::result::Result<T, Error>;

/// HTTP operation errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid HTTP version: {0}")]
    InvalidVersion(String),

    #[error("Invalid HTTP method: {0:?}")]
    InvalidMethod(String),

    #[error("Invalid HTTP status: {0}")]
    InvalidStatus(String),

    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    #[error("Invalid chunk size: {0}")]
    InvalidChunkSize(String),

    #[error("Incomplete message")]
    Incomplete,

    #[error("Timeout")]
    Timeout,

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl Error {
    /// Whether this is a socket-level failure worth another attempt.
    ///
    /// Anything the server actually said (even if malformed) is final.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Io(_) | Error::Timeout)
    }
}

/// Default host of the server under test
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default port of the server under test
pub const DEFAULT_PORT: u16 = 8000;

/// Content type synthesized for submission requests without one
pub const DEFAULT_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// CRLF line ending
pub const CRLF: &str = "\r\n";
