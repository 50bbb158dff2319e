//! HTTP message types
//!
//! This module defines the request and response types exchanged with the
//! server under test.

use super::{Error, Headers, Result, CRLF};
use bytes::Bytes;
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

/// HTTP method
///
/// Methods are free-form: any verb is passed through to the wire,
/// uppercased. The common ones are available as constants.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Method(Cow<'static, str>);

impl Method {
    pub const GET: Method = Method(Cow::Borrowed("GET"));
    pub const HEAD: Method = Method(Cow::Borrowed("HEAD"));
    pub const POST: Method = Method(Cow::Borrowed("POST"));
    pub const PUT: Method = Method(Cow::Borrowed("PUT"));
    pub const DELETE: Method = Method(Cow::Borrowed("DELETE"));
    pub const OPTIONS: Method = Method(Cow::Borrowed("OPTIONS"));
    pub const TRACE: Method = Method(Cow::Borrowed("TRACE"));

    /// Create a method from any verb, uppercasing it
    pub fn new(verb: impl AsRef<str>) -> Self {
        Method(Cow::Owned(verb.as_ref().trim().to_ascii_uppercase()))
    }

    /// Convert method to string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this verb conventionally carries a request body
    pub fn is_submission(&self) -> bool {
        matches!(self.as_str(), "POST" | "PUT")
    }

    /// Check that the verb can be put on a request line
    pub fn validate(&self) -> Result<()> {
        if self.0.is_empty() || self.0.bytes().any(|b| b.is_ascii_whitespace()) {
            return Err(Error::InvalidMethod(self.0.to_string()));
        }
        Ok(())
    }
}

impl Default for Method {
    fn default() -> Self {
        Method::GET
    }
}

impl FromStr for Method {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let method = Method::new(s);
        method.validate()?;
        Ok(method)
    }
}

impl From<&str> for Method {
    fn from(s: &str) -> Self {
        Method::new(s)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// HTTP version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Version {
    Http10,
    #[default]
    Http11,
}

impl Version {
    /// Parse version from string
    pub fn from_str(s: &str) -> Result<Self> {
        match s {
            "HTTP/1.0" => Ok(Version::Http10),
            "HTTP/1.1" => Ok(Version::Http11),
            _ => Err(Error::InvalidVersion(s.to_string())),
        }
    }

    /// Convert version to string
    pub fn as_str(&self) -> &'static str {
        match self {
            Version::Http10 => "HTTP/1.0",
            Version::Http11 => "HTTP/1.1",
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// HTTP status as received: numeric code plus reason phrase
///
/// Displays (and compares against strings) in its wire form, e.g.
/// `"200 OK"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Status {
    code: u16,
    reason: String,
}

impl Status {
    /// Create a status with an explicit reason phrase
    pub fn new(code: u16, reason: impl Into<String>) -> Result<Self> {
        if (100..600).contains(&code) {
            Ok(Status {
                code,
                reason: reason.into(),
            })
        } else {
            Err(Error::InvalidStatus(format!("Invalid status code: {}", code)))
        }
    }

    /// Create a status carrying the canonical reason phrase for `code`
    pub fn from_code(code: u16) -> Result<Self> {
        Status::new(code, canonical_reason(code))
    }

    /// Get the status code
    pub fn code(&self) -> u16 {
        self.code
    }

    /// Get the reason phrase
    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// Check if this is an informational status (1xx)
    pub fn is_informational(&self) -> bool {
        (100..200).contains(&self.code)
    }

    /// Check if this is a client error status (4xx)
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.code)
    }

    /// Check if this is a server error status (5xx)
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.code)
    }

    /// Whether a response with this status never has a body
    pub fn forbids_body(&self) -> bool {
        self.is_informational() || self.code == 204 || self.code == 304
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.reason)
    }
}

impl PartialEq<str> for Status {
    fn eq(&self, other: &str) -> bool {
        match other.split_once(' ') {
            Some((code, reason)) => code == self.code.to_string() && reason == self.reason,
            None => false,
        }
    }
}

impl PartialEq<&str> for Status {
    fn eq(&self, other: &&str) -> bool {
        self == *other
    }
}

/// Canonical reason phrase for a status code
pub fn canonical_reason(code: u16) -> &'static str {
    match code {
        100 => "Continue",
        101 => "Switching Protocols",
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        203 => "Non-Authoritative Information",
        204 => "No Content",
        205 => "Reset Content",
        206 => "Partial Content",
        300 => "Multiple Choices",
        301 => "Moved Permanently",
        302 => "Found",
        303 => "See Other",
        304 => "Not Modified",
        305 => "Use Proxy",
        307 => "Temporary Redirect",
        308 => "Permanent Redirect",
        400 => "Bad Request",
        401 => "Unauthorized",
        402 => "Payment Required",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        406 => "Not Acceptable",
        407 => "Proxy Authentication Required",
        408 => "Request Timeout",
        409 => "Conflict",
        410 => "Gone",
        411 => "Length Required",
        412 => "Precondition Failed",
        413 => "Payload Too Large",
        414 => "URI Too Long",
        415 => "Unsupported Media Type",
        416 => "Range Not Satisfiable",
        417 => "Expectation Failed",
        426 => "Upgrade Required",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        505 => "HTTP Version Not Supported",
        _ => "Unknown",
    }
}

/// HTTP request
#[derive(Debug, Clone)]
pub struct HttpRequest {
    method: Method,
    uri: String,
    version: Version,
    headers: Headers,
    body: Option<Vec<u8>>,
}

impl HttpRequest {
    /// Create a new HTTP request
    pub fn new(method: Method, uri: impl Into<String>) -> Self {
        HttpRequest {
            method,
            uri: uri.into(),
            version: Version::default(),
            headers: Headers::new(),
            body: None,
        }
    }

    /// Create a builder for constructing requests
    pub fn builder() -> HttpRequestBuilder {
        HttpRequestBuilder::default()
    }

    /// Get the request method
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Get the request URI
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Get the HTTP version
    pub fn version(&self) -> Version {
        self.version
    }

    /// Get the headers
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Get mutable headers
    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    /// Get the body, if one was given
    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    /// Set the body
    pub fn set_body(&mut self, body: Option<Vec<u8>>) {
        self.body = body;
    }

    /// Apply the default content headers for this request's method
    pub fn normalize(&mut self) {
        self.headers.normalize(&self.method, self.body.as_deref());
    }

    /// Convert the request to wire format
    pub fn to_wire(&self) -> Vec<u8> {
        let mut buf = Vec::new();

        // Request line
        buf.extend_from_slice(self.method.as_str().as_bytes());
        buf.push(b' ');
        buf.extend_from_slice(self.uri.as_bytes());
        buf.push(b' ');
        buf.extend_from_slice(self.version.as_str().as_bytes());
        buf.extend_from_slice(CRLF.as_bytes());

        // Headers
        for (name, value) in self.headers.iter() {
            buf.extend_from_slice(name.as_bytes());
            buf.extend_from_slice(b": ");
            buf.extend_from_slice(value.as_bytes());
            buf.extend_from_slice(CRLF.as_bytes());
        }

        // Empty line
        buf.extend_from_slice(CRLF.as_bytes());

        if let Some(body) = &self.body {
            buf.extend_from_slice(body);
        }

        buf
    }
}

/// Builder for HTTP requests
#[derive(Debug, Default)]
pub struct HttpRequestBuilder {
    method: Option<Method>,
    uri: Option<String>,
    version: Option<Version>,
    headers: Headers,
    body: Option<Vec<u8>>,
}

impl HttpRequestBuilder {
    /// Set the HTTP method
    pub fn method(mut self, method: impl Into<Method>) -> Self {
        self.method = Some(method.into());
        self
    }

    /// Set the URI
    pub fn uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    /// Set the HTTP version
    pub fn version(mut self, version: Version) -> Self {
        self.version = Some(version);
        self
    }

    /// Add a header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Replace all headers
    pub fn headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    /// Set the body
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Build the request
    pub fn build(self) -> HttpRequest {
        HttpRequest {
            method: self.method.unwrap_or_default(),
            uri: self.uri.unwrap_or_else(|| "/".to_string()),
            version: self.version.unwrap_or_default(),
            headers: self.headers,
            body: self.body,
        }
    }
}

/// HTTP response
#[derive(Debug, Clone)]
pub struct HttpResponse {
    version: Version,
    status: Status,
    headers: Headers,
    body: Bytes,
}

impl HttpResponse {
    /// Create a builder for constructing responses
    pub fn builder() -> HttpResponseBuilder {
        HttpResponseBuilder::default()
    }

    /// Get the HTTP version
    pub fn version(&self) -> Version {
        self.version
    }

    /// Get the status
    pub fn status(&self) -> &Status {
        &self.status
    }

    /// Get the headers
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Get the body
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Split into status, headers and body
    pub fn into_parts(self) -> (Status, Headers, Bytes) {
        (self.status, self.headers, self.body)
    }
}

/// Builder for HTTP responses
#[derive(Debug, Default)]
pub struct HttpResponseBuilder {
    version: Option<Version>,
    status: Option<Status>,
    headers: Headers,
    body: Bytes,
}

impl HttpResponseBuilder {
    /// Set the HTTP version
    pub fn version(mut self, version: Version) -> Self {
        self.version = Some(version);
        self
    }

    /// Set the status
    pub fn status(mut self, status: Status) -> Self {
        self.status = Some(status);
        self
    }

    /// Add a header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Replace all headers
    pub fn headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    /// Set the body
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Build the response
    pub fn build(self) -> HttpResponse {
        HttpResponse {
            version: self.version.unwrap_or_default(),
            status: self.status.unwrap_or_else(|| Status {
                code: 200,
                reason: canonical_reason(200).to_string(),
            }),
            headers: self.headers,
            body: self.body,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_uppercased() {
        assert_eq!(Method::new("get"), Method::GET);
        assert_eq!(Method::from("Post"), Method::POST);
        assert_eq!(Method::new("propfind").as_str(), "PROPFIND");
        assert!(Method::new("put").is_submission());
        assert!(!Method::DELETE.is_submission());
    }

    #[test]
    fn test_method_from_str_rejects_empty() {
        assert_eq!("options".parse::<Method>().unwrap(), Method::OPTIONS);
        assert!("".parse::<Method>().is_err());
        assert!("GET /".parse::<Method>().is_err());
    }

    #[test]
    fn test_version_from_str() {
        assert_eq!(Version::from_str("HTTP/1.0").unwrap(), Version::Http10);
        assert_eq!(Version::from_str("HTTP/1.1").unwrap(), Version::Http11);
        assert!(Version::from_str("HTTP/2.0").is_err());
    }

    #[test]
    fn test_status_wire_form() {
        let status = Status::new(404, "Nope").unwrap();
        assert_eq!(status.code(), 404);
        assert_eq!(status.to_string(), "404 Nope");
        assert_eq!(status, "404 Nope");
        assert_ne!(status, "404 Not Found");
        assert_ne!(status, "404");
        assert!(status.is_client_error());

        assert_eq!(Status::from_code(200).unwrap(), "200 OK");
        assert!(Status::new(99, "").is_err());
    }

    #[test]
    fn test_status_forbids_body() {
        assert!(Status::from_code(204).unwrap().forbids_body());
        assert!(Status::from_code(304).unwrap().forbids_body());
        assert!(Status::from_code(100).unwrap().forbids_body());
        assert!(!Status::from_code(200).unwrap().forbids_body());
    }

    #[test]
    fn test_request_builder() {
        let req = HttpRequest::builder()
            .method("post")
            .uri("/test")
            .header("Content-Type", "text/plain")
            .body("Hello")
            .build();

        assert_eq!(req.method(), &Method::POST);
        assert_eq!(req.uri(), "/test");
        assert_eq!(req.body(), Some(&b"Hello"[..]));
        assert_eq!(req.headers().get("Content-Type"), Some("text/plain"));
    }

    #[test]
    fn test_request_normalize() {
        let mut req = HttpRequest::builder()
            .method(Method::POST)
            .uri("/form")
            .body("a=1")
            .build();
        req.normalize();

        assert_eq!(req.headers().get("Content-Length"), Some("3"));
    }

    #[test]
    fn test_request_to_wire() {
        let req = HttpRequest::builder()
            .method(Method::PUT)
            .uri("/doc")
            .header("Host", "example.com")
            .body("data")
            .build();

        let wire = String::from_utf8(req.to_wire()).unwrap();
        assert_eq!(wire, "PUT /doc HTTP/1.1\r\nHost: example.com\r\n\r\ndata");
    }

    #[test]
    fn test_response_into_parts() {
        let resp = HttpResponse::builder()
            .status(Status::new(201, "Created").unwrap())
            .header("Location", "/a")
            .body("made")
            .build();

        let (status, headers, body) = resp.into_parts();
        assert_eq!(status, "201 Created");
        assert_eq!(headers.get("location"), Some("/a"));
        assert_eq!(&body[..], b"made");
    }
}
