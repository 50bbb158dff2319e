//! Assertion context for one test case
//!
//! A `WebCase` knows where the server under test lives, performs requests
//! against it and keeps the last response so assertions can be made on it.
//! Create one per test.

use crate::http::{
    self, Connector, Headers, HttpRequest, HttpResponse, Method, RequestExecutor, RetryPolicy,
    Status, TcpConnector, TransportConfig, DEFAULT_HOST, DEFAULT_PORT,
};
use crate::signal::{ServerErrorReporter, ServerErrorSignal};
use bytes::Bytes;

/// Result type for test case operations
pub type Result<T> = std::result::Result<T, Error>;

/// Test case errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The request could not be completed (after retries, if transient)
    #[error(transparent)]
    Transport(#[from] http::Error),

    /// The server reported a failure while the request was in flight; the
    /// response is not worth asserting on
    #[error("server error reported while handling the request")]
    ServerError,

    /// An assertion did not hold
    #[error("{0}")]
    Assertion(String),
}

impl Error {
    /// Check if this is an assertion failure
    pub fn is_assertion(&self) -> bool {
        matches!(self, Error::Assertion(_))
    }

    /// Check if this is a reported server error
    pub fn is_server_error(&self) -> bool {
        matches!(self, Error::ServerError)
    }
}

/// HTTP test case
///
/// Holds the host and port of the server under test (default
/// `127.0.0.1:8000`) and the last response received.
pub struct WebCase<C: Connector = TcpConnector> {
    host: String,
    port: u16,
    executor: RequestExecutor<C>,
    signal: ServerErrorSignal,
    response: Option<HttpResponse>,
}

impl WebCase<TcpConnector> {
    /// Create a test case against the default host and port
    pub fn new() -> Self {
        WebCase {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            executor: RequestExecutor::new(),
            signal: ServerErrorSignal::global().clone(),
            response: None,
        }
    }

    /// Use the given transport settings
    pub fn with_transport_config(mut self, config: TransportConfig) -> Self {
        let retry = self.executor.retry();
        self.executor = RequestExecutor::with_transport(config).retry_policy(retry);
        self
    }
}

impl Default for WebCase<TcpConnector> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Connector> WebCase<C> {
    /// Set the host of the server under test
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the port of the server under test
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Use `signal` instead of the process-wide one
    pub fn with_signal(mut self, signal: ServerErrorSignal) -> Self {
        self.signal = signal;
        self
    }

    /// Set how transient failures are retried
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.executor = self.executor.retry_policy(retry);
        self
    }

    /// Perform requests through `executor`
    pub fn with_executor<D: Connector>(self, executor: RequestExecutor<D>) -> WebCase<D> {
        WebCase {
            host: self.host,
            port: self.port,
            executor,
            signal: self.signal,
            response: self.response,
        }
    }

    /// Get the host
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Get the port
    pub fn port(&self) -> u16 {
        self.port
    }

    /// The signal checked after every request
    pub fn signal(&self) -> &ServerErrorSignal {
        &self.signal
    }

    /// A reporter for the server under test, raising this case's signal
    pub fn reporter(&self) -> ServerErrorReporter {
        ServerErrorReporter::new(self.signal.clone())
    }

    /// Request a page and capture the response
    ///
    /// The signal is lowered first. If the server raised it by the time the
    /// response is in, the response is still captured but
    /// [`Error::ServerError`] is returned.
    pub fn get_page(
        &mut self,
        url: &str,
        headers: Option<Headers>,
        method: impl Into<Method>,
        body: Option<&[u8]>,
    ) -> Result<HttpResponse> {
        let mut request = HttpRequest::new(method.into(), url);
        *request.headers_mut() = headers.unwrap_or_default();
        request.set_body(body.map(<[u8]>::to_vec));

        self.signal.reset();

        let response = self.executor.execute(&self.host, self.port, request)?;
        self.capture(response.clone());

        if self.signal.is_raised() {
            tracing::warn!(url, "server reported an error during the request");
            return Err(Error::ServerError);
        }

        Ok(response)
    }

    /// GET `url`
    pub fn get(&mut self, url: &str) -> Result<HttpResponse> {
        self.get_page(url, None, Method::GET, None)
    }

    /// POST `body` to `url` as a form submission
    pub fn post(&mut self, url: &str, body: impl AsRef<[u8]>) -> Result<HttpResponse> {
        self.get_page(url, None, Method::POST, Some(body.as_ref()))
    }

    fn capture(&mut self, response: HttpResponse) {
        self.response = Some(response);
    }

    /// Status of the last response
    pub fn status(&self) -> Option<&Status> {
        self.response.as_ref().map(HttpResponse::status)
    }

    /// Headers of the last response (empty before the first request)
    pub fn headers(&self) -> &Headers {
        static EMPTY: Headers = Headers::new();
        self.response.as_ref().map_or(&EMPTY, HttpResponse::headers)
    }

    /// Body of the last response (empty before the first request)
    pub fn body(&self) -> &[u8] {
        self.response.as_ref().map_or(&[][..], HttpResponse::body)
    }

    /// Fail unless the last status is exactly `expected`, e.g. `"200 OK"`
    pub fn assert_status(&self, expected: &str) -> Result<()> {
        self.check_status(expected, None)
    }

    /// Like [`assert_status`](Self::assert_status) with a custom message
    pub fn assert_status_msg(&self, expected: &str, msg: impl Into<String>) -> Result<()> {
        self.check_status(expected, Some(msg.into()))
    }

    fn check_status(&self, expected: &str, msg: Option<String>) -> Result<()> {
        if self.status().is_some_and(|status| status == expected) {
            return Ok(());
        }

        let actual = match self.status() {
            Some(status) => format!("{:?}", status.to_string()),
            None => "None".to_string(),
        };
        fail(msg, || format!("Status ({}) != {:?}", actual, expected))
    }

    /// Fail unless a header `name` (any case) is present, with exactly
    /// `value` if one is given
    pub fn assert_header(&self, name: &str, value: Option<&str>) -> Result<()> {
        self.check_header(name, value, None)
    }

    /// Like [`assert_header`](Self::assert_header) with a custom message
    pub fn assert_header_msg(
        &self,
        name: &str,
        value: Option<&str>,
        msg: impl Into<String>,
    ) -> Result<()> {
        self.check_header(name, value, Some(msg.into()))
    }

    fn check_header(&self, name: &str, value: Option<&str>, msg: Option<String>) -> Result<()> {
        match value {
            None if self.headers().contains(name) => Ok(()),
            None => fail(msg, || format!("{:?} not in headers", name)),
            Some(value) if self.headers().contains_value(name, value) => Ok(()),
            Some(value) => fail(msg, || format!("{:?}:{:?} not in headers", name, value)),
        }
    }

    /// Fail unless the body is exactly `expected`
    pub fn assert_body(&self, expected: impl AsRef<[u8]>) -> Result<()> {
        self.check_body(expected.as_ref(), None)
    }

    /// Like [`assert_body`](Self::assert_body) with a custom message
    pub fn assert_body_msg(&self, expected: impl AsRef<[u8]>, msg: impl Into<String>) -> Result<()> {
        self.check_body(expected.as_ref(), Some(msg.into()))
    }

    fn check_body(&self, expected: &[u8], msg: Option<String>) -> Result<()> {
        if self.body() == expected {
            return Ok(());
        }
        fail(msg, || {
            format!(
                "expected body:\n{}\n\nactual body:\n{}",
                show(expected),
                show(self.body())
            )
        })
    }

    /// Fail unless `fragment` occurs in the body
    pub fn assert_in_body(&self, fragment: impl AsRef<[u8]>) -> Result<()> {
        self.check_in_body(fragment.as_ref(), None)
    }

    /// Like [`assert_in_body`](Self::assert_in_body) with a custom message
    pub fn assert_in_body_msg(&self, fragment: impl AsRef<[u8]>, msg: impl Into<String>) -> Result<()> {
        self.check_in_body(fragment.as_ref(), Some(msg.into()))
    }

    fn check_in_body(&self, fragment: &[u8], msg: Option<String>) -> Result<()> {
        if contains(self.body(), fragment) {
            return Ok(());
        }
        fail(msg, || format!("{} not in body", show(fragment)))
    }

    /// Fail if `fragment` occurs in the body
    pub fn assert_not_in_body(&self, fragment: impl AsRef<[u8]>) -> Result<()> {
        self.check_not_in_body(fragment.as_ref(), None)
    }

    /// Like [`assert_not_in_body`](Self::assert_not_in_body) with a custom
    /// message
    pub fn assert_not_in_body_msg(
        &self,
        fragment: impl AsRef<[u8]>,
        msg: impl Into<String>,
    ) -> Result<()> {
        self.check_not_in_body(fragment.as_ref(), Some(msg.into()))
    }

    fn check_not_in_body(&self, fragment: &[u8], msg: Option<String>) -> Result<()> {
        if !contains(self.body(), fragment) {
            return Ok(());
        }
        fail(msg, || format!("{} found in body", show(fragment)))
    }
}

fn fail(msg: Option<String>, default: impl FnOnce() -> String) -> Result<()> {
    Err(Error::Assertion(msg.unwrap_or_else(default)))
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    needle.is_empty() || haystack.windows(needle.len()).any(|w| w == needle)
}

/// Quote bytes for a failure message
fn show(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => format!("{:?}", text),
        Err(_) => format!("{:?}", Bytes::copy_from_slice(bytes)),
    }
}
