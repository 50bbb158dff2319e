//! Request execution with retry
//!
//! `RequestExecutor` performs one complete exchange with the server under
//! test: normalize the request, open a fresh connection, send, read the
//! whole response, close. Socket-level failures are retried on a fixed
//! delay; everything else is returned at once.

use super::{
    Connector, Headers, HttpClient, HttpRequest, HttpResponse, Method, Result, TcpConnector,
    TransportConfig,
};
use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// How transient failures are retried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first
    pub attempts: u32,
    /// Fixed pause between two attempts
    pub delay: Duration,
}

impl RetryPolicy {
    /// A policy that tries exactly once
    pub const fn none() -> Self {
        RetryPolicy {
            attempts: 1,
            delay: Duration::ZERO,
        }
    }

    /// Set the number of attempts
    pub fn attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    /// Set the delay between attempts
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            attempts: 10,
            delay: Duration::from_millis(500),
        }
    }
}

type SleepFn = Arc<dyn Fn(Duration) + Send + Sync>;

/// Executes requests against a server, one connection per attempt
#[derive(Clone)]
pub struct RequestExecutor<C: Connector = TcpConnector> {
    connector: C,
    retry: RetryPolicy,
    sleep: SleepFn,
}

impl RequestExecutor<TcpConnector> {
    /// Create an executor using plain TCP with default settings
    pub fn new() -> Self {
        Self::with_connector(TcpConnector::default())
    }

    /// Create an executor using plain TCP with the given settings
    pub fn with_transport(config: TransportConfig) -> Self {
        Self::with_connector(TcpConnector::new(config))
    }
}

impl Default for RequestExecutor<TcpConnector> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Connector> RequestExecutor<C> {
    /// Create an executor opening sessions through `connector`
    pub fn with_connector(connector: C) -> Self {
        RequestExecutor {
            connector,
            retry: RetryPolicy::default(),
            sleep: Arc::new(thread::sleep),
        }
    }

    /// Set the retry policy
    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Replace the function used to wait between attempts
    pub fn sleep_with(mut self, sleep: impl Fn(Duration) + Send + Sync + 'static) -> Self {
        self.sleep = Arc::new(sleep);
        self
    }

    /// Get the retry policy
    pub fn retry(&self) -> RetryPolicy {
        self.retry
    }

    /// Perform `request` against `host:port`
    ///
    /// The request is normalized first. Transient errors are retried up to
    /// the policy's attempt count; the last one is returned unchanged.
    pub fn execute(&self, host: &str, port: u16, mut request: HttpRequest) -> Result<HttpResponse> {
        request.method().validate()?;
        request.normalize();
        add_transport_headers(request.headers_mut(), host, port);

        let attempts = self.retry.attempts.max(1);
        let mut attempt = 1;

        loop {
            tracing::debug!(
                method = %request.method(),
                uri = request.uri(),
                host,
                port,
                attempt,
                "sending request"
            );

            match self.attempt(host, port, &request) {
                Ok(response) => {
                    tracing::debug!(status = %response.status(), "received response");
                    return Ok(response);
                }
                Err(e) if e.is_transient() && attempt < attempts => {
                    tracing::warn!(error = %e, attempt, attempts, "transient failure, retrying");
                    (self.sleep)(self.retry.delay);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn attempt(&self, host: &str, port: u16, request: &HttpRequest) -> Result<HttpResponse> {
        let session = self.connector.connect(host, port)?;
        let mut client = HttpClient::new(session);
        client.set_timeout(self.connector.io_timeout());

        // On error the session is dropped, which releases the socket
        let response = client.exchange(request)?;

        if let Err(e) = client.close() {
            tracing::debug!(error = %e, "error closing connection");
        }

        Ok(response)
    }
}

impl<C: Connector + fmt::Debug> fmt::Debug for RequestExecutor<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestExecutor")
            .field("connector", &self.connector)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

/// Add the headers any HTTP/1.1 client sends unless told otherwise
fn add_transport_headers(headers: &mut Headers, host: &str, port: u16) {
    if !headers.contains("Host") {
        let host = if host.contains(':') {
            format!("[{}]", host)
        } else {
            host.to_string()
        };
        let value = if port == 80 {
            host
        } else {
            format!("{}:{}", host, port)
        };
        headers.insert("Host", value);
    }

    if !headers.contains("Accept-Encoding") {
        headers.insert("Accept-Encoding", "identity");
    }
}

/// Request `url` from `host:port` with the default executor
///
/// `headers` defaults to an empty list; `body` is sent as-is when present.
pub fn open_url(
    url: &str,
    headers: Option<Headers>,
    method: impl Into<Method>,
    body: Option<&[u8]>,
    host: &str,
    port: u16,
) -> Result<HttpResponse> {
    let mut request = HttpRequest::new(method.into(), url);
    *request.headers_mut() = headers.unwrap_or_default();
    request.set_body(body.map(<[u8]>::to_vec));

    RequestExecutor::new().execute(host, port, request)
}
