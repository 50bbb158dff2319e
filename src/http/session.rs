//! Session operations abstraction
//!
//! A session is one byte transport to the server under test. The HTTP code
//! only talks to `SessionOps`, so the executor can be pointed at scripted
//! transports in tests and at real TCP sockets otherwise.
//!
//! `Connector` opens a fresh session per attempt; there is no pooling.

use super::{Error, Result};
use socket2::{Domain, Protocol, Socket, Type};
use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::os::fd::AsRawFd;
use std::time::Duration;

/// Session operations trait
///
/// This trait defines the operations that can be performed on a session.
pub trait SessionOps {
    /// Poll the session for events
    ///
    /// Returns true if the session is ready for the requested operation
    fn poll(&self, events: PollEvents, timeout: Option<Duration>) -> Result<bool>;

    /// Read data from the session
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Write data to the session
    fn write(&mut self, buf: &[u8]) -> Result<usize>;

    /// Close the session
    fn close(&mut self) -> Result<()>;
}

/// Poll events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollEvents {
    Read,
    Write,
}

/// HTTP session wrapping a transport with session operations
pub struct HttpSession<S: SessionOps> {
    session: S,
    timeout: Option<Duration>,
}

impl<S: SessionOps> HttpSession<S> {
    /// Create a new HTTP session
    pub fn new(session: S) -> Self {
        HttpSession {
            session,
            timeout: TransportConfig::DEFAULT_IO_TIMEOUT,
        }
    }

    /// Set the timeout for operations
    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
    }

    /// Get the timeout
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Read data with timeout
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if !self.session.poll(PollEvents::Read, self.timeout)? {
            return Err(Error::Timeout);
        }

        self.session.read(buf)
    }

    /// Write data with timeout
    pub fn write(&mut self, buf: &[u8]) -> Result<usize> {
        if !self.session.poll(PollEvents::Write, self.timeout)? {
            return Err(Error::Timeout);
        }

        self.session.write(buf)
    }

    /// Close the session
    pub fn close(&mut self) -> Result<()> {
        self.session.close()
    }
}

/// Plain file descriptor session operations
pub struct FdSessionOps {
    stream: TcpStream,
}

impl FdSessionOps {
    /// Create a new FD session operations from a TCP stream
    pub fn new(stream: TcpStream) -> Self {
        FdSessionOps { stream }
    }
}

impl SessionOps for FdSessionOps {
    fn poll(&self, events: PollEvents, timeout: Option<Duration>) -> Result<bool> {
        use libc::{poll, pollfd, POLLIN, POLLOUT};

        let mut pfd = pollfd {
            fd: self.stream.as_raw_fd(),
            events: match events {
                PollEvents::Read => POLLIN,
                PollEvents::Write => POLLOUT,
            },
            revents: 0,
        };

        let timeout_ms = timeout
            .map(|d| d.as_millis().min(i32::MAX as u128) as i32)
            .unwrap_or(-1); // -1 = infinite

        let result = unsafe { poll(&mut pfd as *mut pollfd, 1, timeout_ms) };

        if result < 0 {
            return Err(Error::Io(io::Error::last_os_error()));
        }

        Ok(result > 0)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.stream.read(buf).map_err(Error::from)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.stream.write(buf).map_err(Error::from)
    }

    fn close(&mut self) -> Result<()> {
        match self.stream.shutdown(Shutdown::Both) {
            // The peer may already have torn the connection down
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            other => other.map_err(Error::from),
        }
    }
}

/// Transport settings for connections to the server under test
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    /// Bound on establishing the TCP connection (`None` = OS default)
    pub connect_timeout: Option<Duration>,
    /// Bound on each wait for readiness while sending or receiving
    /// (`None` = wait as long as the server takes)
    ///
    /// A timeout counts as a transient failure, so a request that runs
    /// into it is sent again under the retry policy.
    pub io_timeout: Option<Duration>,
    /// Disable Nagle's algorithm
    pub nodelay: bool,
}

impl TransportConfig {
    /// No I/O timeout unless one is asked for
    pub const DEFAULT_IO_TIMEOUT: Option<Duration> = None;

    /// Set the connect timeout
    pub fn connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the I/O timeout (see [`io_timeout`](Self::io_timeout))
    pub fn io_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.io_timeout = timeout;
        self
    }

    /// Enable or disable TCP_NODELAY
    pub fn nodelay(mut self, nodelay: bool) -> Self {
        self.nodelay = nodelay;
        self
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig {
            connect_timeout: None,
            io_timeout: Self::DEFAULT_IO_TIMEOUT,
            nodelay: true,
        }
    }
}

/// Opens sessions to the server under test
pub trait Connector {
    type Session: SessionOps;

    /// Open a new session to `host:port`
    fn connect(&self, host: &str, port: u16) -> Result<Self::Session>;

    /// I/O timeout to apply to sessions opened by this connector
    fn io_timeout(&self) -> Option<Duration> {
        TransportConfig::DEFAULT_IO_TIMEOUT
    }
}

/// Plain TCP connector
#[derive(Debug, Clone, Default)]
pub struct TcpConnector {
    config: TransportConfig,
}

impl TcpConnector {
    /// Create a connector with the given transport settings
    pub fn new(config: TransportConfig) -> Self {
        TcpConnector { config }
    }

    fn connect_addr(&self, addr: &SocketAddr) -> io::Result<TcpStream> {
        let socket = Socket::new(Domain::for_address(*addr), Type::STREAM, Some(Protocol::TCP))?;
        socket.set_nodelay(self.config.nodelay)?;

        match self.config.connect_timeout {
            Some(timeout) => socket.connect_timeout(&(*addr).into(), timeout)?,
            None => socket.connect(&(*addr).into())?,
        }

        Ok(socket.into())
    }
}

impl Connector for TcpConnector {
    type Session = FdSessionOps;

    fn connect(&self, host: &str, port: u16) -> Result<FdSessionOps> {
        let mut last_error = None;

        // Try every resolved address, like a stock HTTP client would
        for addr in (host, port).to_socket_addrs()? {
            match self.connect_addr(&addr) {
                Ok(stream) => {
                    tracing::trace!(%addr, "connected");
                    return Ok(FdSessionOps::new(stream));
                }
                Err(e) => last_error = Some(e),
            }
        }

        Err(Error::Io(last_error.unwrap_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no addresses for {}:{}", host, port),
            )
        })))
    }

    fn io_timeout(&self) -> Option<Duration> {
        self.config.io_timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn test_tcp_connector() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            stream.write_all(b"Hello").unwrap();
        });

        let connector = TcpConnector::default();
        let mut session = connector.connect("127.0.0.1", port).unwrap();

        assert!(session
            .poll(PollEvents::Read, Some(Duration::from_secs(1)))
            .unwrap());

        let mut buf = [0u8; 5];
        let n = session.read(&mut buf).unwrap();
        assert_eq!(n, 5);
        assert_eq!(&buf, b"Hello");

        handle.join().unwrap();
        session.close().unwrap();
    }

    #[test]
    fn test_connect_refused_is_transient() {
        // Bind then drop to get a port nobody listens on
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let connector = TcpConnector::new(
            TransportConfig::default().connect_timeout(Some(Duration::from_secs(1))),
        );
        let err = connector.connect("127.0.0.1", port).err().unwrap();
        assert!(err.is_transient(), "unexpected error: {}", err);
    }

    #[test]
    fn test_http_session_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let _handle = thread::spawn(move || {
            let (_stream, _) = listener.accept().unwrap();
            thread::sleep(Duration::from_secs(2));
        });

        let stream = TcpStream::connect(addr).unwrap();
        let mut session = HttpSession::new(FdSessionOps::new(stream));
        session.set_timeout(Some(Duration::from_millis(100)));

        let mut buf = [0u8; 10];
        let result = session.read(&mut buf);
        assert!(matches!(result, Err(Error::Timeout)));
    }

    #[test]
    fn test_transport_config_builder() {
        let config = TransportConfig::default()
            .io_timeout(Some(Duration::from_secs(3)))
            .nodelay(false);

        assert_eq!(config.io_timeout, Some(Duration::from_secs(3)));
        assert!(!config.nodelay);
        assert_eq!(config.connect_timeout, None);
    }

    #[test]
    fn test_no_io_timeout_by_default() {
        assert_eq!(TransportConfig::default().io_timeout, None);
        assert_eq!(TcpConnector::default().io_timeout(), None);

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let stream = TcpStream::connect(addr).unwrap();
        assert_eq!(HttpSession::new(FdSessionOps::new(stream)).timeout(), None);
    }
}
