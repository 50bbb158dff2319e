//! webcase - black-box HTTP testing helpers
//!
//! This crate lets tests drive a live HTTP server over plain HTTP/1.1:
//! issue requests (retrying transient socket failures), capture the
//! response and assert on its status, headers and body.
//!
//! When the server under test runs in the same process (on its own thread),
//! it can report its failures through [`signal::ServerErrorReporter`]. The
//! request that was in flight then fails with [`case::Error::ServerError`]
//! instead of returning a response nobody should trust.
//!
//! ```no_run
//! use webcase::WebCase;
//!
//! let mut case = WebCase::new().with_port(8080);
//! case.get("/").unwrap();
//! case.assert_status("200 OK").unwrap();
//! case.assert_header("Content-Type", Some("text/plain")).unwrap();
//! case.assert_in_body("hello").unwrap();
//! ```

pub mod case;
pub mod http;
pub mod signal;

pub use case::WebCase;
pub use signal::{report_server_error, ErrorPolicy, ServerErrorReporter, ServerErrorSignal};
