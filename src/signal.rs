//! Server error capture
//!
//! When the server under test runs in the test's own process, it can tell
//! the test that something went wrong on its side. The test's
//! [`WebCase`](crate::WebCase) resets a [`ServerErrorSignal`] before each
//! request and checks it afterwards; the server raises it through a
//! [`ServerErrorReporter`].
//!
//! The handshake is best-effort. The signal is a single flag with no
//! per-request correlation:
//! - a report that lands after the test has read the flag is missed
//! - with several requests in flight at once, a report can be attributed to
//!   the wrong request
//!
//! Servers that handle requests concurrently should set
//! [`ErrorPolicy::set_ignore_all`], or give each test its own signal with
//! [`WebCase::with_signal`](crate::WebCase::with_signal).

use std::any::{type_name, Any, TypeId};
use std::backtrace::Backtrace;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::Write as _;
use std::io::{self, Write};
use std::panic::{self, Location};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError, RwLock};

/// Flag raised when the server reports a failure
///
/// Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct ServerErrorSignal {
    raised: Arc<AtomicBool>,
}

impl ServerErrorSignal {
    /// Create a new, lowered signal
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide signal, used when no explicit one is given
    pub fn global() -> &'static ServerErrorSignal {
        static GLOBAL: OnceLock<ServerErrorSignal> = OnceLock::new();
        GLOBAL.get_or_init(ServerErrorSignal::new)
    }

    /// Lower the flag
    pub fn reset(&self) {
        self.raised.store(false, Ordering::SeqCst);
    }

    /// Raise the flag
    pub fn raise(&self) {
        self.raised.store(true, Ordering::SeqCst);
    }

    /// Check whether the flag is raised
    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::SeqCst)
    }

    /// Whether both handles refer to the same flag
    pub fn same_as(&self, other: &ServerErrorSignal) -> bool {
        Arc::ptr_eq(&self.raised, &other.raised)
    }
}

type Matcher = fn(&(dyn Error + 'static)) -> bool;

fn is_a<T: Error + 'static>(err: &(dyn Error + 'static)) -> bool {
    err.is::<T>()
}

/// Which server failures are left to the server's own error handling
///
/// Errors are matched on their concrete type at runtime, so a boxed
/// `dyn Error` is recognized the same as the bare value. An error whose
/// `source()` chain holds an ignored type is ignored too.
///
/// Meant to be configured once, at suite setup.
#[derive(Clone, Default)]
pub struct ErrorPolicy {
    ignored: HashMap<TypeId, (&'static str, Matcher)>,
    ignore_all: bool,
    ignore_panics: bool,
}

/// Policy handle shared between reporters
pub type SharedPolicy = Arc<RwLock<ErrorPolicy>>;

impl ErrorPolicy {
    /// Create a policy that ignores nothing
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide policy, used by reporters without an explicit one
    pub fn global() -> &'static SharedPolicy {
        static GLOBAL: OnceLock<SharedPolicy> = OnceLock::new();
        GLOBAL.get_or_init(SharedPolicy::default)
    }

    /// Edit the process-wide policy
    pub fn configure_global(f: impl FnOnce(&mut ErrorPolicy)) {
        let mut policy = Self::global()
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        f(&mut policy);
    }

    /// Wrap this policy for sharing
    pub fn shared(self) -> SharedPolicy {
        Arc::new(RwLock::new(self))
    }

    /// Ignore errors of type `E`
    pub fn ignore<E: Error + 'static>(&mut self) -> &mut Self {
        let matcher: Matcher = is_a::<E>;
        self.ignored
            .insert(TypeId::of::<E>(), (type_name::<E>(), matcher));
        self
    }

    /// Whether errors of type `E` are on the ignore list
    pub fn ignores<E: Error + 'static>(&self) -> bool {
        self.ignored.contains_key(&TypeId::of::<E>())
    }

    /// Whether `err` should be left to the server
    pub fn is_ignored(&self, err: &(dyn Error + 'static)) -> bool {
        if self.ignore_all {
            return true;
        }

        let mut current = Some(err);
        while let Some(e) = current {
            if self.ignored.values().any(|(_, matches)| matches(e)) {
                return true;
            }
            current = e.source();
        }
        false
    }

    /// Ignore every report (for servers handling requests concurrently)
    pub fn set_ignore_all(&mut self, ignore_all: bool) -> &mut Self {
        self.ignore_all = ignore_all;
        self
    }

    /// Whether every report is ignored
    pub fn ignore_all(&self) -> bool {
        self.ignore_all
    }

    /// Ignore panics forwarded by the panic hook
    pub fn set_ignore_panics(&mut self, ignore_panics: bool) -> &mut Self {
        self.ignore_panics = ignore_panics;
        self
    }

    /// Whether panics are ignored
    pub fn ignores_panics(&self) -> bool {
        self.ignore_all || self.ignore_panics
    }

    /// Names of the ignored error types
    pub fn ignored_types(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.ignored.values().map(|(name, _)| *name).collect();
        names.sort_unstable();
        names
    }

    /// Stop ignoring anything
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

impl std::fmt::Debug for ErrorPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorPolicy")
            .field("ignored", &self.ignored_types())
            .field("ignore_all", &self.ignore_all)
            .field("ignore_panics", &self.ignore_panics)
            .finish()
    }
}

type Sink = Arc<Mutex<Box<dyn Write + Send>>>;

fn boxed_sink(sink: impl Write + Send + 'static) -> Sink {
    let sink: Box<dyn Write + Send> = Box::new(sink);
    Arc::new(Mutex::new(sink))
}

/// Handle the server uses to report its failures
///
/// A report that the policy does not ignore raises the signal and dumps the
/// failure to the diagnostic sink (stderr unless replaced).
#[derive(Clone)]
pub struct ServerErrorReporter {
    signal: ServerErrorSignal,
    policy: SharedPolicy,
    sink: Sink,
}

impl ServerErrorReporter {
    /// Create a reporter raising `signal`, governed by the global policy
    pub fn new(signal: ServerErrorSignal) -> Self {
        ServerErrorReporter {
            signal,
            policy: ErrorPolicy::global().clone(),
            sink: boxed_sink(io::stderr()),
        }
    }

    /// The process-wide reporter: global signal, global policy, stderr
    pub fn global() -> &'static ServerErrorReporter {
        static GLOBAL: OnceLock<ServerErrorReporter> = OnceLock::new();
        GLOBAL.get_or_init(|| ServerErrorReporter::new(ServerErrorSignal::global().clone()))
    }

    /// Use `policy` instead of the global policy
    pub fn with_policy(mut self, policy: SharedPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Write failure dumps to `sink` instead of stderr
    pub fn with_sink(mut self, sink: impl Write + Send + 'static) -> Self {
        self.sink = boxed_sink(sink);
        self
    }

    /// The signal this reporter raises
    pub fn signal(&self) -> &ServerErrorSignal {
        &self.signal
    }

    /// Report a server-side error
    ///
    /// Returns `true` if the error was taken over (signal raised), `false`
    /// if the policy ignores it and the server should handle it as usual.
    /// Boxed errors are reported with `report(&*boxed)`.
    pub fn report(&self, err: &(dyn Error + 'static)) -> bool {
        let ignored = self
            .policy
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_ignored(err);
        if ignored {
            tracing::debug!(error = %err, "ignored server error");
            return false;
        }

        let mut dump = format!("{}\n  {:?}\n", err, err);
        let mut source = err.source();
        while let Some(cause) = source {
            let _ = writeln!(dump, "  caused by: {}", cause);
            source = cause.source();
        }
        self.raise("error", &err.to_string(), dump);
        true
    }

    /// Report a panic on a server thread
    ///
    /// Same contract as [`report`](Self::report); panics are governed by
    /// [`ErrorPolicy::set_ignore_panics`].
    pub fn report_panic(&self, payload: &(dyn Any + Send), location: Option<&Location<'_>>) -> bool {
        let ignored = self
            .policy
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .ignores_panics();
        let message = panic_message(payload);
        if ignored {
            tracing::debug!(panic = message, "ignored server panic");
            return false;
        }

        let thread = std::thread::current();
        let mut dump = format!(
            "panic in thread '{}': {}\n",
            thread.name().unwrap_or("<unnamed>"),
            message
        );
        if let Some(location) = location {
            let _ = writeln!(dump, "  at {}", location);
        }
        self.raise("panic", message, dump);
        true
    }

    fn raise(&self, kind: &str, message: &str, mut dump: String) {
        self.signal.raise();

        let _ = write!(dump, "backtrace:\n{}\n", Backtrace::force_capture());
        tracing::error!(kind, error = message, "server error reported");

        let mut sink = self.sink.lock().unwrap_or_else(PoisonError::into_inner);
        let written = writeln!(sink).and_then(|_| sink.write_all(dump.as_bytes()));
        if let Err(e) = written.and_then(|_| sink.flush()) {
            tracing::warn!(error = %e, "could not write server error dump");
        }
    }
}

impl std::fmt::Debug for ServerErrorReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerErrorReporter")
            .field("signal", &self.signal)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        *s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "Box<dyn Any>"
    }
}

/// Report a server-side error through the global reporter
///
/// See [`ServerErrorReporter::report`].
pub fn report_server_error(err: &(dyn Error + 'static)) -> bool {
    ServerErrorReporter::global().report(err)
}

/// Forward every panic to `reporter`, then to the previously installed hook
pub fn install_panic_hook(reporter: ServerErrorReporter) {
    let previous = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        reporter.report_panic(info.payload(), info.location());
        previous(info);
    }));
}
