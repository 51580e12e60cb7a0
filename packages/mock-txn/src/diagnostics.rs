//! Diagnostic sinks for failures a scope had to swallow.
//!
//! A scope propagates exactly one error. Anything it could not fold into that
//! error is written here instead, one record per failure:
//!
//! ```text
//! Unexpected error closing connection
//! Module mock_txn::scope: failed to close connection: ConnEx
//! ```

use std::fmt;
use std::io::Write;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::error;

/// Record contexts written by the scope.
pub mod context {
    pub const CLOSE_CONNECTION: &str = "Unexpected error closing connection";
    pub const CLEANUP_TRANS: &str = "Failed to cleanup trans";
    pub const ABORT_AFTER_COMMIT: &str = "Failed to abort after commit error";
    pub const UNWIND_ENTRY: &str = "Failed to unwind scope entry";
    pub const DROPPED_WITHOUT_EXIT: &str = "Scope dropped without exit";
}

/// One swallowed failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Module path of the code that swallowed the failure.
    pub module: &'static str,
    /// What was being attempted.
    pub context: &'static str,
    /// Rendered error.
    pub error: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.context)?;
        writeln!(f, "Module {}: {}", self.module, self.error)
    }
}

/// Write-only destination for diagnostics.
pub trait DiagnosticSink {
    fn report(&self, diagnostic: &Diagnostic);
}

/// Emits each diagnostic as a `tracing` error event. The default sink.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn report(&self, diagnostic: &Diagnostic) {
        error!(
            module = diagnostic.module,
            context = diagnostic.context,
            error = %diagnostic.error,
            "scope cleanup failure"
        );
    }
}

/// Collects rendered diagnostics in memory. Clones share the buffer, so a test
/// can hand one clone to a scope and read the other afterwards.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    buffer: Arc<Mutex<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        self.buffer.lock().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.lock().is_empty()
    }
}

impl DiagnosticSink for MemorySink {
    fn report(&self, diagnostic: &Diagnostic) {
        self.buffer.lock().push_str(&diagnostic.to_string());
    }
}

/// Writes rendered diagnostics to any `io::Write`, e.g. `std::io::stderr()`.
#[derive(Debug)]
pub struct WriterSink<W> {
    writer: Mutex<W>,
}

impl<W: Write> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl<W: Write> DiagnosticSink for WriterSink<W> {
    fn report(&self, diagnostic: &Diagnostic) {
        let mut writer = self.writer.lock();
        // A sink that cannot write has nowhere left to report to.
        let _ = write!(writer, "{diagnostic}").and_then(|()| writer.flush());
    }
}

impl<S: DiagnosticSink + ?Sized> DiagnosticSink for &S {
    fn report(&self, diagnostic: &Diagnostic) {
        (**self).report(diagnostic);
    }
}

impl<S: DiagnosticSink + ?Sized> DiagnosticSink for Box<S> {
    fn report(&self, diagnostic: &Diagnostic) {
        (**self).report(diagnostic);
    }
}
