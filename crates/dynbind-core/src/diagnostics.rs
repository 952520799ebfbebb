//! Non-fatal diagnostics channel.
//!
//! Conditions that must be visible to the caller but must not abort loading
//! (a candidate the OS loader rejected, a symbol replaced by a stand-in) are
//! reported as [`Diagnostic`] records through an injectable
//! [`DiagnosticSink`]. Records serialize to the same JSONL shape as the rest
//! of the structured logs: one object per line, optional fields omitted.
//!
//! Provides:
//! - [`CollectingSink`]: keeps records in memory, for tests and reports.
//! - [`JsonlSink`]: writes JSONL to any `Write`.
//! - [`StderrSink`]: human-readable `warning: ...` lines (the default).
//! - [`NullSink`]: drops everything.
//! - [`Diagnostics`]: a sink plus the [`Verbosity`] gate in front of it.

use std::fmt;
use std::io::Write;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::config::Verbosity;

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticLevel {
    Debug,
    Info,
    Warn,
}

impl fmt::Display for DiagnosticLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warning",
        })
    }
}

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// The OS loader refused a candidate; the next one is tried.
    CandidateRejected,
    /// A symbol is absent and a stand-in was bound instead.
    SymbolReplaced,
    /// A symbol is absent and no stand-in was supplied.
    SymbolMissing,
    /// A bind was attempted (success or not).
    BindAttempted,
    /// A stand-in was called in place of a missing symbol.
    StandInInvoked,
    /// A directory was prepended to the process library search path.
    SearchPathExtended,
}

impl DiagnosticKind {
    #[must_use]
    pub const fn level(self) -> DiagnosticLevel {
        match self {
            Self::CandidateRejected
            | Self::SymbolReplaced
            | Self::SymbolMissing
            | Self::StandInInvoked => DiagnosticLevel::Warn,
            Self::SearchPathExtended => DiagnosticLevel::Info,
            Self::BindAttempted => DiagnosticLevel::Debug,
        }
    }

    /// Lowest verbosity at which this kind is forwarded.
    #[must_use]
    pub const fn min_verbosity(self) -> Verbosity {
        match self.level() {
            DiagnosticLevel::Warn | DiagnosticLevel::Info => Verbosity::Normal,
            DiagnosticLevel::Debug => Verbosity::Verbose,
        }
    }
}

/// One diagnostic record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub level: DiagnosticLevel,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub library: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl Diagnostic {
    #[must_use]
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            level: kind.level(),
            message: message.into(),
            library: None,
            symbol: None,
            path: None,
        }
    }

    #[must_use]
    pub fn with_library(mut self, library: impl Into<String>) -> Self {
        self.library = Some(library.into());
        self
    }

    #[must_use]
    pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = Some(symbol.into());
        self
    }

    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Serialize to a single JSONL line (no trailing newline).
    pub fn to_jsonl(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// ---------------------------------------------------------------------------
// Sinks
// ---------------------------------------------------------------------------

/// Receiver of diagnostic records. Emitting never fails.
pub trait DiagnosticSink: Send + Sync {
    fn emit(&self, diagnostic: &Diagnostic);
}

/// Drops every record.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl DiagnosticSink for NullSink {
    fn emit(&self, _diagnostic: &Diagnostic) {}
}

/// Prints `warning: <message>` lines to stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrSink;

impl DiagnosticSink for StderrSink {
    fn emit(&self, diagnostic: &Diagnostic) {
        eprintln!("{}: {}", diagnostic.level, diagnostic.message);
    }
}

/// Keeps every record in memory.
#[derive(Debug, Default)]
pub struct CollectingSink {
    records: Mutex<Vec<Diagnostic>>,
}

impl CollectingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything emitted so far, oldest first.
    #[must_use]
    pub fn records(&self) -> Vec<Diagnostic> {
        self.records.lock().clone()
    }

    #[must_use]
    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.records.lock().iter().filter(|d| d.kind == kind).count()
    }

    #[must_use]
    pub fn of_kind(&self, kind: DiagnosticKind) -> Vec<Diagnostic> {
        self.records
            .lock()
            .iter()
            .filter(|d| d.kind == kind)
            .cloned()
            .collect()
    }

    /// Drain all records.
    pub fn take(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.records.lock())
    }
}

impl DiagnosticSink for CollectingSink {
    fn emit(&self, diagnostic: &Diagnostic) {
        self.records.lock().push(diagnostic.clone());
    }
}

/// Writes JSONL records to a writer (file, stderr, in-memory buffer).
///
/// Write failures are swallowed: a broken diagnostics stream must not turn a
/// successful load into a failed one.
pub struct JsonlSink<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonlSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Recover the writer (e.g. to inspect an in-memory buffer).
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl<W: Write + Send> DiagnosticSink for JsonlSink<W> {
    fn emit(&self, diagnostic: &Diagnostic) {
        let Ok(line) = diagnostic.to_jsonl() else {
            return;
        };
        let mut writer = self.writer.lock();
        let _ = writeln!(writer, "{line}");
        let _ = writer.flush();
    }
}

impl<W: Write + Send> fmt::Debug for JsonlSink<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonlSink").finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Gate
// ---------------------------------------------------------------------------

/// A sink behind a verbosity gate. Cheap to clone; clones share the sink.
#[derive(Clone)]
pub struct Diagnostics {
    sink: Arc<dyn DiagnosticSink>,
    verbosity: Verbosity,
}

impl Diagnostics {
    #[must_use]
    pub fn new(sink: Arc<dyn DiagnosticSink>, verbosity: Verbosity) -> Self {
        Self { sink, verbosity }
    }

    /// Everything dropped.
    #[must_use]
    pub fn silent() -> Self {
        Self::new(Arc::new(NullSink), Verbosity::Quiet)
    }

    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        self.verbosity
    }

    #[must_use]
    pub fn enabled(&self, kind: DiagnosticKind) -> bool {
        self.verbosity != Verbosity::Quiet && self.verbosity >= kind.min_verbosity()
    }

    pub fn emit(&self, diagnostic: Diagnostic) {
        if self.enabled(diagnostic.kind) {
            self.sink.emit(&diagnostic);
        }
    }
}

impl fmt::Debug for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Diagnostics")
            .field("verbosity", &self.verbosity)
            .finish_non_exhaustive()
    }
}
