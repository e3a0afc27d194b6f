//! Diagnostic stream.
//!
//! Fatal diagnostics, leak reports and test tallies go to a
//! [`DiagnosticSink`], one line per call. The process default is standard
//! error; tests install a [`BufferSink`] and read the lines back.

use std::io::Write;
use std::sync::Arc;

use parking_lot::Mutex;

pub trait DiagnosticSink: Send + Sync {
    /// Emit one line (without trailing newline).
    fn emit(&self, line: &str);
}

/// Writes each line to standard error.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrSink;

impl DiagnosticSink for StderrSink {
    fn emit(&self, line: &str) {
        let mut stderr = std::io::stderr().lock();
        let _ = writeln!(stderr, "{line}");
        let _ = stderr.flush();
    }
}

/// Collects lines in memory; clones share the same buffer.
#[derive(Debug, Default, Clone)]
pub struct BufferSink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl BufferSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    #[must_use]
    pub fn contains(&self, line: &str) -> bool {
        self.lines.lock().iter().any(|l| l == line)
    }

    pub fn clear(&self) {
        self.lines.lock().clear();
    }
}

impl DiagnosticSink for BufferSink {
    fn emit(&self, line: &str) {
        self.lines.lock().push(line.to_string());
    }
}
