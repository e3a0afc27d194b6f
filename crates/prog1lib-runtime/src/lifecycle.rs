//! Structured lifecycle log.
//!
//! Every allocator operation, contract violation and termination appends one
//! [`LifecycleRecord`]. The most recent records stay in memory for
//! inspection; when a log path is configured each record is also written as
//! one JSONL line and flushed right away, since the process may end through
//! `std::process::exit` without running destructors.

use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::registry::RegistryStats;
use crate::site::Site;

/// Number of records retained in memory.
pub const LIFECYCLE_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

/// One structured lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleRecord {
    /// Monotonic event id, assigned on append.
    pub decision_id: u64,
    /// Correlation id, assigned on append.
    pub trace_id: String,
    pub level: LogLevel,
    /// API symbol (`allocate`, `release`, `terminate`, `contract`, ...).
    pub symbol: String,
    /// Event kind (`alloc`, `free`, `realloc`, `leak`, `exit`, ...).
    pub event: String,
    /// Machine-readable outcome label.
    pub outcome: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub ptr: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub function: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub line: Option<u32>,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub details: String,
    /// Registry snapshot: live blocks after the event.
    pub live_blocks: usize,
    /// Registry snapshot: live bytes after the event.
    pub live_bytes: usize,
}

impl LifecycleRecord {
    #[must_use]
    pub fn new(level: LogLevel, symbol: &str, event: &str, outcome: &str) -> Self {
        Self {
            decision_id: 0,
            trace_id: String::new(),
            level,
            symbol: symbol.to_string(),
            event: event.to_string(),
            outcome: outcome.to_string(),
            ptr: None,
            size: None,
            file: None,
            function: None,
            line: None,
            details: String::new(),
            live_blocks: 0,
            live_bytes: 0,
        }
    }

    #[must_use]
    pub fn with_ptr(mut self, ptr: usize) -> Self {
        self.ptr = Some(ptr);
        self
    }

    #[must_use]
    pub fn with_size(mut self, size: usize) -> Self {
        self.size = Some(size);
        self
    }

    #[must_use]
    pub fn with_site(mut self, site: Site) -> Self {
        self.file = Some(site.file.to_string());
        self.function = Some(site.function.to_string());
        self.line = Some(site.line);
        self
    }

    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = details.into();
        self
    }

    #[must_use]
    pub fn with_stats(mut self, stats: RegistryStats) -> Self {
        self.live_blocks = stats.live_blocks;
        self.live_bytes = stats.live_bytes;
        self
    }

    /// Serialize to a single JSONL line (no trailing newline).
    pub fn to_jsonl(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Bounded in-memory ring plus optional JSONL mirror.
#[derive(Debug)]
pub struct LifecycleLog {
    records: VecDeque<LifecycleRecord>,
    capacity: usize,
    next_decision_id: u64,
    mirror: Option<BufWriter<File>>,
}

impl LifecycleLog {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(capacity.min(LIFECYCLE_CAPACITY)),
            capacity: capacity.max(1),
            next_decision_id: 1,
            mirror: None,
        }
    }

    /// Append every subsequent record to `path` as JSONL.
    pub fn mirror_to(&mut self, path: &Path) -> std::io::Result<()> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        self.mirror = Some(BufWriter::new(file));
        Ok(())
    }

    /// Assign ids, retain and mirror a record. Returns the assigned decision id.
    pub fn append(&mut self, mut record: LifecycleRecord) -> u64 {
        let decision_id = self.next_decision_id;
        self.next_decision_id = self.next_decision_id.wrapping_add(1);
        record.decision_id = decision_id;
        record.trace_id = format!("prog1lib::{}::{:016x}", record.symbol, decision_id);

        if let Some(mirror) = self.mirror.as_mut() {
            let written = record
                .to_jsonl()
                .map_err(std::io::Error::other)
                .and_then(|line| writeln!(mirror, "{line}"))
                .and_then(|()| mirror.flush());
            if written.is_err() {
                // Mirror is best-effort; the ring keeps recording.
                self.mirror = None;
            }
        }

        if self.records.len() == self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(record);
        decision_id
    }

    #[must_use]
    pub fn records(&self) -> Vec<LifecycleRecord> {
        self.records.iter().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Default for LifecycleLog {
    fn default() -> Self {
        Self::new(LIFECYCLE_CAPACITY)
    }
}
