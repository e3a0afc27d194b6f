//! Validation of lifecycle JSONL logs written through `PROG1LIB_LOG`.

use std::collections::BTreeMap;
use std::path::Path;

use prog1lib_core::{LifecycleRecord, LogLevel};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LogCheckError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// Counts over one log file. A file may hold several runs back to back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LogSummary {
    pub records: usize,
    /// Terminations seen (one per run).
    pub runs: usize,
    pub events: BTreeMap<String, usize>,
    pub outcomes: BTreeMap<String, usize>,
    pub leaks: usize,
    pub leaked_bytes: usize,
    pub fatal: usize,
    /// Exit status of the last run, if it terminated.
    pub last_status: Option<i32>,
}

impl LogSummary {
    fn observe(&mut self, record: &LifecycleRecord) {
        self.records += 1;
        *self.events.entry(record.event.clone()).or_default() += 1;
        *self
            .outcomes
            .entry(format!("{}:{}", record.event, record.outcome))
            .or_default() += 1;

        match (record.symbol.as_str(), record.event.as_str()) {
            ("terminate", "leak") => {
                self.leaks += 1;
                self.leaked_bytes += record.size.unwrap_or(0);
            }
            ("terminate", "exit") => {
                self.runs += 1;
                if record.level == LogLevel::Fatal {
                    self.fatal += 1;
                }
                self.last_status = record
                    .details
                    .strip_prefix("status=")
                    .and_then(|status| status.parse().ok());
            }
            _ => {}
        }
    }
}

/// Parse a JSONL log; blank lines are skipped.
pub fn check_log_str(content: &str) -> Result<LogSummary, LogCheckError> {
    let mut summary = LogSummary::default();
    for (idx, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let record: LifecycleRecord =
            serde_json::from_str(line).map_err(|source| LogCheckError::Parse {
                line: idx + 1,
                source,
            })?;
        summary.observe(&record);
    }
    Ok(summary)
}

pub fn check_log_file(path: &Path) -> Result<LogSummary, LogCheckError> {
    let content = std::fs::read_to_string(path)?;
    check_log_str(&content)
}
