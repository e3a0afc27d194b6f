//! End-to-end harness for prog1lib.
//!
//! Runs built-in scenarios through the real process-exit path and validates
//! lifecycle logs.

#![forbid(unsafe_code)]

pub mod log_check;
pub mod scenario;

pub use log_check::{LogCheckError, LogSummary, check_log_file, check_log_str};
pub use scenario::Scenario;
