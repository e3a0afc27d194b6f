//! Test-check tally reported at termination.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct TestTally {
    checks: AtomicU64,
    successes: AtomicU64,
}

impl TestTally {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            checks: AtomicU64::new(0),
            successes: AtomicU64::new(0),
        }
    }

    /// Count one check and return `passed` unchanged.
    pub fn record(&self, passed: bool) -> bool {
        self.checks.fetch_add(1, Ordering::Relaxed);
        if passed {
            self.successes.fetch_add(1, Ordering::Relaxed);
        }
        passed
    }

    #[must_use]
    pub fn checks(&self) -> u64 {
        self.checks.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn successes(&self) -> u64 {
        self.successes.load(Ordering::Relaxed)
    }

    /// Summary line, or `None` if no check ran.
    #[must_use]
    pub fn summary(&self) -> Option<String> {
        let checks = self.checks();
        if checks == 0 {
            return None;
        }
        let failed = checks - self.successes().min(checks);
        if failed == 0 {
            Some(format!("All {checks} tests passed!"))
        } else {
            Some(format!("{failed} of {checks} tests failed."))
        }
    }
}
