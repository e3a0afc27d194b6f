//! Termination controller.
//!
//! [`Runtime::request_termination`] is the single path by which the process
//! ends, whether normally or because of a fatal condition. It emits the test
//! tally, then the leak report (when leak checking is on), and only then hands
//! the request to the [`Terminator`], which never returns.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::FatalKind;
use crate::lifecycle::{LifecycleRecord, LogLevel};
use crate::registry::AllocationRecord;
use crate::runtime::Runtime;

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    Normal,
    Fatal(FatalKind),
}

/// Intended exit status and why the process is ending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminationRequest {
    pub status: i32,
    pub reason: TerminationReason,
}

impl TerminationRequest {
    #[must_use]
    pub const fn normal(status: i32) -> Self {
        Self {
            status,
            reason: TerminationReason::Normal,
        }
    }

    #[must_use]
    pub const fn fatal(kind: FatalKind) -> Self {
        Self {
            status: EXIT_FAILURE,
            reason: TerminationReason::Fatal(kind),
        }
    }

    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self.reason, TerminationReason::Fatal(_))
    }
}

/// Performs the real termination.
pub trait Terminator: Send + Sync {
    fn terminate(&self, request: TerminationRequest) -> !;
}

/// Ends the process with `std::process::exit`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessExit;

impl Terminator for ProcessExit {
    fn terminate(&self, request: TerminationRequest) -> ! {
        std::process::exit(request.status)
    }
}

/// Unwinds with the request as payload instead of exiting, so termination
/// can be observed in-process with [`catch_termination`].
///
/// Unwinding goes through `resume_unwind`, which skips the panic hook.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnwindTerminator;

impl Terminator for UnwindTerminator {
    fn terminate(&self, request: TerminationRequest) -> ! {
        panic::resume_unwind(Box::new(request))
    }
}

/// Run `f`, returning the termination request if it ended through an
/// [`UnwindTerminator`]. Other panics keep unwinding.
pub fn catch_termination<R>(f: impl FnOnce() -> R) -> Result<R, TerminationRequest> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => Ok(value),
        Err(payload) => match payload.downcast::<TerminationRequest>() {
            Ok(request) => Err(*request),
            Err(other) => panic::resume_unwind(other),
        },
    }
}

/// Run `f` and return the termination request it ended with.
///
/// Panics if `f` returns normally.
#[track_caller]
pub fn expect_termination(f: impl FnOnce()) -> TerminationRequest {
    match catch_termination(f) {
        Ok(()) => panic!("expected termination, but the closure returned"),
        Err(request) => request,
    }
}

/// Blocks still live at the time of the report, in allocation order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeakReport {
    leaks: Vec<AllocationRecord>,
}

impl LeakReport {
    #[must_use]
    pub fn leaks(&self) -> &[AllocationRecord] {
        &self.leaks
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.leaks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.leaks.is_empty()
    }

    #[must_use]
    pub fn total_bytes(&self) -> usize {
        self.leaks.iter().map(|leak| leak.size).sum()
    }

    /// One line per leaked block.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.leaks
            .iter()
            .map(|leak| {
                format!(
                    "{}: {} leaked {} bytes at {:#x}",
                    leak.site.location(),
                    leak.site.function,
                    leak.size,
                    leak.address
                )
            })
            .collect()
    }

    /// Summary line, or `None` when nothing leaked.
    #[must_use]
    pub fn summary(&self) -> Option<String> {
        match self.leaks.len() {
            0 => None,
            1 => Some(format!(
                "1 memory leak, {} bytes in total",
                self.total_bytes()
            )),
            n => Some(format!(
                "{n} memory leaks, {} bytes in total",
                self.total_bytes()
            )),
        }
    }
}

/// Clears the shutdown marker if termination unwinds instead of exiting.
struct ShutdownMarker<'a>(&'a AtomicBool);

impl Drop for ShutdownMarker<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Runtime {
    /// Switch leak reporting on or off. Read once, at termination.
    pub fn set_leak_checking(&self, enabled: bool) {
        self.leak_checking.store(enabled, Ordering::Release);
    }

    #[must_use]
    pub fn leak_checking(&self) -> bool {
        self.leak_checking.load(Ordering::Acquire)
    }

    /// Current leak list without terminating.
    #[must_use]
    pub fn leak_report(&self) -> LeakReport {
        let registry = self.registry.lock();
        LeakReport {
            leaks: registry.snapshot().in_allocation_order(),
        }
    }

    /// End the process: tally, leak report, then the real termination.
    ///
    /// A request raised while a termination is already in progress skips the
    /// reports and terminates at once.
    pub fn request_termination(&self, request: TerminationRequest) -> ! {
        if self.terminating.swap(true, Ordering::AcqRel) {
            self.terminator.terminate(request);
        }
        let _marker = ShutdownMarker(&self.terminating);
        let mut request = request;

        if let Some(summary) = self.tally.summary() {
            self.sink.emit(&summary);
        }

        if self.leak_checking() {
            let report = self.leak_report();
            for (leak, line) in report.leaks().iter().zip(report.lines()) {
                self.sink.emit(&line);
                self.log(
                    LifecycleRecord::new(LogLevel::Warn, "terminate", "leak", "leaked")
                        .with_ptr(leak.address)
                        .with_size(leak.size)
                        .with_site(leak.site),
                );
            }
            if let Some(summary) = report.summary() {
                self.sink.emit(&summary);
                if self.config.leaks_fail && request.status == EXIT_SUCCESS {
                    request.status = EXIT_FAILURE;
                }
            }
        }

        let (level, outcome) = match request.reason {
            TerminationReason::Normal => (LogLevel::Info, "normal"),
            TerminationReason::Fatal(kind) => (LogLevel::Fatal, kind.label()),
        };
        self.log(
            LifecycleRecord::new(level, "terminate", "exit", outcome)
                .with_details(format!("status={}", request.status))
                .with_stats(self.stats()),
        );
        self.terminator.terminate(request)
    }

    /// Normal termination with `status`.
    pub fn exit(&self, status: i32) -> ! {
        self.request_termination(TerminationRequest::normal(status))
    }

    /// Emit `diagnostic` and terminate with the failure status.
    #[cold]
    pub fn fatal(&self, kind: FatalKind, diagnostic: &str) -> ! {
        self.sink.emit(diagnostic);
        self.log(
            LifecycleRecord::new(LogLevel::Error, "fatal", kind.label(), "terminating")
                .with_details(diagnostic)
                .with_stats(self.stats()),
        );
        self.request_termination(TerminationRequest::fatal(kind))
    }

    /// [`fatal`](Self::fatal) for the panic hook. A panic raised while the
    /// registry lock is held ends the process without the stats and the leak
    /// report, which both need that lock.
    pub(crate) fn fatal_from_panic(&self, kind: FatalKind, diagnostic: &str) -> ! {
        if self.registry.try_lock().is_some() {
            self.fatal(kind, diagnostic);
        }
        self.sink.emit(diagnostic);
        self.terminator.terminate(TerminationRequest::fatal(kind))
    }
}
