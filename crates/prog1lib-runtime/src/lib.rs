//! # prog1lib-runtime
//!
//! Instrumented allocation and controlled termination for teaching programs.
//!
//! Every block handed out by the tracked allocator is recorded together with
//! the call site that asked for it. The process ends through one termination
//! path, which reports the blocks still live at that point. Fatal conditions
//! (allocation failure, releasing an untracked pointer, contract violations)
//! are reported on the diagnostic stream and end the process with
//! [`EXIT_FAILURE`].
//!
//! The free functions and macros of this crate operate on the process-wide
//! [`Runtime`] returned by [`runtime()`].

#![deny(unsafe_code)]

pub mod allocator;
pub mod backing;
pub mod config;
pub mod diagnostic;
pub mod error;
pub mod lifecycle;
pub mod registry;
pub mod runtime;
pub mod site;
pub mod tally;
pub mod termination;

use std::any::Any;
use std::ptr::NonNull;

pub use allocator::BlockPtr;
pub use backing::{BackingAllocator, BudgetBacking, LibcBacking};
pub use config::{Config, ZeroSizeRealloc};
pub use diagnostic::{BufferSink, DiagnosticSink, StderrSink};
pub use error::{FatalKind, MemoryError, Operation};
pub use lifecycle::{LifecycleRecord, LogLevel};
pub use registry::{AllocationRecord, RegistryStats};
pub use runtime::{Runtime, install, runtime};
pub use site::Site;
pub use termination::{
    EXIT_FAILURE, EXIT_SUCCESS, LeakReport, ProcessExit, TerminationReason, TerminationRequest,
    Terminator, UnwindTerminator, catch_termination, expect_termination,
};

/// Allocate `size` bytes on the process-wide runtime.
pub fn allocate(size: usize, site: Site) -> NonNull<u8> {
    runtime().allocate(size, site)
}

/// Allocate `count * size` zeroed bytes on the process-wide runtime.
pub fn allocate_zeroed(count: usize, size: usize, site: Site) -> NonNull<u8> {
    runtime().allocate_zeroed(count, size, site)
}

/// Resize a block tracked by the process-wide runtime.
pub fn reallocate(ptr: impl BlockPtr, new_size: usize, site: Site) -> *mut u8 {
    runtime().reallocate(ptr, new_size, site)
}

/// Release a block tracked by the process-wide runtime. Null is a no-op.
pub fn release(ptr: impl BlockPtr) {
    runtime().release(ptr);
}

/// Switch leak reporting of the process-wide runtime on or off.
pub fn set_leak_checking(enabled: bool) {
    runtime().set_leak_checking(enabled);
}

/// End the process through the termination controller.
pub fn request_termination(status: i32) -> ! {
    runtime().request_termination(TerminationRequest::normal(status))
}

/// Normal termination with `status`.
pub fn exit(status: i32) -> ! {
    runtime().exit(status)
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "Box<dyn Any>"
    }
}

/// Run the program body, then terminate with [`EXIT_SUCCESS`].
///
/// An uncaught panic in `main` is reported on the diagnostic stream and ends
/// the process through the termination controller with [`EXIT_FAILURE`].
pub fn run(main: impl FnOnce()) -> ! {
    std::panic::set_hook(Box::new(|info| {
        let message = panic_message(info.payload()).replace('\n', " ");
        let diagnostic = match info.location() {
            Some(location) => format!(
                "{}, line {}: uncaught panic: {message}",
                location.file(),
                location.line()
            ),
            None => format!("uncaught panic: {message}"),
        };
        runtime().fatal_from_panic(FatalKind::Panic, &diagnostic);
    }));
    main();
    exit(EXIT_SUCCESS)
}

/// `allocate(size)` attributed to the calling site.
#[macro_export]
macro_rules! xmalloc {
    ($size:expr) => {
        $crate::allocate($size, $crate::site!())
    };
}

/// `allocate_zeroed(count, size)` attributed to the calling site.
#[macro_export]
macro_rules! xcalloc {
    ($count:expr, $size:expr) => {
        $crate::allocate_zeroed($count, $size, $crate::site!())
    };
}

/// `reallocate(ptr, size)` attributed to the calling site.
#[macro_export]
macro_rules! xrealloc {
    ($ptr:expr, $size:expr) => {
        $crate::reallocate($ptr, $size, $crate::site!())
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_message_reads_common_payloads() {
        assert_eq!(panic_message(&"static"), "static");
        assert_eq!(panic_message(&String::from("owned")), "owned");
        assert_eq!(panic_message(&42_u8), "Box<dyn Any>");
    }
}
