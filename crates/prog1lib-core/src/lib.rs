//! # prog1lib-core
//!
//! Contract checks, bounded quantifiers, test checks and timing on top of the
//! tracked allocator of `prog1lib-runtime`.
//!
//! Everything a program needs is re-exported here, so a single dependency
//! gives the allocation macros ([`xmalloc!`], [`xcalloc!`], [`xrealloc!`]),
//! the contract macros ([`check!`], [`require!`], [`ensure!`],
//! [`require_not_null!`], [`ensure_code!`]) and [`run`].

#![deny(unsafe_code)]

pub mod contract;
pub mod quantifier;
pub mod testing;
pub mod timing;

pub use contract::{ContractKind, Detail, Nullable, Violation};
pub use quantifier::{countif, exists, forall, steps};
pub use testing::EPSILON;

pub use prog1lib_runtime::{
    AllocationRecord, BackingAllocator, BlockPtr, BudgetBacking, BufferSink, Config,
    DiagnosticSink, EXIT_FAILURE, EXIT_SUCCESS, FatalKind, LeakReport, LibcBacking,
    LifecycleRecord, LogLevel, MemoryError, RegistryStats, Runtime, Site, StderrSink,
    TerminationReason, TerminationRequest, Terminator, UnwindTerminator, ZeroSizeRealloc,
    allocate, allocate_zeroed, catch_termination, exit, expect_termination, install,
    reallocate, release, request_termination, run, runtime, set_leak_checking,
};
pub use prog1lib_runtime::{function_name, site, xcalloc, xmalloc, xrealloc};
