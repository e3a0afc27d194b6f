//! Fatal condition taxonomy of the tracked allocator.

use std::fmt;

use thiserror::Error;

use crate::site::Site;

/// Operation that referenced an untracked pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Release,
    Reallocate(Site),
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Release => f.write_str("release"),
            Self::Reallocate(site) => write!(f, "{site}: reallocate"),
        }
    }
}

/// Errors of the tracked allocator. Each one is fatal at the public surface;
/// only the `try_*` operations hand them back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MemoryError {
    #[error("{site}: out of memory, cannot allocate {size} bytes")]
    AllocationFailure { size: usize, site: Site },
    #[error("{site}: size overflow, cannot allocate {count} x {size} bytes")]
    SizeOverflow {
        count: usize,
        size: usize,
        site: Site,
    },
    #[error(
        "{operation}: {address:#x} was not allocated by the tracked allocator or is already released"
    )]
    UntrackedPointer { address: usize, operation: Operation },
    #[error("{site}: allocator returned {address:#x}, which is already tracked as live")]
    DuplicateRecord { address: usize, site: Site },
}

/// Class of a fatal condition, carried by the termination request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FatalKind {
    AllocationFailure,
    UntrackedPointer,
    DuplicateRecord,
    ContractViolation,
    Panic,
}

impl FatalKind {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::AllocationFailure => "allocation_failure",
            Self::UntrackedPointer => "untracked_pointer",
            Self::DuplicateRecord => "duplicate_record",
            Self::ContractViolation => "contract_violation",
            Self::Panic => "panic",
        }
    }
}

impl MemoryError {
    #[must_use]
    pub const fn kind(&self) -> FatalKind {
        match self {
            Self::AllocationFailure { .. } | Self::SizeOverflow { .. } => {
                FatalKind::AllocationFailure
            }
            Self::UntrackedPointer { .. } => FatalKind::UntrackedPointer,
            Self::DuplicateRecord { .. } => FatalKind::DuplicateRecord,
        }
    }
}
