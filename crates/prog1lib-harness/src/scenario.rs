//! Built-in end-to-end scenarios.
//!
//! Each scenario is a small program body run under [`prog1lib_core::run`]:
//! it either returns (and the process terminates normally, reporting leaks)
//! or triggers one fatal condition. The harness binary runs one scenario per
//! process so the real exit status and diagnostic output can be observed.

use clap::ValueEnum;
use prog1lib_core::{
    check, ensure, release, require, require_not_null, set_leak_checking, test_equal, xcalloc,
    xmalloc, xrealloc,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum Scenario {
    /// Allocate and release; nothing to report.
    Clean,
    /// Leak one 10-byte block.
    Leak,
    /// Leak one block with leak checking switched off.
    LeakUnchecked,
    /// Grow a block and leak it; the report names the reallocating function.
    Realloc,
    /// Release the same block twice.
    DoubleRelease,
    /// Release a pointer the allocator never handed out.
    ForeignRelease,
    /// Fail an assertion.
    AssertFail,
    /// Pass a null pointer to a function requiring a non-null argument.
    RequireNull,
    /// Fail a postcondition.
    EnsureFail,
    /// Fail a precondition carrying a context message.
    ContextFail,
    /// Zeroed allocation whose size overflows.
    CallocOverflow,
    /// Request more memory than the allocator can provide.
    OutOfMemory,
    /// Run test checks, one of them failing.
    CheckTally,
    /// Panic in the program body.
    Panic,
}

impl Scenario {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Clean => "clean",
            Self::Leak => "leak",
            Self::LeakUnchecked => "leak-unchecked",
            Self::Realloc => "realloc",
            Self::DoubleRelease => "double-release",
            Self::ForeignRelease => "foreign-release",
            Self::AssertFail => "assert-fail",
            Self::RequireNull => "require-null",
            Self::EnsureFail => "ensure-fail",
            Self::ContextFail => "context-fail",
            Self::CallocOverflow => "calloc-overflow",
            Self::OutOfMemory => "out-of-memory",
            Self::CheckTally => "check-tally",
            Self::Panic => "panic",
        }
    }

    /// Whether the scenario ends with the failure status.
    #[must_use]
    pub const fn expects_failure(self) -> bool {
        !matches!(
            self,
            Self::Clean | Self::Leak | Self::LeakUnchecked | Self::Realloc | Self::CheckTally
        )
    }

    /// Program body. Returns only for scenarios that terminate normally.
    pub fn execute(self) {
        match self {
            Self::Clean => {
                let block = xmalloc!(10);
                let zeroed = xcalloc!(4, 4);
                release(block);
                release(zeroed);
            }
            Self::Leak => {
                xmalloc!(10);
            }
            Self::LeakUnchecked => {
                set_leak_checking(false);
                xmalloc!(10);
            }
            Self::Realloc => {
                let block = xmalloc!(10);
                grow(block.as_ptr(), 100);
            }
            Self::DoubleRelease => {
                let block = xmalloc!(10);
                release(block);
                release(block);
            }
            Self::ForeignRelease => {
                let local = 0_u64;
                release(std::ptr::from_ref(&local));
            }
            Self::AssertFail => {
                let x = -1;
                check!("x positive", x > 0);
            }
            Self::RequireNull => {
                l_length(std::ptr::null());
            }
            Self::EnsureFail => {
                i_abs(i32::MIN);
            }
            Self::ContextFail => {
                l_get(&[1, 2, 3], 7);
            }
            Self::CallocOverflow => {
                xcalloc!(usize::MAX, 2);
            }
            Self::OutOfMemory => {
                xmalloc!(usize::MAX / 2 + 1);
            }
            Self::CheckTally => {
                test_equal!(2 + 2, 4);
                test_equal!("abc".len(), 4);
            }
            Self::Panic => panic!("scenario body panicked"),
        }
    }
}

fn grow(block: *mut u8, size: usize) -> *mut u8 {
    xrealloc!(block, size)
}

fn l_length(list: *const u64) -> usize {
    require_not_null!(list);
    0
}

fn i_abs(x: i32) -> i32 {
    let result = x.wrapping_abs();
    ensure!("not negative", result >= 0);
    result
}

fn l_get(items: &[i32], index: usize) -> i32 {
    require!(
        "index in range",
        index < items.len(),
        "index {index}, length {}",
        items.len()
    );
    items[index]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_match_cli_values() {
        for scenario in Scenario::value_variants() {
            let value = scenario.to_possible_value().expect("visible value");
            assert_eq!(value.get_name(), scenario.name());
            assert_eq!(Scenario::from_str(scenario.name(), false), Ok(*scenario));
        }
    }

    #[test]
    fn five_scenarios_end_normally() {
        let normal = Scenario::value_variants()
            .iter()
            .filter(|scenario| !scenario.expects_failure())
            .count();
        assert_eq!(normal, 5);
    }
}
