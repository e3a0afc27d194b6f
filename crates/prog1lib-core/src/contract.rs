//! Design-by-contract checks.
//!
//! A check evaluates a condition; when it is false, the violation is reported
//! on the diagnostic stream and the process ends through the termination
//! controller with the failure status. Three flavours differ only in how the
//! report is phrased:
//!
//! ```text
//! list.c, line 12: assertion "in range" (i < n) violated
//! list.c, line 20: l_get's precondition "valid index" (i < n) violated
//! list.c, line 31: l_sum's postcondition "not negative" violated: sum == -3
//! ```
//!
//! The macros ([`check!`](crate::check), [`require!`](crate::require),
//! [`ensure!`](crate::ensure), [`require_not_null!`](crate::require_not_null))
//! capture the call site and the condition text. They compile to nothing when
//! the `assert`, `require` or `ensure` feature of this crate is disabled; the
//! condition is then not evaluated.

use std::fmt;
use std::ptr::NonNull;

use prog1lib_runtime::{FatalKind, LifecycleRecord, LogLevel, Runtime, Site, runtime};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContractKind {
    Assertion,
    Precondition,
    Postcondition,
}

impl ContractKind {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Assertion => "assertion",
            Self::Precondition => "precondition",
            Self::Postcondition => "postcondition",
        }
    }
}

/// What the report shows after the description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Detail {
    /// Source text of the violated condition.
    Condition(&'static str),
    /// Caller-formatted context message.
    Context(String),
}

/// A failed contract check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub kind: ContractKind,
    pub site: Site,
    pub description: &'static str,
    pub detail: Detail,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: ", self.site.location())?;
        match self.kind {
            ContractKind::Assertion => write!(f, "assertion \"{}\"", self.description)?,
            kind => write!(
                f,
                "{}'s {} \"{}\"",
                self.site.function,
                kind.label(),
                self.description
            )?,
        }
        match &self.detail {
            Detail::Condition(text) => write!(f, " ({text}) violated"),
            Detail::Context(message) => write!(f, " violated: {message}"),
        }
    }
}

impl std::error::Error for Violation {}

impl Violation {
    /// Report on `runtime` and terminate.
    #[cold]
    pub fn raise_on(&self, runtime: &Runtime) -> ! {
        runtime.log(
            LifecycleRecord::new(LogLevel::Error, "contract", self.kind.label(), "violated")
                .with_site(self.site)
                .with_details(self.description),
        );
        runtime.fatal(FatalKind::ContractViolation, &self.to_string())
    }

    /// Report on the process-wide runtime and terminate.
    #[cold]
    pub fn violated(&self) -> ! {
        self.raise_on(runtime())
    }
}

/// Evaluate one check against `runtime`; `detail` runs only on failure.
pub fn check_on(
    runtime: &Runtime,
    kind: ContractKind,
    site: Site,
    description: &'static str,
    condition: bool,
    detail: impl FnOnce() -> Detail,
) {
    if !condition {
        Violation {
            kind,
            site,
            description,
            detail: detail(),
        }
        .raise_on(runtime);
    }
}

pub fn assert(site: Site, description: &'static str, condition_text: &'static str, condition: bool) {
    check_on(runtime(), ContractKind::Assertion, site, description, condition, || {
        Detail::Condition(condition_text)
    });
}

pub fn assert_with_context(
    site: Site,
    description: &'static str,
    condition: bool,
    context: impl FnOnce() -> String,
) {
    check_on(runtime(), ContractKind::Assertion, site, description, condition, || {
        Detail::Context(context())
    });
}

pub fn require(site: Site, description: &'static str, condition_text: &'static str, condition: bool) {
    check_on(runtime(), ContractKind::Precondition, site, description, condition, || {
        Detail::Condition(condition_text)
    });
}

pub fn require_with_context(
    site: Site,
    description: &'static str,
    condition: bool,
    context: impl FnOnce() -> String,
) {
    check_on(runtime(), ContractKind::Precondition, site, description, condition, || {
        Detail::Context(context())
    });
}

pub fn ensure(site: Site, description: &'static str, condition_text: &'static str, condition: bool) {
    check_on(runtime(), ContractKind::Postcondition, site, description, condition, || {
        Detail::Condition(condition_text)
    });
}

pub fn ensure_with_context(
    site: Site,
    description: &'static str,
    condition: bool,
    context: impl FnOnce() -> String,
) {
    check_on(runtime(), ContractKind::Postcondition, site, description, condition, || {
        Detail::Context(context())
    });
}

/// Values that can be checked with [`require_not_null!`](crate::require_not_null).
pub trait Nullable {
    fn is_null_value(&self) -> bool;
}

impl<T: ?Sized> Nullable for *const T {
    fn is_null_value(&self) -> bool {
        self.is_null()
    }
}

impl<T: ?Sized> Nullable for *mut T {
    fn is_null_value(&self) -> bool {
        self.is_null()
    }
}

impl<T: ?Sized> Nullable for NonNull<T> {
    fn is_null_value(&self) -> bool {
        false
    }
}

impl<T> Nullable for Option<T> {
    fn is_null_value(&self) -> bool {
        self.is_none()
    }
}

impl<T: Nullable + ?Sized> Nullable for &T {
    fn is_null_value(&self) -> bool {
        (**self).is_null_value()
    }
}

/// Precondition "not null" on `value`, reported with `argument` as its text.
pub fn require_not_null(site: Site, argument: &'static str, value: &impl Nullable) {
    require(site, "not null", argument, !value.is_null_value());
}

/// Assertion. `check!(description, condition)` or
/// `check!(description, condition, "format", args...)`.
#[cfg(feature = "assert")]
#[macro_export]
macro_rules! check {
    ($description:expr, $condition:expr $(,)?) => {
        $crate::contract::assert(
            $crate::site!(),
            $description,
            ::core::stringify!($condition),
            $condition,
        )
    };
    ($description:expr, $condition:expr, $($context:tt)+) => {
        $crate::contract::assert_with_context($crate::site!(), $description, $condition, || {
            ::std::format!($($context)+)
        })
    };
}

#[cfg(not(feature = "assert"))]
#[macro_export]
macro_rules! check {
    ($($ignored:tt)*) => {
        ()
    };
}

/// Precondition of the enclosing function.
#[cfg(feature = "require")]
#[macro_export]
macro_rules! require {
    ($description:expr, $condition:expr $(,)?) => {
        $crate::contract::require(
            $crate::site!(),
            $description,
            ::core::stringify!($condition),
            $condition,
        )
    };
    ($description:expr, $condition:expr, $($context:tt)+) => {
        $crate::contract::require_with_context($crate::site!(), $description, $condition, || {
            ::std::format!($($context)+)
        })
    };
}

#[cfg(not(feature = "require"))]
#[macro_export]
macro_rules! require {
    ($($ignored:tt)*) => {
        ()
    };
}

/// Precondition that a pointer or option is not null.
#[cfg(feature = "require")]
#[macro_export]
macro_rules! require_not_null {
    ($value:expr $(,)?) => {
        $crate::contract::require_not_null($crate::site!(), ::core::stringify!($value), &$value)
    };
}

#[cfg(not(feature = "require"))]
#[macro_export]
macro_rules! require_not_null {
    ($($ignored:tt)*) => {
        ()
    };
}

/// Postcondition of the enclosing function.
#[cfg(feature = "ensure")]
#[macro_export]
macro_rules! ensure {
    ($description:expr, $condition:expr $(,)?) => {
        $crate::contract::ensure(
            $crate::site!(),
            $description,
            ::core::stringify!($condition),
            $condition,
        )
    };
    ($description:expr, $condition:expr, $($context:tt)+) => {
        $crate::contract::ensure_with_context($crate::site!(), $description, $condition, || {
            ::std::format!($($context)+)
        })
    };
}

#[cfg(not(feature = "ensure"))]
#[macro_export]
macro_rules! ensure {
    ($($ignored:tt)*) => {
        ()
    };
}

/// Statements kept only while postconditions are checked, such as saving an
/// old value for a later [`ensure!`](crate::ensure).
#[cfg(feature = "ensure")]
#[macro_export]
macro_rules! ensure_code {
    ($($code:tt)*) => {
        $($code)*
    };
}

#[cfg(not(feature = "ensure"))]
#[macro_export]
macro_rules! ensure_code {
    ($($code:tt)*) => {};
}

#[cfg(test)]
mod tests {
    use super::*;
    use prog1lib_runtime::{
        BufferSink, Config, EXIT_FAILURE, TerminationRequest, UnwindTerminator,
        expect_termination,
    };

    const SITE: Site = Site::new("list.c", "l_get", 20);

    fn local_runtime() -> (Runtime, BufferSink) {
        let sink = BufferSink::new();
        let runtime = Runtime::new(Config {
            leak_check: false,
            ..Config::default()
        })
        .with_sink(sink.clone())
        .with_terminator(UnwindTerminator);
        (runtime, sink)
    }

    fn violation(kind: ContractKind, detail: Detail) -> String {
        Violation {
            kind,
            site: SITE,
            description: "valid index",
            detail,
        }
        .to_string()
    }

    #[test]
    fn reports_are_phrased_per_kind() {
        assert_eq!(
            violation(ContractKind::Assertion, Detail::Condition("i < n")),
            r#"list.c, line 20: assertion "valid index" (i < n) violated"#
        );
        assert_eq!(
            violation(ContractKind::Precondition, Detail::Condition("i < n")),
            r#"list.c, line 20: l_get's precondition "valid index" (i < n) violated"#
        );
        assert_eq!(
            violation(ContractKind::Postcondition, Detail::Context("i == 7".into())),
            r#"list.c, line 20: l_get's postcondition "valid index" violated: i == 7"#
        );
        assert_eq!(
            violation(ContractKind::Assertion, Detail::Context("n is 3".into())),
            r#"list.c, line 20: assertion "valid index" violated: n is 3"#
        );
    }

    #[test]
    fn passing_check_has_no_effect_and_skips_detail() {
        let (runtime, sink) = local_runtime();
        check_on(&runtime, ContractKind::Precondition, SITE, "valid index", true, || {
            panic!("detail must not be built for a passing check")
        });
        assert!(sink.lines().is_empty());
        assert!(runtime.lifecycle_records().is_empty());
    }

    #[test]
    fn failing_check_reports_and_terminates() {
        let (runtime, sink) = local_runtime();
        let request = expect_termination(|| {
            check_on(&runtime, ContractKind::Precondition, SITE, "valid index", false, || {
                Detail::Condition("i < n")
            });
        });
        assert_eq!(request, TerminationRequest::fatal(FatalKind::ContractViolation));
        assert_eq!(request.status, EXIT_FAILURE);
        assert_eq!(
            sink.lines(),
            vec![r#"list.c, line 20: l_get's precondition "valid index" (i < n) violated"#]
        );
        let events: Vec<String> = runtime
            .lifecycle_records()
            .into_iter()
            .map(|record| format!("{}:{}", record.symbol, record.event))
            .collect();
        assert_eq!(
            events,
            vec!["contract:precondition", "fatal:contract_violation", "terminate:exit"]
        );
    }

    #[test]
    fn nullable_covers_pointers_and_options() {
        let value = 5_u32;
        let present: *const u32 = &value;
        assert!(!present.is_null_value());
        assert!(std::ptr::null::<u32>().is_null_value());
        assert!(std::ptr::null_mut::<u8>().is_null_value());
        assert!(None::<&u32>.is_null_value());
        assert!(!Some(&value).is_null_value());
        assert!(!NonNull::from(&value).is_null_value());
    }
}
