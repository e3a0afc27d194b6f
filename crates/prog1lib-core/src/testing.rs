//! Lightweight test checks.
//!
//! Each check counts towards the runtime's tally, which is reported when the
//! process terminates. A failed check prints one line and returns `false`;
//! it never terminates.

use std::fmt::Debug;

use prog1lib_runtime::{Runtime, Site, runtime};

/// Default tolerance of [`test_within!`](crate::test_within).
pub const EPSILON: f64 = 1e-8;

pub fn test_equal_on<A, E>(runtime: &Runtime, site: Site, actual: &A, expected: &E) -> bool
where
    A: PartialEq<E> + Debug + ?Sized,
    E: Debug + ?Sized,
{
    let passed = actual == expected;
    if !passed {
        runtime.diagnostic(&format!(
            "{}: Actual value {actual:?} differs from expected value {expected:?}.",
            site.location()
        ));
    }
    runtime.tally().record(passed)
}

pub fn test_within_on(
    runtime: &Runtime,
    site: Site,
    actual: f64,
    expected: f64,
    epsilon: f64,
) -> bool {
    let passed = (actual - expected).abs() <= epsilon;
    if !passed {
        runtime.diagnostic(&format!(
            "{}: Actual value {actual} differs from expected value {expected} by more than {epsilon}.",
            site.location()
        ));
    }
    runtime.tally().record(passed)
}

pub fn test_equal<A, E>(site: Site, actual: &A, expected: &E) -> bool
where
    A: PartialEq<E> + Debug + ?Sized,
    E: Debug + ?Sized,
{
    test_equal_on(runtime(), site, actual, expected)
}

pub fn test_within(site: Site, actual: f64, expected: f64, epsilon: f64) -> bool {
    test_within_on(runtime(), site, actual, expected, epsilon)
}

/// `test_equal!(actual, expected)`: counted equality check.
#[macro_export]
macro_rules! test_equal {
    ($actual:expr, $expected:expr $(,)?) => {
        $crate::testing::test_equal($crate::site!(), &$actual, &$expected)
    };
}

/// `test_within!(actual, expected[, epsilon])`: counted float check.
#[macro_export]
macro_rules! test_within {
    ($actual:expr, $expected:expr $(,)?) => {
        $crate::testing::test_within(
            $crate::site!(),
            $actual,
            $expected,
            $crate::testing::EPSILON,
        )
    };
    ($actual:expr, $expected:expr, $epsilon:expr $(,)?) => {
        $crate::testing::test_within($crate::site!(), $actual, $expected, $epsilon)
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use prog1lib_runtime::{BufferSink, Config};

    const SITE: Site = Site::new("point.c", "main", 40);

    fn local_runtime() -> (Runtime, BufferSink) {
        let sink = BufferSink::new();
        let runtime = Runtime::new(Config::default()).with_sink(sink.clone());
        (runtime, sink)
    }

    #[test]
    fn equal_values_pass_silently() {
        let (runtime, sink) = local_runtime();
        assert!(test_equal_on(&runtime, SITE, &3, &3));
        assert!(test_equal_on(&runtime, SITE, "abc", "abc"));
        assert!(test_equal_on(&runtime, SITE, &vec![1, 2], &[1, 2]));
        assert!(sink.lines().is_empty());
        assert_eq!(runtime.tally().summary().as_deref(), Some("All 3 tests passed!"));
    }

    #[test]
    fn mismatch_is_reported_and_counted() {
        let (runtime, sink) = local_runtime();
        assert!(!test_equal_on(&runtime, SITE, &4, &5));
        assert!(!test_equal_on(&runtime, SITE, "ab", "abc"));
        assert_eq!(
            sink.lines(),
            vec![
                "point.c, line 40: Actual value 4 differs from expected value 5.",
                r#"point.c, line 40: Actual value "ab" differs from expected value "abc"."#,
            ]
        );
        assert_eq!(runtime.tally().summary().as_deref(), Some("2 of 2 tests failed."));
    }

    #[test]
    fn within_uses_tolerance() {
        let (runtime, sink) = local_runtime();
        assert!(test_within_on(&runtime, SITE, 0.1 + 0.2, 0.3, EPSILON));
        assert!(!test_within_on(&runtime, SITE, 1.5, 1.0, 0.25));
        assert_eq!(
            sink.lines(),
            vec!["point.c, line 40: Actual value 1.5 differs from expected value 1 by more than 0.25."]
        );
        assert_eq!(runtime.tally().checks(), 2);
        assert_eq!(runtime.tally().successes(), 1);
    }
}
