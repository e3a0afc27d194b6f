//! Wall-clock timing of an expression.

use std::time::{Duration, Instant};

/// Evaluate `f` and return its value with the elapsed time.
pub fn measure<R>(f: impl FnOnce() -> R) -> (R, Duration) {
    let start = Instant::now();
    let value = f();
    (value, start.elapsed())
}

#[must_use]
pub fn format_elapsed(elapsed: Duration) -> String {
    format!("time: {} ms", elapsed.as_nanos() as f64 / 1e6)
}

/// Print `time: <ms> ms` on standard output.
pub fn report(elapsed: Duration) {
    println!("{}", format_elapsed(elapsed));
}

/// Evaluate an expression, print how long it took, and yield its value.
#[cfg(feature = "timing")]
#[macro_export]
macro_rules! time_function {
    ($expr:expr $(,)?) => {{
        let start = ::std::time::Instant::now();
        let value = $expr;
        $crate::timing::report(start.elapsed());
        value
    }};
}

#[cfg(not(feature = "timing"))]
#[macro_export]
macro_rules! time_function {
    ($expr:expr $(,)?) => {
        $expr
    };
}
