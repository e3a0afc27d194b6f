//! Bounded quantifiers for use inside contract conditions.
//!
//! The iteration is either any [`IntoIterator`] or a C-style loop descriptor
//! built with [`steps`]:
//!
//! ```
//! use prog1lib_core::quantifier::{countif, exists, forall, steps};
//!
//! let a = [1, 3, 3, 8];
//! assert!(forall(steps(0, |&i| i < a.len() - 1, |i| i + 1), |i| a[i] <= a[i + 1]));
//! assert!(!exists(&a, |&x| x < 0));
//! assert_eq!(countif(&a, |&x| x == 3), 2);
//! ```

use std::iter::FusedIterator;

/// Iteration `for (state = init; has_more(&state); state = step(state))`.
///
/// `step` runs when the next value is requested, after the consumer has seen
/// the current one, so a short-circuiting consumer never steps past its hit.
#[derive(Debug, Clone)]
pub struct Steps<S, C, F> {
    state: Option<S>,
    started: bool,
    has_more: C,
    step: F,
}

/// Loop descriptor starting at `init`, continuing while `has_more` holds.
pub fn steps<S, C, F>(init: S, has_more: C, step: F) -> Steps<S, C, F>
where
    S: Clone,
    C: FnMut(&S) -> bool,
    F: FnMut(S) -> S,
{
    Steps {
        state: Some(init),
        started: false,
        has_more,
        step,
    }
}

impl<S, C, F> Iterator for Steps<S, C, F>
where
    S: Clone,
    C: FnMut(&S) -> bool,
    F: FnMut(S) -> S,
{
    type Item = S;

    fn next(&mut self) -> Option<S> {
        if self.started {
            let previous = self.state.take()?;
            self.state = Some((self.step)(previous));
        }
        self.started = true;
        let current = self.state.as_ref()?;
        if !(self.has_more)(current) {
            self.state = None;
            return None;
        }
        Some(current.clone())
    }
}

impl<S, C, F> FusedIterator for Steps<S, C, F>
where
    S: Clone,
    C: FnMut(&S) -> bool,
    F: FnMut(S) -> S,
{
}

/// True iff `pred` holds for every step. Stops at the first failure.
pub fn forall<I: IntoIterator>(iter: I, mut pred: impl FnMut(I::Item) -> bool) -> bool {
    for item in iter {
        if !pred(item) {
            return false;
        }
    }
    true
}

/// True iff `pred` holds for at least one step. Stops at the first success.
pub fn exists<I: IntoIterator>(iter: I, mut pred: impl FnMut(I::Item) -> bool) -> bool {
    for item in iter {
        if pred(item) {
            return true;
        }
    }
    false
}

/// Number of steps for which `pred` holds. Visits every step.
pub fn countif<I: IntoIterator>(iter: I, mut pred: impl FnMut(I::Item) -> bool) -> usize {
    let mut count = 0;
    for item in iter {
        if pred(item) {
            count += 1;
        }
    }
    count
}
