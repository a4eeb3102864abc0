//! Aggregated pass/fail statistics.
//!
//! [`Counts`] and [`Totals`] form a commutative monoid under `+`. Subtraction
//! is only meaningful between two snapshots of the same running total taken
//! in order, which is how per-test-case deltas are produced.

use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Sub};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counts {
    pub passed: usize,
    pub failed: usize,
    pub failed_but_ok: usize,
}

impl Counts {
    pub fn new(passed: usize, failed: usize, failed_but_ok: usize) -> Self {
        Self {
            passed,
            failed,
            failed_but_ok,
        }
    }

    pub fn total(&self) -> usize {
        self.passed + self.failed + self.failed_but_ok
    }

    pub fn all_passed(&self) -> bool {
        self.failed == 0 && self.failed_but_ok == 0
    }

    pub fn all_ok(&self) -> bool {
        self.failed == 0
    }
}

impl Add for Counts {
    type Output = Counts;

    fn add(self, other: Counts) -> Counts {
        Counts {
            passed: self.passed + other.passed,
            failed: self.failed + other.failed,
            failed_but_ok: self.failed_but_ok + other.failed_but_ok,
        }
    }
}

impl AddAssign for Counts {
    fn add_assign(&mut self, other: Counts) {
        *self = *self + other;
    }
}

impl Sub for Counts {
    type Output = Counts;

    fn sub(self, other: Counts) -> Counts {
        Counts {
            passed: self.passed.saturating_sub(other.passed),
            failed: self.failed.saturating_sub(other.failed),
            failed_but_ok: self.failed_but_ok.saturating_sub(other.failed_but_ok),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    pub assertions: Counts,
    pub test_cases: Counts,
}

impl Totals {
    /// Difference from an earlier snapshot, with the test-case verdict for
    /// that span filled in: failed if any assertion failed, failed-but-ok if
    /// only tolerated failures occurred, passed otherwise.
    pub fn delta(&self, previous: &Totals) -> Totals {
        let mut diff = *self - *previous;
        if diff.assertions.failed > 0 {
            diff.test_cases.failed += 1;
        } else if diff.assertions.failed_but_ok > 0 {
            diff.test_cases.failed_but_ok += 1;
        } else {
            diff.test_cases.passed += 1;
        }
        diff
    }
}

impl Add for Totals {
    type Output = Totals;

    fn add(self, other: Totals) -> Totals {
        Totals {
            assertions: self.assertions + other.assertions,
            test_cases: self.test_cases + other.test_cases,
        }
    }
}

impl AddAssign for Totals {
    fn add_assign(&mut self, other: Totals) {
        *self = *self + other;
    }
}

impl Sub for Totals {
    type Output = Totals;

    fn sub(self, other: Totals) -> Totals {
        Totals {
            assertions: self.assertions - other.assertions,
            test_cases: self.test_cases - other.test_cases,
        }
    }
}
