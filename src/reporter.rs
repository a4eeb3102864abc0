//! Reporter event contract.
//!
//! The run context emits events in strict nesting order:
//!
//! ```text
//! test_run_starting
//!   test_group_starting
//!     test_case_starting | skip_test
//!       section_starting
//!         assertion_starting -> assertion_ended
//!       section_ended
//!     test_case_ended
//!   test_group_ended
//! test_run_ended
//! ```
//!
//! Every callback has a default no-op implementation so a reporter only
//! overrides what it cares about.

use serde::Serialize;

use crate::assertion::{AssertionInfo, AssertionResult, MessageInfo};
use crate::location::SourceLocation;
use crate::registry::TestCaseInfo;
use crate::totals::{Counts, Totals};

// ============================================================================
// EVENT PAYLOADS
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReporterPreferences {
    /// Capture the test body's stdout/stderr instead of letting it through.
    pub should_redirect_std_out: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestRunInfo {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupInfo {
    pub name: String,
    pub group_index: usize,
    pub groups_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionInfo {
    pub name: String,
    pub description: String,
    pub location: SourceLocation,
}

impl SectionInfo {
    pub fn new(name: impl Into<String>, location: SourceLocation) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            location,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssertionStats {
    pub result: AssertionResult,
    pub info_messages: Vec<MessageInfo>,
    pub totals: Totals,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectionStats {
    pub section: SectionInfo,
    pub assertions: Counts,
    pub duration_secs: f64,
    pub missing_assertions: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestCaseStats {
    pub info: TestCaseInfo,
    pub totals: Totals,
    pub std_out: String,
    pub std_err: String,
    pub aborting: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestGroupStats {
    pub group: GroupInfo,
    pub totals: Totals,
    pub aborting: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestRunStats {
    pub run: TestRunInfo,
    pub totals: Totals,
    pub aborting: bool,
}

// ============================================================================
// REPORTER TRAIT
// ============================================================================

pub trait Reporter {
    fn preferences(&self) -> ReporterPreferences {
        ReporterPreferences::default()
    }

    fn no_matching_test_cases(&mut self, _filters: &str) {}

    fn test_run_starting(&mut self, _info: &TestRunInfo) {}

    fn test_group_starting(&mut self, _info: &GroupInfo) {}

    fn test_case_starting(&mut self, _info: &TestCaseInfo) {}

    fn section_starting(&mut self, _info: &SectionInfo) {}

    fn assertion_starting(&mut self, _info: &AssertionInfo) {}

    /// Returns `true` when the pending info messages were consumed and can
    /// be dropped; otherwise they stay pending for the next outcome.
    fn assertion_ended(&mut self, _stats: &AssertionStats) -> bool {
        true
    }

    fn section_ended(&mut self, _stats: &SectionStats) {}

    fn test_case_ended(&mut self, _stats: &TestCaseStats) {}

    fn test_group_ended(&mut self, _stats: &TestGroupStats) {}

    fn test_run_ended(&mut self, _stats: &TestRunStats) {}

    fn skip_test(&mut self, _info: &TestCaseInfo) {}
}

impl<R: Reporter + ?Sized> Reporter for Box<R> {
    fn preferences(&self) -> ReporterPreferences {
        (**self).preferences()
    }
    fn no_matching_test_cases(&mut self, filters: &str) {
        (**self).no_matching_test_cases(filters)
    }
    fn test_run_starting(&mut self, info: &TestRunInfo) {
        (**self).test_run_starting(info)
    }
    fn test_group_starting(&mut self, info: &GroupInfo) {
        (**self).test_group_starting(info)
    }
    fn test_case_starting(&mut self, info: &TestCaseInfo) {
        (**self).test_case_starting(info)
    }
    fn section_starting(&mut self, info: &SectionInfo) {
        (**self).section_starting(info)
    }
    fn assertion_starting(&mut self, info: &AssertionInfo) {
        (**self).assertion_starting(info)
    }
    fn assertion_ended(&mut self, stats: &AssertionStats) -> bool {
        (**self).assertion_ended(stats)
    }
    fn section_ended(&mut self, stats: &SectionStats) {
        (**self).section_ended(stats)
    }
    fn test_case_ended(&mut self, stats: &TestCaseStats) {
        (**self).test_case_ended(stats)
    }
    fn test_group_ended(&mut self, stats: &TestGroupStats) {
        (**self).test_group_ended(stats)
    }
    fn test_run_ended(&mut self, stats: &TestRunStats) {
        (**self).test_run_ended(stats)
    }
    fn skip_test(&mut self, info: &TestCaseInfo) {
        (**self).skip_test(info)
    }
}

// ============================================================================
// FAN-OUT
// ============================================================================

/// Forwards every event to each member in registration order.
#[derive(Default)]
pub struct ReporterSet {
    reporters: Vec<Box<dyn Reporter>>,
}

impl ReporterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, reporter: Box<dyn Reporter>) {
        self.reporters.push(reporter);
    }

    pub fn with(mut self, reporter: Box<dyn Reporter>) -> Self {
        self.add(reporter);
        self
    }

    pub fn len(&self) -> usize {
        self.reporters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reporters.is_empty()
    }
}

impl Reporter for ReporterSet {
    fn preferences(&self) -> ReporterPreferences {
        ReporterPreferences {
            should_redirect_std_out: self
                .reporters
                .iter()
                .any(|r| r.preferences().should_redirect_std_out),
        }
    }
    fn no_matching_test_cases(&mut self, filters: &str) {
        self.reporters
            .iter_mut()
            .for_each(|r| r.no_matching_test_cases(filters));
    }
    fn test_run_starting(&mut self, info: &TestRunInfo) {
        self.reporters.iter_mut().for_each(|r| r.test_run_starting(info));
    }
    fn test_group_starting(&mut self, info: &GroupInfo) {
        self.reporters.iter_mut().for_each(|r| r.test_group_starting(info));
    }
    fn test_case_starting(&mut self, info: &TestCaseInfo) {
        self.reporters.iter_mut().for_each(|r| r.test_case_starting(info));
    }
    fn section_starting(&mut self, info: &SectionInfo) {
        self.reporters.iter_mut().for_each(|r| r.section_starting(info));
    }
    fn assertion_starting(&mut self, info: &AssertionInfo) {
        self.reporters.iter_mut().for_each(|r| r.assertion_starting(info));
    }
    fn assertion_ended(&mut self, stats: &AssertionStats) -> bool {
        let mut consumed = false;
        for reporter in &mut self.reporters {
            consumed |= reporter.assertion_ended(stats);
        }
        consumed
    }
    fn section_ended(&mut self, stats: &SectionStats) {
        self.reporters.iter_mut().for_each(|r| r.section_ended(stats));
    }
    fn test_case_ended(&mut self, stats: &TestCaseStats) {
        self.reporters.iter_mut().for_each(|r| r.test_case_ended(stats));
    }
    fn test_group_ended(&mut self, stats: &TestGroupStats) {
        self.reporters.iter_mut().for_each(|r| r.test_group_ended(stats));
    }
    fn test_run_ended(&mut self, stats: &TestRunStats) {
        self.reporters.iter_mut().for_each(|r| r.test_run_ended(stats));
    }
    fn skip_test(&mut self, info: &TestCaseInfo) {
        self.reporters.iter_mut().for_each(|r| r.skip_test(info));
    }
}
