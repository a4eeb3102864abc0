//! A reporter that records the event stream.
//!
//! The log is shared through [`EventLog`], so a handle can be kept after the
//! reporter itself has been boxed and handed to the run context.

use serde::Serialize;
use std::cell::RefCell;
use std::rc::Rc;

use crate::assertion::{AssertionInfo, ResultKind};
use crate::registry::TestCaseInfo;
use crate::reporter::{
    AssertionStats, GroupInfo, Reporter, ReporterPreferences, SectionInfo, SectionStats,
    TestCaseStats, TestGroupStats, TestRunInfo, TestRunStats,
};
use crate::totals::{Counts, Totals};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    RunStarting {
        name: String,
    },
    GroupStarting {
        name: String,
    },
    TestCaseStarting {
        name: String,
    },
    SectionStarting {
        name: String,
    },
    AssertionStarting {
        macro_name: String,
        expression: String,
    },
    AssertionEnded {
        kind: ResultKind,
        expression: String,
        message: String,
        info_messages: Vec<String>,
    },
    SectionEnded {
        name: String,
        assertions: Counts,
        missing_assertions: bool,
    },
    TestCaseEnded {
        name: String,
        totals: Totals,
        std_out: String,
        std_err: String,
        aborting: bool,
    },
    GroupEnded {
        name: String,
        totals: Totals,
        aborting: bool,
    },
    RunEnded {
        name: String,
        totals: Totals,
        aborting: bool,
    },
    SkipTest {
        name: String,
    },
    NoMatchingTestCases {
        filters: String,
    },
}

/// Shared, append-only list of recorded events.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Rc<RefCell<Vec<Event>>>,
}

impl EventLog {
    fn push(&self, event: Event) {
        self.events.borrow_mut().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.events.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.borrow().is_empty()
    }

    pub fn count(&self, predicate: impl Fn(&Event) -> bool) -> usize {
        self.events.borrow().iter().filter(|e| predicate(e)).count()
    }

    /// Names of sections in the order they were entered, test-case sections
    /// included.
    pub fn sections_entered(&self) -> Vec<String> {
        self.events
            .borrow()
            .iter()
            .filter_map(|event| match event {
                Event::SectionStarting { name } => Some(name.clone()),
                _ => None,
            })
            .collect()
    }

    /// Kind and expression of every reported outcome.
    pub fn outcomes(&self) -> Vec<(ResultKind, String)> {
        self.events
            .borrow()
            .iter()
            .filter_map(|event| match event {
                Event::AssertionEnded {
                    kind, expression, ..
                } => Some((*kind, expression.clone())),
                _ => None,
            })
            .collect()
    }

    /// The `test_case_ended` event for `name`.
    pub fn test_case_ended(&self, name: &str) -> Option<Event> {
        self.events
            .borrow()
            .iter()
            .find(|event| matches!(event, Event::TestCaseEnded { name: n, .. } if n == name))
            .cloned()
    }

    pub fn test_case_totals(&self, name: &str) -> Option<Totals> {
        match self.test_case_ended(name)? {
            Event::TestCaseEnded { totals, .. } => Some(totals),
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&*self.events.borrow())
    }
}

/// Records every event into an [`EventLog`].
#[derive(Debug, Clone)]
pub struct RecordingReporter {
    log: EventLog,
    redirect: bool,
    consume_messages: bool,
}

impl Default for RecordingReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self {
            log: EventLog::default(),
            redirect: false,
            consume_messages: true,
        }
    }

    /// Ask the run context to capture test output.
    pub fn capturing_output(mut self, redirect: bool) -> Self {
        self.redirect = redirect;
        self
    }

    /// Leave info messages pending instead of consuming them.
    pub fn keeping_messages(mut self) -> Self {
        self.consume_messages = false;
        self
    }

    pub fn log(&self) -> EventLog {
        self.log.clone()
    }
}

impl Reporter for RecordingReporter {
    fn preferences(&self) -> ReporterPreferences {
        ReporterPreferences {
            should_redirect_std_out: self.redirect,
        }
    }

    fn no_matching_test_cases(&mut self, filters: &str) {
        self.log.push(Event::NoMatchingTestCases {
            filters: filters.to_string(),
        });
    }

    fn test_run_starting(&mut self, info: &TestRunInfo) {
        self.log.push(Event::RunStarting {
            name: info.name.clone(),
        });
    }

    fn test_group_starting(&mut self, info: &GroupInfo) {
        self.log.push(Event::GroupStarting {
            name: info.name.clone(),
        });
    }

    fn test_case_starting(&mut self, info: &TestCaseInfo) {
        self.log.push(Event::TestCaseStarting {
            name: info.name.clone(),
        });
    }

    fn section_starting(&mut self, info: &SectionInfo) {
        self.log.push(Event::SectionStarting {
            name: info.name.clone(),
        });
    }

    fn assertion_starting(&mut self, info: &AssertionInfo) {
        self.log.push(Event::AssertionStarting {
            macro_name: info.macro_name.clone(),
            expression: info.expression.clone(),
        });
    }

    fn assertion_ended(&mut self, stats: &AssertionStats) -> bool {
        self.log.push(Event::AssertionEnded {
            kind: stats.result.kind,
            expression: stats.result.info.expression.clone(),
            message: stats.result.message.clone(),
            info_messages: stats.info_messages.iter().map(|m| m.message.clone()).collect(),
        });
        self.consume_messages
    }

    fn section_ended(&mut self, stats: &SectionStats) {
        self.log.push(Event::SectionEnded {
            name: stats.section.name.clone(),
            assertions: stats.assertions,
            missing_assertions: stats.missing_assertions,
        });
    }

    fn test_case_ended(&mut self, stats: &TestCaseStats) {
        self.log.push(Event::TestCaseEnded {
            name: stats.info.name.clone(),
            totals: stats.totals,
            std_out: stats.std_out.clone(),
            std_err: stats.std_err.clone(),
            aborting: stats.aborting,
        });
    }

    fn test_group_ended(&mut self, stats: &TestGroupStats) {
        self.log.push(Event::GroupEnded {
            name: stats.group.name.clone(),
            totals: stats.totals,
            aborting: stats.aborting,
        });
    }

    fn test_run_ended(&mut self, stats: &TestRunStats) {
        self.log.push(Event::RunEnded {
            name: stats.run.name.clone(),
            totals: stats.totals,
            aborting: stats.aborting,
        });
    }

    fn skip_test(&mut self, info: &TestCaseInfo) {
        self.log.push(Event::SkipTest {
            name: info.name.clone(),
        });
    }
}
