//! Shared helpers: run a registry with a recording reporter and inspect the
//! event stream.

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use sectional::reporters::{EventLog, RecordingReporter};
use sectional::{EngineError, RunConfig, RunSummary, Session, TestRegistry};

/// Config with a fixed seed so runs are reproducible.
pub fn config() -> RunConfig {
    RunConfig::default().with_seed(0x5eed)
}

pub fn run(registry: TestRegistry, config: RunConfig) -> Result<(RunSummary, EventLog), EngineError> {
    let reporter = RecordingReporter::new();
    let log = reporter.log();
    let summary = Session::new(registry)
        .with_config(config)
        .with_reporter(Box::new(reporter))
        .run()?;
    Ok((summary, log))
}

/// Ordered list of strings appended to from inside test bodies.
#[derive(Debug, Clone, Default)]
pub struct Trail(Rc<RefCell<Vec<String>>>);

impl Trail {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.borrow_mut().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.borrow().clone()
    }
}
