//! Top-level run driver.
//!
//! A [`Session`] ties a [`TestRegistry`] to a [`RunConfig`]: it selects and
//! orders the tests, builds the reporter and the run context, runs every
//! selected test case inside one test group and turns the outcome into a
//! process exit status.

use std::io::{self, Write};
use tracing::warn;

use crate::auditor::LifecycleAuditor;
use crate::config::RunConfig;
use crate::errors::EngineError;
use crate::filter::TestFilter;
use crate::registry::{TestCase, TestRegistry};
use crate::reporter::{GroupInfo, Reporter};
use crate::reporters;
use crate::run::{resolve_seed, RunContext, RunSummary};
use crate::totals::Totals;

pub struct Session {
    registry: TestRegistry,
    config: RunConfig,
    reporter: Option<Box<dyn Reporter>>,
    auditor: Option<Box<dyn LifecycleAuditor>>,
}

impl Session {
    pub fn new(registry: TestRegistry) -> Self {
        Self {
            registry,
            config: RunConfig::default(),
            reporter: None,
            auditor: None,
        }
    }

    pub fn with_config(mut self, config: RunConfig) -> Self {
        self.config = config;
        self
    }

    /// Uses `reporter` instead of the one named in the configuration.
    pub fn with_reporter(mut self, reporter: Box<dyn Reporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    pub fn with_auditor(mut self, auditor: Box<dyn LifecycleAuditor>) -> Self {
        self.auditor = Some(auditor);
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Matching tests in run order. With `no_throw` set, tests tagged
    /// `[!throws]` are left out.
    pub fn selected(&mut self) -> Result<Vec<TestCase>, EngineError> {
        let filter = TestFilter::from_expressions(&self.config.filters)?;
        if self.config.filenames_as_tags {
            self.registry.apply_filenames_as_tags();
        }
        self.config.rng_seed = resolve_seed(self.config.rng_seed);
        let no_throw = self.config.no_throw;
        Ok(self
            .registry
            .sorted(self.config.order, self.config.rng_seed)
            .into_iter()
            .filter(|test| filter.matches(&test.info))
            .filter(|test| !(no_throw && test.info.throws()))
            .collect())
    }

    /// Writes the name and tags of every matching test; returns how many
    /// were listed.
    pub fn list_tests(&mut self, out: &mut dyn Write) -> Result<usize, EngineError> {
        let tests = self.selected()?;
        let io_error = |source| EngineError::Listing { source };
        for test in &tests {
            writeln!(out, "  {}", test.info.name).map_err(io_error)?;
            if !test.info.tags.is_empty() {
                writeln!(out, "      {}", test.info.tags_as_string()).map_err(io_error)?;
            }
        }
        writeln!(out, "{} matching test cases", tests.len()).map_err(io_error)?;
        Ok(tests.len())
    }

    /// Runs every selected test case.
    ///
    /// A fatal condition is absorbed here: the summary carries its message
    /// and the run's events have already been closed.
    pub fn run(mut self) -> Result<RunSummary, EngineError> {
        let tests = self.selected()?;
        let reporter = match self.reporter.take() {
            Some(reporter) => reporter,
            None => reporters::create(&self.config.reporter)?,
        };

        let mut ctx = RunContext::new(Box::new(self.config.clone()), reporter);
        if let Some(auditor) = self.auditor.take() {
            ctx.set_auditor(auditor);
        }
        ctx.test_group_starting(GroupInfo {
            name: self.config.name.clone(),
            group_index: 1,
            groups_count: 1,
        });
        if tests.is_empty() && !self.config.filters.is_empty() {
            ctx.no_matching_test_cases(&self.config.filters.join(" "));
        }

        let mut totals = Totals::default();
        for test in &tests {
            if ctx.aborting() {
                ctx.skip_test(&test.info);
                continue;
            }
            match ctx.run_test(test) {
                Ok(delta) => totals += delta,
                Err(EngineError::FatalCondition { message }) => {
                    warn!(%message, test = %test.info.name, "run ended by a fatal condition");
                    return Ok(ctx.finish());
                }
                Err(err) => return Err(err),
            }
        }
        ctx.test_group_ended(totals);
        Ok(ctx.finish())
    }

    /// Lists or runs according to the configuration and returns the process
    /// exit status. Engine errors are rendered to stderr and yield `i32::MAX`.
    pub fn execute(mut self) -> i32 {
        if self.config.list_only {
            let stdout = io::stdout();
            let mut lock = stdout.lock();
            return match self.list_tests(&mut lock) {
                Ok(_) => 0,
                Err(err) => report_error(err),
            };
        }
        match self.run() {
            Ok(summary) => summary.exit_code(),
            Err(err) => report_error(err),
        }
    }
}

fn report_error(err: EngineError) -> i32 {
    eprintln!("{:?}", miette::Report::new(err));
    i32::MAX
}
