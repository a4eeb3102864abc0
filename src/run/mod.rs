//! The run context.
//!
//! [`RunContext`] drives a test run: it owns the tracker tree, the generator
//! registry, the running totals and the reporter, and it is the handle test
//! bodies receive. A test case is run by invoking its body repeatedly:
//!
//! ```text
//! for each generator combination          (outer loop)
//!     start a fresh tracker tree
//!     repeat until the test-case node completes or the run aborts
//!         one pass: invoke the body, close scopes, report the pass
//! ```
//!
//! Result capture (assertion outcomes, section bookkeeping) lives in
//! `capture.rs`; the API bodies call (`section`, `check`, `generate`, ...)
//! lives in `checks.rs`.

mod capture;
mod checks;

use rand::SeedableRng;
use rand_xoshiro::Xoshiro256StarStar;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

use crate::assertion::{AssertionInfo, AssertionResult, Disposition, MessageInfo, ResultKind};
use crate::auditor::LifecycleAuditor;
use crate::config::Configuration;
use crate::errors::{EngineError, Interrupt, TestResult};
use crate::fatal::{panic_message, FatalCondition, FatalConditionGuard};
use crate::generators::GeneratorRegistry;
use crate::location::ScopeKey;
use crate::output::{OutputSinks, StreamRedirect};
use crate::registry::{TestCase, TestCaseInfo};
use crate::reporter::{
    GroupInfo, Reporter, SectionInfo, SectionStats, TestCaseStats, TestGroupStats, TestRunInfo,
    TestRunStats,
};
use crate::totals::{Counts, Totals};
use crate::tracker::{NodeId, TrackerContext, TreeShape};

/// Outcome of a whole run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub totals: Totals,
    pub aborted: bool,
    /// Message of the fatal condition that ended the run early, if any.
    pub fatal: Option<String>,
}

impl RunSummary {
    /// Failed assertion count clamped to `i32::MAX`; at least 1 after a
    /// fatal condition.
    pub fn exit_code(&self) -> i32 {
        let failed = i32::try_from(self.totals.assertions.failed).unwrap_or(i32::MAX);
        if self.fatal.is_some() {
            failed.max(1)
        } else {
            failed
        }
    }
}

/// Bookkeeping for a section whose end has not been reported yet.
#[derive(Debug, Clone)]
struct SectionEndInfo {
    section: SectionInfo,
    node: NodeId,
    prev_assertions: Counts,
    duration_secs: f64,
}

pub struct RunContext {
    run_info: TestRunInfo,
    config: Box<dyn Configuration>,
    reporter: Box<dyn Reporter>,
    auditor: Option<Box<dyn LifecycleAuditor>>,

    totals: Totals,
    trackers: TrackerContext,
    generators: GeneratorRegistry,
    current_group: Option<GroupInfo>,
    active_test: Option<TestCaseInfo>,
    last_tree: Option<TreeShape>,

    messages: Vec<MessageInfo>,
    last_assertion: AssertionInfo,
    last_result: Option<AssertionResult>,
    active_sections: Vec<NodeId>,
    unfinished_sections: Vec<SectionEndInfo>,

    sinks: OutputSinks,
    seed: u32,
    rng: Xoshiro256StarStar,
    fatal_guard: Option<FatalConditionGuard>,
    pending_fatal: Option<String>,
    fatal: Option<String>,
    run_ended: bool,
}

impl RunContext {
    /// Starts a run and announces it to the reporter.
    pub fn new(config: Box<dyn Configuration>, reporter: Box<dyn Reporter>) -> Self {
        let seed = resolve_seed(config.rng_seed());
        let run_info = TestRunInfo {
            name: config.name().to_string(),
        };
        let mut ctx = Self {
            run_info,
            config,
            reporter,
            auditor: None,
            totals: Totals::default(),
            trackers: TrackerContext::new(),
            generators: GeneratorRegistry::new(),
            current_group: None,
            active_test: None,
            last_tree: None,
            messages: Vec::new(),
            last_assertion: AssertionInfo::new("", Default::default(), "", Disposition::Normal),
            last_result: None,
            active_sections: Vec::new(),
            unfinished_sections: Vec::new(),
            sinks: OutputSinks::new(),
            seed,
            rng: Xoshiro256StarStar::seed_from_u64(u64::from(seed)),
            fatal_guard: None,
            pending_fatal: None,
            fatal: None,
            run_ended: false,
        };
        debug!(run = %ctx.run_info.name, seed, "test run starting");
        ctx.reporter.test_run_starting(&ctx.run_info);
        ctx
    }

    pub fn with_auditor(mut self, auditor: Box<dyn LifecycleAuditor>) -> Self {
        self.auditor = Some(auditor);
        self
    }

    pub fn set_auditor(&mut self, auditor: Box<dyn LifecycleAuditor>) {
        self.auditor = Some(auditor);
    }

    pub fn config(&self) -> &dyn Configuration {
        self.config.as_ref()
    }

    pub fn totals(&self) -> Totals {
        self.totals
    }

    /// Seed used for every invocation in this run.
    pub fn seed(&self) -> u32 {
        self.seed
    }

    /// True once the failed-assertion count reached the abort threshold.
    /// A threshold of 0 never aborts.
    pub fn aborting(&self) -> bool {
        self.config
            .abort_after()
            .filter(|limit| *limit > 0)
            .map_or(false, |limit| self.totals.assertions.failed >= limit)
    }

    pub fn is_fatal(&self) -> bool {
        self.fatal.is_some()
    }

    /// Tracker tree of the most recently finished generator combination.
    pub fn last_tree_shape(&self) -> Option<&TreeShape> {
        self.last_tree.as_ref()
    }

    // ------------------------------------------------------------------------
    // Groups and skipped tests
    // ------------------------------------------------------------------------

    pub fn test_group_starting(&mut self, group: GroupInfo) {
        self.reporter.test_group_starting(&group);
        self.current_group = Some(group);
    }

    pub fn test_group_ended(&mut self, totals: Totals) {
        if self.run_ended {
            return;
        }
        let Some(group) = self.current_group.take() else {
            return;
        };
        let aborting = self.aborting();
        self.reporter.test_group_ended(&TestGroupStats {
            group,
            totals,
            aborting,
        });
    }

    pub fn skip_test(&mut self, info: &TestCaseInfo) {
        self.reporter.skip_test(info);
    }

    pub fn no_matching_test_cases(&mut self, filters: &str) {
        self.reporter.no_matching_test_cases(filters);
    }

    // ------------------------------------------------------------------------
    // Test cases
    // ------------------------------------------------------------------------

    /// Runs one test case to completion and returns its totals delta.
    ///
    /// A fatal condition ends the whole run: every end event is emitted
    /// before `EngineError::FatalCondition` is returned.
    pub fn run_test(&mut self, test: &TestCase) -> Result<Totals, EngineError> {
        if let Some(message) = &self.fatal {
            return Err(EngineError::FatalCondition {
                message: message.clone(),
            });
        }
        let info = test.info.clone();
        let prev_totals = self.totals;
        let mut std_out = String::new();
        let mut std_err = String::new();

        self.reporter.test_case_starting(&info);
        self.active_test = Some(info.clone());
        self.generators.clear();
        let key = ScopeKey::new(info.name.clone(), info.location.clone());

        let mut passes = 0usize;
        loop {
            let root = self.trackers.start_run();
            loop {
                self.trackers.start_cycle()?;
                let tracker = self.trackers.acquire(&key)?;
                passes += 1;
                debug!(test = %info.name, pass = passes, "starting pass");

                self.run_current_test(test, tracker, &mut std_out, &mut std_err)?;
                if let Some(message) = self.fatal.clone() {
                    self.trackers.end_run();
                    self.active_test = None;
                    return Err(EngineError::FatalCondition { message });
                }
                if self.trackers.is_successfully_completed(tracker) || self.aborting() {
                    break;
                }
            }
            self.last_tree = Some(self.trackers.shape(root));
            if self.aborting() || !self.generators.advance() {
                break;
            }
            debug!(test = %info.name, generators = self.generators.len(), "next generator combination");
        }
        self.trackers.end_run();

        let mut delta = self.totals.delta(&prev_totals);
        if info.expected_to_fail() && delta.test_cases.passed > 0 {
            delta.assertions.failed += 1;
            delta.test_cases.passed -= 1;
            delta.test_cases.failed += 1;
            self.totals.assertions.failed += 1;
        }
        self.totals.test_cases += delta.test_cases;

        let aborting = self.aborting();
        if aborting {
            warn!(
                failed = self.totals.assertions.failed,
                "abort threshold reached, remaining test cases are skipped"
            );
        }
        info!(
            test = %info.name,
            passes,
            passed = delta.assertions.passed,
            failed = delta.assertions.failed,
            failed_but_ok = delta.assertions.failed_but_ok,
            "test case finished"
        );
        self.reporter.test_case_ended(&TestCaseStats {
            info,
            totals: delta,
            std_out,
            std_err,
            aborting,
        });
        self.active_test = None;
        Ok(delta)
    }

    /// One pass over the body of the active test case.
    fn run_current_test(
        &mut self,
        test: &TestCase,
        tracker: NodeId,
        std_out: &mut String,
        std_err: &mut String,
    ) -> Result<(), EngineError> {
        let info = &test.info;
        let section = SectionInfo::new(info.name.clone(), info.location.clone())
            .with_description(info.description.clone());
        self.reporter.section_starting(&section);
        let prev_assertions = self.totals.assertions;
        self.last_assertion =
            AssertionInfo::new("TEST_CASE", info.location.clone(), "", Disposition::Normal);
        self.seed_rng();

        let before = self.auditor.as_ref().map(|auditor| auditor.snapshot());
        let timer = Instant::now();
        let outcome = {
            let _redirect = self
                .should_redirect()
                .then(|| StreamRedirect::engage(&self.sinks));
            self.invoke_active_test_case(test)
        };
        let duration_secs = timer.elapsed().as_secs_f64();
        let (out, err) = self.sinks.take_captured();
        std_out.push_str(&out);
        std_err.push_str(&err);

        match outcome {
            Ok(()) | Err(Interrupt::AssertionFailed) => {}
            Err(Interrupt::Exception(message)) => {
                self.record_unexpected(ResultKind::ThrewException, message);
            }
            Err(Interrupt::Fatal(message)) => {
                self.handle_fatal_error_condition(message, std_out, std_err);
                return Ok(());
            }
        }
        if let Some(before) = before {
            self.audit_lifecycle(&before, &info.location);
        }

        self.trackers.close(tracker)?;
        self.handle_unfinished_sections();
        self.messages.clear();

        let mut assertions = self.totals.assertions - prev_assertions;
        let missing_assertions = self.test_for_missing_assertions(&mut assertions, tracker);
        if info.ok_to_fail() {
            std::mem::swap(&mut assertions.failed_but_ok, &mut assertions.failed);
            self.totals.assertions.failed -= assertions.failed_but_ok;
            self.totals.assertions.failed_but_ok += assertions.failed_but_ok;
        }
        self.reporter.section_ended(&SectionStats {
            section,
            assertions,
            duration_secs,
            missing_assertions,
        });
        Ok(())
    }

    fn invoke_active_test_case(&mut self, test: &TestCase) -> TestResult {
        self.fatal_guard = Some(FatalConditionGuard::install());
        let outcome = match catch_unwind(AssertUnwindSafe(|| test.invoke(self))) {
            Ok(outcome) => outcome,
            Err(payload) => Err(self.interrupt_from_panic(payload)),
        };
        self.fatal_guard = None;
        match self.pending_fatal.take() {
            Some(message) => Err(Interrupt::Fatal(message)),
            None => outcome,
        }
    }

    /// Converts a caught panic into the interrupt it stands for.
    fn interrupt_from_panic(&mut self, payload: Box<dyn std::any::Any + Send>) -> Interrupt {
        if let Some(fatal) = payload.downcast_ref::<FatalCondition>() {
            self.pending_fatal = Some(fatal.message.clone());
            return Interrupt::Fatal(fatal.message.clone());
        }
        let message = panic_message(payload.as_ref());
        let site = self
            .fatal_guard
            .as_ref()
            .and_then(|guard| guard.last_panic())
            .and_then(|record| record.location);
        match site {
            Some(site) => Interrupt::Exception(format!("panicked at {}: {}", site, message)),
            None => Interrupt::Exception(message),
        }
    }

    /// Ends the run after an unrecoverable fault.
    ///
    /// Open sections are closed with zero duration, then the test case,
    /// group and run end events are emitted straight away.
    fn handle_fatal_error_condition(&mut self, message: String, std_out: &str, std_err: &str) {
        warn!(%message, "fatal condition, ending the run");
        self.record_unexpected(ResultKind::FatalCondition, message.clone());

        for unfinished in &mut self.unfinished_sections {
            unfinished.duration_secs = 0.0;
        }
        self.handle_unfinished_sections();
        self.messages.clear();

        let Some(info) = self.active_test.clone() else {
            self.fatal = Some(message);
            return;
        };
        let section = SectionInfo::new(info.name.clone(), info.location.clone())
            .with_description(info.description.clone());
        self.reporter.section_ended(&SectionStats {
            section,
            assertions: Counts::new(0, 1, 0),
            duration_secs: 0.0,
            missing_assertions: false,
        });

        let mut delta = Totals::default();
        delta.test_cases.failed = 1;
        self.reporter.test_case_ended(&TestCaseStats {
            info,
            totals: delta,
            std_out: std_out.to_string(),
            std_err: std_err.to_string(),
            aborting: false,
        });
        self.totals.test_cases.failed += 1;

        if let Some(group) = self.current_group.take() {
            self.reporter.test_group_ended(&TestGroupStats {
                group,
                totals: self.totals,
                aborting: false,
            });
        }
        self.reporter.test_run_ended(&TestRunStats {
            run: self.run_info.clone(),
            totals: self.totals,
            aborting: false,
        });
        self.run_ended = true;
        self.fatal = Some(message);
    }

    fn should_redirect(&self) -> bool {
        self.config.should_redirect_std_out() || self.reporter.preferences().should_redirect_std_out
    }

    fn seed_rng(&mut self) {
        self.rng = Xoshiro256StarStar::seed_from_u64(u64::from(self.seed));
        self.messages.push(MessageInfo::info(
            self.last_assertion.location.clone(),
            format!("Random generator seeded with value {}", self.seed),
        ));
    }

    // ------------------------------------------------------------------------
    // End of run
    // ------------------------------------------------------------------------

    /// Emits `test_run_ended` (once) and returns the run summary.
    pub fn finish(mut self) -> RunSummary {
        self.end_run();
        RunSummary {
            totals: self.totals,
            aborted: self.aborting(),
            fatal: self.fatal.take(),
        }
    }

    fn end_run(&mut self) {
        if self.run_ended {
            return;
        }
        self.run_ended = true;
        let aborting = self.aborting();
        debug!(run = %self.run_info.name, failed = self.totals.assertions.failed, "test run ended");
        self.reporter.test_run_ended(&TestRunStats {
            run: self.run_info.clone(),
            totals: self.totals,
            aborting,
        });
    }
}

impl Drop for RunContext {
    fn drop(&mut self) {
        self.end_run();
    }
}

/// 0 asks for a clock-derived seed.
pub(crate) fn resolve_seed(configured: u32) -> u32 {
    if configured != 0 {
        return configured;
    }
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0);
    (now ^ (now >> 32)) as u32
}
