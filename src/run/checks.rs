//! The API test bodies use.

use rand_xoshiro::Xoshiro256StarStar;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Instant;

use crate::assertion::{AssertionInfo, AssertionResult, Disposition, MessageInfo, ResultKind};
use crate::errors::{EngineError, Interrupt, TestResult};
use crate::location::{ScopeKey, SourceLocation};
use crate::output::{SinkWriter, Stream};
use crate::reporter::SectionInfo;

use super::{RunContext, SectionEndInfo};

impl RunContext {
    // ------------------------------------------------------------------------
    // Sections
    // ------------------------------------------------------------------------

    /// Runs `body` if this pass enters the section, otherwise does nothing.
    ///
    /// Panics inside `body` are caught here. A panic or an
    /// `Interrupt::Exception` leaving `body` is recorded as a
    /// `ThrewException` outcome straight away and continues outward as
    /// `Interrupt::AssertionFailed`, so the failure counts even when the
    /// caller drops the returned result. Other interrupts are returned
    /// unchanged after the section has been recorded as unfinished.
    pub fn section<F>(&mut self, info: SectionInfo, body: F) -> TestResult
    where
        F: FnOnce(&mut RunContext) -> TestResult,
    {
        let node = match self.section_started(&info) {
            Ok(Some(node)) => node,
            Ok(None) => return Ok(()),
            Err(err) => return Err(self.internal_failure(err)),
        };
        let prev_assertions = self.totals.assertions;
        let timer = Instant::now();

        let outcome = match catch_unwind(AssertUnwindSafe(|| body(self))) {
            Ok(outcome) => outcome,
            Err(payload) => Err(self.interrupt_from_panic(payload)),
        };
        let end = SectionEndInfo {
            section: info,
            node,
            prev_assertions,
            duration_secs: timer.elapsed().as_secs_f64(),
        };

        match outcome {
            Ok(()) => self
                .section_ended(end)
                .map_err(|err| self.internal_failure(err)),
            Err(Interrupt::Exception(message)) => {
                self.record_unexpected(ResultKind::ThrewException, message);
                if let Err(err) = self.section_ended_early(end, false) {
                    return Err(self.internal_failure(err));
                }
                Err(Interrupt::AssertionFailed)
            }
            Err(interrupt) => {
                if let Err(err) = self.section_ended_early(end, interrupt.is_fatal()) {
                    return Err(self.internal_failure(err));
                }
                Err(interrupt)
            }
        }
    }

    /// Tracker corruption cannot be recovered from inside a body.
    fn internal_failure(&mut self, err: EngineError) -> Interrupt {
        let message = err.to_string();
        self.pending_fatal = Some(message.clone());
        Interrupt::Fatal(message)
    }

    // ------------------------------------------------------------------------
    // Checks
    // ------------------------------------------------------------------------

    /// Announces a check before its expression is evaluated, so anything
    /// raised while evaluating is attributed to it.
    pub fn begin_assertion(&mut self, info: AssertionInfo) {
        self.reporter.assertion_starting(&info);
        self.last_assertion = info;
    }

    /// Records the value of the check announced by
    /// [`begin_assertion`](Self::begin_assertion).
    pub fn conclude(&mut self, value: bool, message: impl Into<String>) -> TestResult {
        let info = self.last_assertion.clone();
        let passed = value != info.disposition.is_false_test();
        let keep_going = info.disposition.should_continue();
        let kind = if passed {
            ResultKind::Ok
        } else {
            ResultKind::ExpressionFailed
        };
        self.assertion_ended(AssertionResult::new(info, kind, message));
        if passed || keep_going {
            Ok(())
        } else {
            Err(Interrupt::AssertionFailed)
        }
    }

    fn evaluate(
        &mut self,
        macro_name: &str,
        location: SourceLocation,
        expression: &str,
        disposition: Disposition,
        value: bool,
    ) -> TestResult {
        self.begin_assertion(AssertionInfo::new(macro_name, location, expression, disposition));
        self.conclude(value, String::new())
    }

    /// Records a check; a failure is counted and execution continues.
    pub fn check(&mut self, location: SourceLocation, expression: &str, value: bool) -> bool {
        // continue-on-failure checks never interrupt
        let _ = self.evaluate("CHECK", location, expression, Disposition::ContinueOnFailure, value);
        value
    }

    /// Records a check; a failure leaves the current scope.
    pub fn require(&mut self, location: SourceLocation, expression: &str, value: bool) -> TestResult {
        self.evaluate("REQUIRE", location, expression, Disposition::Normal, value)
    }

    pub fn check_false(&mut self, location: SourceLocation, expression: &str, value: bool) -> bool {
        let _ = self.evaluate(
            "CHECK_FALSE",
            location,
            expression,
            Disposition::FalseIsOkContinue,
            value,
        );
        !value
    }

    pub fn require_false(
        &mut self,
        location: SourceLocation,
        expression: &str,
        value: bool,
    ) -> TestResult {
        self.evaluate("REQUIRE_FALSE", location, expression, Disposition::FalseIsOk, value)
    }

    /// Records an explicit pass.
    pub fn succeed(&mut self, location: SourceLocation, message: impl Into<String>) {
        let info = AssertionInfo::new("SUCCEED", location, "", Disposition::ContinueOnFailure);
        self.begin_assertion(info.clone());
        self.assertion_ended(AssertionResult::new(info, ResultKind::Ok, message));
    }

    /// Records an explicit failure and leaves the current scope.
    pub fn fail(&mut self, location: SourceLocation, message: impl Into<String>) -> TestResult {
        let info = AssertionInfo::new("FAIL", location, "", Disposition::Normal);
        self.begin_assertion(info.clone());
        self.assertion_ended(AssertionResult::new(info, ResultKind::ExplicitFailure, message));
        Err(Interrupt::AssertionFailed)
    }

    /// Records an explicit failure and keeps going.
    pub fn fail_check(&mut self, location: SourceLocation, message: impl Into<String>) {
        let info = AssertionInfo::new("FAIL_CHECK", location, "", Disposition::ContinueOnFailure);
        self.begin_assertion(info.clone());
        self.assertion_ended(AssertionResult::new(info, ResultKind::ExplicitFailure, message));
    }

    /// Reports a warning. Warnings are never counted.
    pub fn warn(&mut self, location: SourceLocation, message: impl Into<String>) {
        let info = AssertionInfo::new("WARN", location, "", Disposition::ContinueOnFailure);
        self.begin_assertion(info.clone());
        self.assertion_ended(AssertionResult::new(info, ResultKind::Warning, message));
    }

    /// Attaches a message to the next reported outcome.
    pub fn info(&mut self, location: SourceLocation, message: impl Into<String>) {
        self.messages.push(MessageInfo::info(location, message));
    }

    /// Requests the end of the whole run. Return the result from the body:
    /// `return Err(ctx.fatal("..."))`.
    pub fn fatal(&mut self, message: impl Into<String>) -> Interrupt {
        let message = message.into();
        self.pending_fatal = Some(message.clone());
        Interrupt::Fatal(message)
    }

    // ------------------------------------------------------------------------
    // Generators
    // ------------------------------------------------------------------------

    /// The value of the generator declared at `location` for the current
    /// combination. The number of values is fixed on first use.
    pub fn generate<T: Clone>(&mut self, location: SourceLocation, values: &[T]) -> Result<T, Interrupt> {
        let Some(last) = values.len().checked_sub(1) else {
            return Err(Interrupt::exception(format!(
                "generator at {} has no values",
                location
            )));
        };
        let key = ScopeKey::new("generator", location);
        let index = self.generators.index(&key, values.len());
        Ok(values[index.min(last)].clone())
    }

    // ------------------------------------------------------------------------
    // Environment
    // ------------------------------------------------------------------------

    /// Standard output as seen by the test; captured when redirection is on.
    pub fn cout(&self) -> SinkWriter {
        self.sinks.writer(Stream::Out)
    }

    pub fn cerr(&self) -> SinkWriter {
        self.sinks.writer(Stream::Err)
    }

    /// Per-invocation random source, re-seeded with the run seed before
    /// every pass.
    pub fn rng(&mut self) -> &mut Xoshiro256StarStar {
        &mut self.rng
    }

    pub fn current_test_name(&self) -> Option<&str> {
        self.active_test.as_ref().map(|info| info.name.as_str())
    }

    pub fn last_result(&self) -> Option<&AssertionResult> {
        self.last_result.as_ref()
    }
}
