//! Result capture: outcomes, messages and section bookkeeping.

use crate::assertion::{AssertionInfo, AssertionResult, Disposition, ResultKind};
use crate::auditor::AuditSnapshot;
use crate::errors::EngineError;
use crate::location::{ScopeKey, SourceLocation};
use crate::reporter::{AssertionStats, SectionInfo, SectionStats};
use crate::totals::Counts;
use crate::tracker::NodeId;

use super::{RunContext, SectionEndInfo};

impl RunContext {
    /// Counts an outcome, reports it and drops the pending messages if the
    /// reporter consumed them.
    pub(crate) fn assertion_ended(&mut self, result: AssertionResult) {
        if result.kind == ResultKind::Ok {
            self.totals.assertions.passed += 1;
        } else if !result.is_ok() {
            self.totals.assertions.failed += 1;
        }

        let stats = AssertionStats {
            result: result.clone(),
            info_messages: self.messages.clone(),
            totals: self.totals,
        };
        if self.reporter.assertion_ended(&stats) {
            self.messages.clear();
        }

        self.last_assertion = AssertionInfo::new(
            "",
            self.last_assertion.location.clone(),
            "{Unknown expression after the reported line}",
            self.last_assertion.disposition,
        );
        self.last_result = Some(result);
    }

    /// Records an outcome that did not come from a check, attributed to the
    /// most recent assertion site.
    pub(crate) fn record_unexpected(&mut self, kind: ResultKind, message: String) {
        let result = AssertionResult::new(self.last_assertion.clone(), kind, message);
        self.assertion_ended(result);
    }

    // ------------------------------------------------------------------------
    // Sections
    // ------------------------------------------------------------------------

    /// Returns the node for `info` if this pass enters it.
    pub(super) fn section_started(
        &mut self,
        info: &SectionInfo,
    ) -> Result<Option<NodeId>, EngineError> {
        let key = ScopeKey::new(info.name.clone(), info.location.clone());
        let node = self.trackers.acquire(&key)?;
        if !self.trackers.is_open(node) {
            return Ok(None);
        }
        self.active_sections.push(node);
        self.last_assertion.location = info.location.clone();
        self.reporter.section_starting(info);
        Ok(Some(node))
    }

    pub(super) fn section_ended(&mut self, end: SectionEndInfo) -> Result<(), EngineError> {
        self.active_sections.pop();
        self.trackers.close(end.node)?;
        self.report_section_end(end);
        Ok(())
    }

    /// The section was left by an interrupt. The innermost one is failed and
    /// the enclosing ones are closed; reporting waits until the test-case
    /// boundary.
    pub(super) fn section_ended_early(
        &mut self,
        end: SectionEndInfo,
        fatal: bool,
    ) -> Result<(), EngineError> {
        self.active_sections.pop();
        if fatal || self.unfinished_sections.is_empty() {
            self.trackers.fail(end.node);
        } else {
            self.trackers.close(end.node)?;
        }
        self.unfinished_sections.push(end);
        Ok(())
    }

    /// Reports the end of every section left early, innermost first.
    pub(super) fn handle_unfinished_sections(&mut self) {
        let unfinished = std::mem::take(&mut self.unfinished_sections);
        for end in unfinished {
            self.report_section_end(end);
        }
    }

    fn report_section_end(&mut self, end: SectionEndInfo) {
        let mut assertions = self.totals.assertions - end.prev_assertions;
        let missing_assertions = self.test_for_missing_assertions(&mut assertions, end.node);
        self.reporter.section_ended(&SectionStats {
            section: end.section,
            assertions,
            duration_secs: end.duration_secs,
            missing_assertions,
        });
        self.messages.clear();
    }

    /// A leaf scope that recorded nothing counts as one failure when the
    /// configuration asks for it.
    pub(super) fn test_for_missing_assertions(&mut self, assertions: &mut Counts, node: NodeId) -> bool {
        if assertions.total() != 0
            || !self.config.warn_about_missing_assertions()
            || self.trackers.has_children(node)
        {
            return false;
        }
        self.totals.assertions.failed += 1;
        assertions.failed += 1;
        true
    }

    // ------------------------------------------------------------------------
    // Lifecycle audit
    // ------------------------------------------------------------------------

    pub(super) fn audit_lifecycle(&mut self, before: &AuditSnapshot, location: &SourceLocation) {
        let Some(auditor) = self.auditor.as_ref() else {
            return;
        };
        let after = auditor.snapshot();
        let survivors = auditor.survivors(before);

        for survivor in survivors {
            let info = AssertionInfo::new(
                "LEAK_CHECK",
                location.clone(),
                "",
                Disposition::ContinueOnFailure,
            );
            self.assertion_ended(AssertionResult::new(
                info,
                ResultKind::Warning,
                format!("Object still alive after the test: {}", survivor),
            ));
        }

        let leaked = after.live_objects - before.live_objects;
        if leaked != 0 {
            let info = AssertionInfo::new(
                "LEAK_CHECK",
                location.clone(),
                "",
                Disposition::ContinueOnFailure,
            );
            self.assertion_ended(AssertionResult::new(
                info,
                ResultKind::ExplicitFailure,
                format!("Memory leaks detected: {} objects", leaked),
            ));
        }
    }
}
