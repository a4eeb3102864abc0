//! Human-readable console output.
//!
//! Passing checks are silent. Failures and warnings are printed with the
//! test case and section path they occurred in, followed by the expression,
//! the message and any pending info messages. The run ends with a summary
//! line.

use std::io::Write;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::assertion::ResultKind;
use crate::registry::TestCaseInfo;
use crate::reporter::{
    AssertionStats, Reporter, SectionInfo, SectionStats, TestCaseStats, TestRunStats,
};
use crate::totals::{Counts, Totals};

const RULE: &str =
    "-------------------------------------------------------------------------------";

pub struct ConsoleReporter<W: WriteColor = StandardStream> {
    out: W,
    current_test: Option<TestCaseInfo>,
    sections: Vec<SectionInfo>,
    header_printed: bool,
}

impl ConsoleReporter<StandardStream> {
    /// Writes to stdout, with colour only when stdout is a terminal.
    pub fn stdout() -> Self {
        let choice = if atty::is(atty::Stream::Stdout) {
            ColorChoice::Auto
        } else {
            ColorChoice::Never
        };
        Self::new(StandardStream::stdout(choice))
    }
}

impl<W: WriteColor> ConsoleReporter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            current_test: None,
            sections: Vec::new(),
            header_printed: false,
        }
    }

    pub fn writer(&self) -> &W {
        &self.out
    }

    fn colored(&mut self, color: Color, bold: bool, text: &str) {
        let _ = self
            .out
            .set_color(ColorSpec::new().set_fg(Some(color)).set_bold(bold));
        let _ = write!(self.out, "{}", text);
        let _ = self.out.reset();
    }

    fn line(&mut self, text: &str) {
        let _ = writeln!(self.out, "{}", text);
    }

    /// Test case name and section path, printed once per test case before
    /// its first reported problem.
    fn print_header(&mut self) {
        if self.header_printed {
            return;
        }
        self.header_printed = true;
        let Some(test) = self.current_test.clone() else {
            return;
        };
        self.line(RULE);
        self.line(&test.name);
        // the first section is the test case itself
        let path: Vec<String> = self
            .sections
            .iter()
            .skip(1)
            .map(|section| format!("  {}", section.name))
            .collect();
        for entry in path {
            self.line(&entry);
        }
        self.line(RULE);
        self.line(&test.location.to_string());
        self.line("...............................................................................");
        self.line("");
    }

    fn print_summary(&mut self, totals: &Totals) {
        if totals.test_cases.total() == 0 {
            self.colored(Color::Yellow, false, "No tests ran\n");
            return;
        }
        if totals.assertions.failed == 0 && totals.test_cases.failed == 0 {
            let text = format!(
                "All tests passed ({} in {})\n",
                pluralise(totals.assertions.passed, "assertion"),
                pluralise(totals.test_cases.passed, "test case"),
            );
            self.colored(Color::Green, true, &text);
            return;
        }
        let test_cases = summary_row("test cases", &totals.test_cases);
        let assertions = summary_row("assertions", &totals.assertions);
        self.colored(Color::Red, false, &format!("{}\n{}\n", test_cases, assertions));
    }
}

fn pluralise(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("{} {}", count, noun)
    } else {
        format!("{} {}s", count, noun)
    }
}

fn summary_row(label: &str, counts: &Counts) -> String {
    let mut row = format!(
        "{}: {} | {} passed | {} failed",
        label,
        counts.total(),
        counts.passed,
        counts.failed
    );
    if counts.failed_but_ok > 0 {
        row.push_str(&format!(" | {} failed as expected", counts.failed_but_ok));
    }
    row
}

impl<W: WriteColor> Reporter for ConsoleReporter<W> {
    fn no_matching_test_cases(&mut self, filters: &str) {
        self.line(&format!("No test cases matched '{}'", filters));
    }

    fn test_case_starting(&mut self, info: &TestCaseInfo) {
        self.current_test = Some(info.clone());
        self.sections.clear();
        self.header_printed = false;
    }

    fn section_starting(&mut self, info: &SectionInfo) {
        self.sections.push(info.clone());
    }

    fn assertion_ended(&mut self, stats: &AssertionStats) -> bool {
        let result = &stats.result;
        if result.kind == ResultKind::Ok || result.kind == ResultKind::Info {
            return true;
        }
        self.print_header();

        self.line(&format!("{}:", result.location()));
        let (label, color) = match result.kind {
            ResultKind::Warning => ("warning:", Color::Yellow),
            _ => ("FAILED:", Color::Red),
        };
        self.colored(color, true, label);
        self.line("");

        if !result.info.expression.is_empty() {
            let text = format!("  {}( {} )", result.info.macro_name, result.info.expression);
            self.colored(Color::Cyan, false, &text);
            self.line("");
        }
        match result.kind {
            ResultKind::ThrewException => {
                self.line("due to unexpected exception with message:");
                self.line(&format!("  {}", result.message));
            }
            ResultKind::FatalCondition => {
                self.line("due to a fatal error condition:");
                self.line(&format!("  {}", result.message));
            }
            _ if !result.message.is_empty() => {
                self.line("with message:");
                self.line(&format!("  {}", result.message));
            }
            _ => {}
        }
        if !stats.info_messages.is_empty() {
            self.line("with messages:");
            let messages: Vec<String> = stats
                .info_messages
                .iter()
                .map(|m| format!("  {}", m.message))
                .collect();
            for message in messages {
                self.line(&message);
            }
        }
        self.line("");
        true
    }

    fn section_ended(&mut self, stats: &SectionStats) {
        if stats.missing_assertions {
            self.print_header();
            let text = format!("No assertions in section '{}'\n\n", stats.section.name);
            self.colored(Color::Yellow, false, &text);
        }
        self.sections.pop();
    }

    fn test_case_ended(&mut self, stats: &TestCaseStats) {
        if !stats.totals.assertions.all_ok() && !stats.std_out.is_empty() {
            self.line("captured stdout:");
            self.line(stats.std_out.trim_end());
            self.line("");
        }
        if !stats.totals.assertions.all_ok() && !stats.std_err.is_empty() {
            self.line("captured stderr:");
            self.line(stats.std_err.trim_end());
            self.line("");
        }
        self.current_test = None;
    }

    fn test_run_ended(&mut self, stats: &TestRunStats) {
        self.line(&"=".repeat(RULE.len()));
        self.print_summary(&stats.totals);
        if stats.aborting {
            self.colored(Color::Yellow, false, "Run aborted after reaching the failure limit\n");
        }
        let _ = self.out.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assertion::{AssertionInfo, AssertionResult, Disposition};
    use crate::location::SourceLocation;
    use crate::reporter::TestRunInfo;
    use termcolor::Buffer;

    fn output(reporter: &ConsoleReporter<Buffer>) -> String {
        String::from_utf8_lossy(reporter.writer().as_slice()).into_owned()
    }

    fn failed_check() -> AssertionStats {
        let info = AssertionInfo::new(
            "CHECK",
            SourceLocation::new("vector.rs", 12),
            "v.len() == 10",
            Disposition::ContinueOnFailure,
        );
        AssertionStats {
            result: AssertionResult::new(info, ResultKind::ExpressionFailed, ""),
            info_messages: Vec::new(),
            totals: Totals::default(),
        }
    }

    #[test]
    fn failures_are_printed_with_their_section_path() {
        let mut reporter = ConsoleReporter::new(Buffer::no_color());
        let test = TestCaseInfo::new("vectors", "", SourceLocation::new("vector.rs", 3));
        reporter.test_case_starting(&test);
        reporter.section_starting(&SectionInfo::new("vectors", SourceLocation::new("vector.rs", 3)));
        reporter.section_starting(&SectionInfo::new("resizing", SourceLocation::new("vector.rs", 9)));
        reporter.assertion_ended(&failed_check());

        let text = output(&reporter);
        assert!(text.contains("vectors\n  resizing\n"));
        assert!(text.contains("vector.rs:12:"));
        assert!(text.contains("FAILED:"));
        assert!(text.contains("CHECK( v.len() == 10 )"));
    }

    #[test]
    fn summary_reports_all_passed() {
        let mut reporter = ConsoleReporter::new(Buffer::no_color());
        let mut totals = Totals::default();
        totals.assertions.passed = 3;
        totals.test_cases.passed = 1;
        reporter.test_run_ended(&TestRunStats {
            run: TestRunInfo { name: "run".into() },
            totals,
            aborting: false,
        });
        assert!(output(&reporter).contains("All tests passed (3 assertions in 1 test case)"));
    }

    #[test]
    fn summary_lists_failures() {
        let mut reporter = ConsoleReporter::new(Buffer::no_color());
        let mut totals = Totals::default();
        totals.assertions = Counts::new(4, 1, 2);
        totals.test_cases = Counts::new(1, 1, 1);
        reporter.test_run_ended(&TestRunStats {
            run: TestRunInfo { name: "run".into() },
            totals,
            aborting: true,
        });
        let text = output(&reporter);
        assert!(text.contains("test cases: 3 | 1 passed | 1 failed | 1 failed as expected"));
        assert!(text.contains("assertions: 7 | 4 passed | 1 failed | 2 failed as expected"));
        assert!(text.contains("Run aborted"));
    }
}
