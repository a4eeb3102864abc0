//! Sectional Error Handling
//!
//! Two kinds of failure flow through the engine and they never mix:
//!
//! - [`EngineError`] is the crate error. It describes a broken precondition
//!   of the engine itself (an illogical tracker transition, a duplicate test
//!   name, a malformed filter, an unreadable configuration). It is a
//!   `miette` diagnostic so callers can render it with help text.
//! - [`Interrupt`] is the outcome of one test-body invocation that did not
//!   run to completion. It is threaded through [`TestResult`] from the
//!   innermost section up to the test-case boundary, where it is absorbed.

use miette::Diagnostic;
use std::fmt;
use thiserror::Error;

use crate::tracker::RunState;

// ============================================================================
// ENGINE ERRORS
// ============================================================================

/// Unified error type for every engine failure mode.
#[derive(Debug, Error, Diagnostic)]
pub enum EngineError {
    #[error("Illogical tracker state: cannot {operation} scope '{scope}' while {state:?}")]
    #[diagnostic(
        code(sectional::tracker::illogical_state),
        help("scope discovery must be deterministic across passes")
    )]
    IllogicalTrackerState {
        operation: &'static str,
        scope: String,
        state: RunState,
    },

    #[error("No tracker run is active")]
    #[diagnostic(code(sectional::tracker::no_run))]
    NoActiveRun,

    #[error("Test case '{name}' is registered twice (first at {first}, again at {second})")]
    #[diagnostic(
        code(sectional::registry::duplicate),
        help("test case names must be unique within a registry")
    )]
    DuplicateTestCase {
        name: String,
        first: String,
        second: String,
    },

    #[error("Invalid test filter '{pattern}': {reason}")]
    #[diagnostic(code(sectional::filter::invalid))]
    InvalidFilter { pattern: String, reason: String },

    #[error("No reporter registered with name: '{name}'")]
    #[diagnostic(code(sectional::reporter::unknown), help("available reporters: console"))]
    UnknownReporter { name: String },

    #[error("Failed to read configuration {path}")]
    #[diagnostic(code(sectional::config::io))]
    ConfigIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration {path}: {message}")]
    #[diagnostic(code(sectional::config::parse))]
    ConfigParse { path: String, message: String },

    #[error("Failed to write the test listing")]
    #[diagnostic(code(sectional::session::listing))]
    Listing {
        #[source]
        source: std::io::Error,
    },

    #[error("Fatal condition terminated the run: {message}")]
    #[diagnostic(code(sectional::run::fatal))]
    FatalCondition { message: String },
}

impl EngineError {
    pub fn illogical(operation: &'static str, scope: impl fmt::Display, state: RunState) -> Self {
        EngineError::IllogicalTrackerState {
            operation,
            scope: scope.to_string(),
            state,
        }
    }

    pub fn invalid_filter(pattern: &str, reason: impl Into<String>) -> Self {
        EngineError::InvalidFilter {
            pattern: pattern.to_string(),
            reason: reason.into(),
        }
    }
}

// ============================================================================
// INVOCATION OUTCOME
// ============================================================================

/// Why a test body (or one of its sections) stopped before its end.
///
/// Any `std::error::Error` converts into `Interrupt::Exception`, so `?`
/// works on ordinary fallible calls inside a test body. `Interrupt` itself
/// must not implement `Error` or the blanket conversion would overlap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interrupt {
    /// A check with `Normal` disposition failed. The failure is already
    /// recorded; unwinding only has to leave the current scope.
    AssertionFailed,
    /// An error or panic escaped the checked region.
    Exception(String),
    /// An unrecoverable fault. Ends the whole run.
    Fatal(String),
}

impl Interrupt {
    pub fn exception(message: impl Into<String>) -> Self {
        Interrupt::Exception(message.into())
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Interrupt::Fatal(message.into())
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Interrupt::Fatal(_))
    }
}

impl fmt::Display for Interrupt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Interrupt::AssertionFailed => write!(f, "assertion failed"),
            Interrupt::Exception(msg) => write!(f, "unexpected exception: {}", msg),
            Interrupt::Fatal(msg) => write!(f, "fatal condition: {}", msg),
        }
    }
}

impl<E> From<E> for Interrupt
where
    E: std::error::Error,
{
    fn from(err: E) -> Self {
        Interrupt::Exception(err.to_string())
    }
}

/// Result type returned by test bodies and section closures.
pub type TestResult = Result<(), Interrupt>;

#[cfg(test)]
mod tests {
    use super::*;
    use miette::Report;

    #[test]
    fn parse_errors_become_exceptions() {
        fn body() -> TestResult {
            let _ = "x".parse::<i32>()?;
            Ok(())
        }
        match body() {
            Err(Interrupt::Exception(msg)) => assert!(msg.contains("invalid digit")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn diagnostics_carry_code_and_help() {
        let err = EngineError::DuplicateTestCase {
            name: "vectors".into(),
            first: "a.rs:1".into(),
            second: "b.rs:2".into(),
        };
        assert!(err.to_string().contains("first at a.rs:1"));
        let rendered = format!("{:?}", Report::new(err));
        assert!(rendered.contains("sectional::registry::duplicate"));
    }

    #[test]
    fn fatal_interrupts_are_flagged() {
        assert!(Interrupt::fatal("segfault").is_fatal());
        assert!(!Interrupt::exception("boom").is_fatal());
        assert_eq!(
            Interrupt::exception("boom").to_string(),
            "unexpected exception: boom"
        );
    }
}
