//! Assertion outcomes and the messages attached to them.

use serde::Serialize;
use std::fmt;

use crate::location::SourceLocation;

/// What a single check produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ResultKind {
    Ok,
    Info,
    Warning,
    ExpressionFailed,
    ExplicitFailure,
    ThrewException,
    FatalCondition,
}

impl ResultKind {
    /// `Ok`, `Info` and `Warning` never count as failures.
    pub fn is_ok(self) -> bool {
        matches!(self, ResultKind::Ok | ResultKind::Info | ResultKind::Warning)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ResultKind::Ok => "Ok",
            ResultKind::Info => "Info",
            ResultKind::Warning => "Warning",
            ResultKind::ExpressionFailed => "ExpressionFailed",
            ResultKind::ExplicitFailure => "ExplicitFailure",
            ResultKind::ThrewException => "ThrewException",
            ResultKind::FatalCondition => "FatalCondition",
        }
    }
}

impl fmt::Display for ResultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Call-site policy for a failing check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Disposition {
    /// A failure leaves the current scope (`require!`).
    Normal,
    /// A failure is recorded and execution continues (`check!`).
    ContinueOnFailure,
    /// The expression is expected to be false (`check_false!`, `require_false!`).
    FalseIsOk,
    /// `FalseIsOk` that also continues on failure.
    FalseIsOkContinue,
}

impl Disposition {
    pub fn should_continue(self) -> bool {
        matches!(
            self,
            Disposition::ContinueOnFailure | Disposition::FalseIsOkContinue
        )
    }

    pub fn is_false_test(self) -> bool {
        matches!(self, Disposition::FalseIsOk | Disposition::FalseIsOkContinue)
    }
}

/// Everything known about a check before it is evaluated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssertionInfo {
    pub macro_name: String,
    pub location: SourceLocation,
    pub expression: String,
    pub disposition: Disposition,
}

impl AssertionInfo {
    pub fn new(
        macro_name: impl Into<String>,
        location: SourceLocation,
        expression: impl Into<String>,
        disposition: Disposition,
    ) -> Self {
        Self {
            macro_name: macro_name.into(),
            location,
            expression: expression.into(),
            disposition,
        }
    }
}

/// A finished check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssertionResult {
    pub info: AssertionInfo,
    pub kind: ResultKind,
    pub message: String,
}

impl AssertionResult {
    pub fn new(info: AssertionInfo, kind: ResultKind, message: impl Into<String>) -> Self {
        Self {
            info,
            kind,
            message: message.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.kind.is_ok()
    }

    pub fn succeeded(&self) -> bool {
        self.kind == ResultKind::Ok
    }

    pub fn location(&self) -> &SourceLocation {
        &self.info.location
    }
}

/// A log entry waiting to be attached to the next outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageInfo {
    pub macro_name: String,
    pub location: SourceLocation,
    pub kind: ResultKind,
    pub message: String,
}

impl MessageInfo {
    pub fn info(location: SourceLocation, message: impl Into<String>) -> Self {
        Self {
            macro_name: "INFO".to_string(),
            location,
            kind: ResultKind::Info,
            message: message.into(),
        }
    }
}
