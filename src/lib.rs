//! Sectional: a re-entrant test execution engine.
//!
//! A test case is a closure that receives a [`RunContext`]. Nested
//! [`section!`]s and [`generate!`]d values are discovered while the body
//! runs; the engine then invokes the body again and again, entering exactly
//! one new leaf section per pass, until every leaf of every generator
//! combination has run once.

pub use crate::config::{Configuration, RunConfig, TestOrder};
pub use crate::errors::{EngineError, Interrupt, TestResult};
pub use crate::registry::{TestCase, TestCaseInfo, TestRegistry};
pub use crate::reporter::{Reporter, ReporterSet};
pub use crate::run::{RunContext, RunSummary};
pub use crate::session::Session;

pub mod approx;
pub mod assertion;
pub mod auditor;
pub mod cli;
pub mod config;
pub mod errors;
pub mod fatal;
pub mod filter;
pub mod generators;
pub mod location;
pub mod macros;
pub mod output;
pub mod registry;
pub mod reporter;
pub mod reporters;
pub mod run;
pub mod session;
pub mod totals;
pub mod tracker;

/// Everything a test file usually needs.
pub mod prelude {
    pub use crate::approx::Approx;
    pub use crate::errors::{Interrupt, TestResult};
    pub use crate::location::SourceLocation;
    pub use crate::registry::TestRegistry;
    pub use crate::run::RunContext;
    pub use crate::{
        check, check_eq, check_false, fail, fail_check, generate, here, require, require_eq,
        require_false, section, succeed, test_case,
    };
}
