//! Command-line entry point for test executables.
//!
//! A test binary registers its tests and hands the registry to [`run`],
//! which parses the arguments, runs the session and returns the exit status.

use clap::Parser;

use crate::registry::TestRegistry;
use crate::session::Session;

pub mod args;

pub use args::SessionArgs;

/// Parses `std::env::args` and runs `registry`.
pub fn run(registry: TestRegistry) -> i32 {
    run_with(registry, SessionArgs::parse())
}

pub fn run_with(registry: TestRegistry, args: SessionArgs) -> i32 {
    match args.into_config() {
        Ok(config) => Session::new(registry).with_config(config).execute(),
        Err(err) => {
            eprintln!("{:?}", miette::Report::new(err));
            i32::MAX
        }
    }
}
