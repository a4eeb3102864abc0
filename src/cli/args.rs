//! Command-line arguments for a test executable.
//!
//! Uses the `clap` derive API. Every flag overrides the corresponding
//! [`RunConfig`] field; anything not given on the command line keeps the
//! value from `--config` (or the default).

use clap::Parser;
use std::path::PathBuf;

use crate::config::{RunConfig, TestOrder};
use crate::errors::EngineError;

#[derive(Debug, Default, Parser)]
#[command(
    name = "sectional",
    version,
    about = "Runs registered test cases, one leaf section per pass."
)]
pub struct SessionArgs {
    /// Test names, wildcards (`vector*`), tags (`[fast]`) and exclusions (`~[slow]`).
    pub filters: Vec<String>,

    /// Abort after the first failed assertion.
    #[arg(short = 'a', long = "abort")]
    pub abort: bool,

    /// Abort once this many assertions failed.
    #[arg(short = 'x', long = "abort-after", value_name = "N", value_parser = parse_abort_after)]
    pub abort_after: Option<usize>,

    /// Seed for test ordering and the per-test random source; `time` picks one.
    #[arg(long = "rng-seed", value_name = "SEED|time", value_parser = parse_seed)]
    pub rng_seed: Option<u32>,

    /// Order in which test cases run.
    #[arg(long, value_enum)]
    pub order: Option<TestOrder>,

    /// Capture the output of test bodies and attach it to the test case results.
    #[arg(short = 'b', long = "capture")]
    pub capture: bool,

    /// Skip test cases tagged `[!throws]`.
    #[arg(short = 'e', long = "nothrow")]
    pub no_throw: bool,

    /// Count sections and test cases without assertions as failures.
    #[arg(short = 'w', long = "warn-missing")]
    pub warn_missing: bool,

    /// Tag every test case with `#<file name>`.
    #[arg(long = "filenames-as-tags")]
    pub filenames_as_tags: bool,

    /// List matching test cases instead of running them.
    #[arg(short = 'l', long = "list")]
    pub list: bool,

    /// Reporter to use.
    #[arg(short = 'r', long = "reporter", value_name = "NAME")]
    pub reporter: Option<String>,

    /// Name of the run, used as the test group name.
    #[arg(short = 'n', long = "name")]
    pub name: Option<String>,

    /// YAML or JSON file with base settings.
    #[arg(long = "config", value_name = "PATH")]
    pub config: Option<PathBuf>,
}

fn parse_seed(text: &str) -> Result<u32, String> {
    if text.eq_ignore_ascii_case("time") {
        return Ok(0);
    }
    text.parse::<u32>()
        .map_err(|_| format!("'{}' is neither a number nor 'time'", text))
}

fn parse_abort_after(text: &str) -> Result<usize, String> {
    match text.parse::<usize>() {
        Ok(0) => Err("the abort threshold must be at least 1".to_string()),
        Ok(count) => Ok(count),
        Err(_) => Err(format!("'{}' is not a failure count", text)),
    }
}

impl SessionArgs {
    pub fn into_config(self) -> Result<RunConfig, EngineError> {
        let mut config = match &self.config {
            Some(path) => RunConfig::load(path)?,
            None => RunConfig::default(),
        };
        config.filters.extend(self.filters);
        if self.abort {
            config.abort_after = Some(1);
        }
        if let Some(count) = self.abort_after {
            config.abort_after = Some(count);
        }
        if let Some(seed) = self.rng_seed {
            config.rng_seed = seed;
        }
        if let Some(order) = self.order {
            config.order = order;
        }
        config.redirect_std_out |= self.capture;
        config.no_throw |= self.no_throw;
        config.warn_missing_assertions |= self.warn_missing;
        config.filenames_as_tags |= self.filenames_as_tags;
        config.list_only |= self.list;
        if let Some(reporter) = self.reporter {
            config.reporter = reporter;
        }
        if let Some(name) = self.name {
            config.name = name;
        }
        Ok(config)
    }
}
