//! Run configuration.
//!
//! The engine only ever reads configuration through the [`Configuration`]
//! trait. [`RunConfig`] is the stock implementation: a plain serde struct
//! that can be built in code, loaded from a YAML or JSON file, or produced
//! from command-line arguments (see [`crate::cli`]).

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::errors::EngineError;

/// Order in which matching test cases are run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TestOrder {
    #[default]
    Declared,
    Lexical,
    Random,
}

/// Read-only view of the settings the engine consults.
pub trait Configuration {
    fn name(&self) -> &str;
    /// Stop running new test cases once this many assertions failed.
    fn abort_after(&self) -> Option<usize>;
    /// 0 means seed from the clock.
    fn rng_seed(&self) -> u32;
    fn should_redirect_std_out(&self) -> bool;
    /// Skip test cases tagged `[!throws]`.
    fn no_throw(&self) -> bool;
    fn warn_about_missing_assertions(&self) -> bool;
    fn test_filters(&self) -> &[String];
    fn order(&self) -> TestOrder;
    fn filenames_as_tags(&self) -> bool;
    fn list_only(&self) -> bool;
    fn reporter_name(&self) -> &str;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub name: String,
    pub abort_after: Option<usize>,
    pub rng_seed: u32,
    pub redirect_std_out: bool,
    pub no_throw: bool,
    pub warn_missing_assertions: bool,
    pub filters: Vec<String>,
    pub order: TestOrder,
    pub filenames_as_tags: bool,
    pub list_only: bool,
    pub reporter: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            name: "all tests".to_string(),
            abort_after: None,
            rng_seed: 0,
            redirect_std_out: false,
            no_throw: false,
            warn_missing_assertions: false,
            filters: Vec::new(),
            order: TestOrder::Declared,
            filenames_as_tags: false,
            list_only: false,
            reporter: "console".to_string(),
        }
    }
}

impl RunConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self, EngineError> {
        serde_yaml::from_str(text).map_err(|e| EngineError::ConfigParse {
            path: "<inline>".to_string(),
            message: e.to_string(),
        })
    }

    /// Loads a configuration file; `.json` files are parsed as JSON, anything
    /// else as YAML.
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let display = path.display().to_string();
        let text = fs::read_to_string(path).map_err(|source| EngineError::ConfigIo {
            path: display.clone(),
            source,
        })?;
        let is_json = path
            .extension()
            .map(|ext| ext == "json")
            .unwrap_or(false);
        let parsed = if is_json {
            serde_json::from_str(&text).map_err(|e| e.to_string())
        } else {
            serde_yaml::from_str(&text).map_err(|e| e.to_string())
        };
        parsed.map_err(|message| EngineError::ConfigParse {
            path: display,
            message,
        })
    }

    pub fn with_abort_after(mut self, count: usize) -> Self {
        self.abort_after = Some(count);
        self
    }

    pub fn with_seed(mut self, seed: u32) -> Self {
        self.rng_seed = seed;
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filters.push(filter.into());
        self
    }

    pub fn with_redirect(mut self, redirect: bool) -> Self {
        self.redirect_std_out = redirect;
        self
    }

    pub fn with_no_throw(mut self, no_throw: bool) -> Self {
        self.no_throw = no_throw;
        self
    }

    pub fn with_missing_assertion_warnings(mut self, warn: bool) -> Self {
        self.warn_missing_assertions = warn;
        self
    }

    pub fn with_order(mut self, order: TestOrder) -> Self {
        self.order = order;
        self
    }
}

impl Configuration for RunConfig {
    fn name(&self) -> &str {
        &self.name
    }

    fn abort_after(&self) -> Option<usize> {
        self.abort_after.filter(|count| *count > 0)
    }

    fn rng_seed(&self) -> u32 {
        self.rng_seed
    }

    fn should_redirect_std_out(&self) -> bool {
        self.redirect_std_out
    }

    fn no_throw(&self) -> bool {
        self.no_throw
    }

    fn warn_about_missing_assertions(&self) -> bool {
        self.warn_missing_assertions
    }

    fn test_filters(&self) -> &[String] {
        &self.filters
    }

    fn order(&self) -> TestOrder {
        self.order
    }

    fn filenames_as_tags(&self) -> bool {
        self.filenames_as_tags
    }

    fn list_only(&self) -> bool {
        self.list_only
    }

    fn reporter_name(&self) -> &str {
        &self.reporter
    }
}
