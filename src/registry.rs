//! Explicit test registry.
//!
//! Test bodies are registered by plain function calls at start-up: each
//! entry pairs a [`TestCaseInfo`] (stable identity and metadata) with the
//! closure to invoke. Nothing is discovered by reflection.

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256StarStar;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::rc::Rc;

use crate::config::TestOrder;
use crate::errors::{EngineError, TestResult};
use crate::location::SourceLocation;
use crate::run::RunContext;

// ============================================================================
// TEST CASE METADATA
// ============================================================================

/// Special behaviour requested through tags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TestProperties {
    /// `[.]`, `[.name]` or `[hide]`: only run when selected explicitly.
    pub hidden: bool,
    /// `[!shouldfail]`: passing is a failure.
    pub should_fail: bool,
    /// `[!mayfail]`: failures are reported but tolerated.
    pub may_fail: bool,
    /// `[!throws]`: the body is known to raise; skipped under `no_throw`.
    pub throws: bool,
}

/// Stable identity and metadata of a registered test case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestCaseInfo {
    pub name: String,
    pub description: String,
    pub tags: BTreeSet<String>,
    pub location: SourceLocation,
    pub properties: TestProperties,
}

impl TestCaseInfo {
    /// Builds the metadata from a tag string such as `"[vector][!mayfail]"`.
    pub fn new(name: impl Into<String>, tags: &str, location: SourceLocation) -> Self {
        let mut info = Self {
            name: name.into(),
            description: String::new(),
            tags: BTreeSet::new(),
            location,
            properties: TestProperties::default(),
        };
        info.set_tags(parse_tags(tags));
        info
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn set_tags(&mut self, tags: BTreeSet<String>) {
        let mut properties = TestProperties::default();
        for tag in &tags {
            let lower = tag.to_lowercase();
            match lower.as_str() {
                "hide" => properties.hidden = true,
                "!shouldfail" => properties.should_fail = true,
                "!mayfail" => properties.may_fail = true,
                "!throws" => properties.throws = true,
                _ if lower.starts_with('.') => properties.hidden = true,
                _ => {}
            }
        }
        self.properties = properties;
        self.tags = tags;
    }

    pub fn is_hidden(&self) -> bool {
        self.properties.hidden
    }

    pub fn expected_to_fail(&self) -> bool {
        self.properties.should_fail
    }

    /// Tolerated failures: `[!mayfail]`, and `[!shouldfail]` whose failures
    /// are the expected outcome.
    pub fn ok_to_fail(&self) -> bool {
        self.properties.should_fail || self.properties.may_fail
    }

    pub fn throws(&self) -> bool {
        self.properties.throws
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }

    pub fn tags_as_string(&self) -> String {
        self.tags.iter().map(|t| format!("[{}]", t)).collect()
    }
}

impl fmt::Display for TestCaseInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.tags.is_empty() {
            write!(f, " {}", self.tags_as_string())?;
        }
        Ok(())
    }
}

/// Splits `"[a][b]"` into `{"a", "b"}`. Text outside brackets is ignored.
pub fn parse_tags(text: &str) -> BTreeSet<String> {
    let mut tags = BTreeSet::new();
    let mut rest = text;
    while let Some(open) = rest.find('[') {
        let after = &rest[open + 1..];
        let Some(close) = after.find(']') else { break };
        let tag = after[..close].trim();
        if !tag.is_empty() {
            tags.insert(tag.to_string());
        }
        rest = &after[close + 1..];
    }
    tags
}

// ============================================================================
// REGISTRY
// ============================================================================

/// Signature of a registered test body.
pub type TestFn = dyn Fn(&mut RunContext) -> TestResult;

/// A registered test: metadata plus the invocation entry point.
#[derive(Clone)]
pub struct TestCase {
    pub info: TestCaseInfo,
    body: Rc<TestFn>,
}

impl TestCase {
    pub fn new(info: TestCaseInfo, body: Rc<TestFn>) -> Self {
        Self { info, body }
    }

    pub fn invoke(&self, ctx: &mut RunContext) -> TestResult {
        (self.body)(ctx)
    }
}

impl fmt::Debug for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestCase").field("info", &self.info).finish()
    }
}

#[derive(Debug, Default, Clone)]
pub struct TestRegistry {
    tests: Vec<TestCase>,
    by_name: HashMap<String, usize>,
}

impl TestRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a test case. Names must be unique: per-test tracking state
    /// is keyed by name.
    pub fn register(&mut self, test: TestCase) -> Result<(), EngineError> {
        if let Some(existing) = self.by_name.get(&test.info.name) {
            return Err(EngineError::DuplicateTestCase {
                name: test.info.name.clone(),
                first: self.tests[*existing].info.location.to_string(),
                second: test.info.location.to_string(),
            });
        }
        self.by_name.insert(test.info.name.clone(), self.tests.len());
        self.tests.push(test);
        Ok(())
    }

    /// Convenience wrapper around [`register`](Self::register).
    pub fn add<F>(
        &mut self,
        name: &str,
        tags: &str,
        location: SourceLocation,
        body: F,
    ) -> Result<(), EngineError>
    where
        F: Fn(&mut RunContext) -> TestResult + 'static,
    {
        self.register(TestCase::new(
            TestCaseInfo::new(name, tags, location),
            Rc::new(body),
        ))
    }

    pub fn tests(&self) -> &[TestCase] {
        &self.tests
    }

    pub fn get(&self, name: &str) -> Option<&TestCase> {
        self.by_name.get(name).map(|index| &self.tests[*index])
    }

    pub fn len(&self) -> usize {
        self.tests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }

    /// Adds a `#<file-stem>` tag to every test.
    pub fn apply_filenames_as_tags(&mut self) {
        for test in &mut self.tests {
            let mut tags = test.info.tags.clone();
            tags.insert(format!("#{}", test.info.location.file_stem()));
            test.info.set_tags(tags);
        }
    }

    /// All tests in the requested order. `Random` shuffles with `seed`, so
    /// the same seed reproduces the same order.
    pub fn sorted(&self, order: TestOrder, seed: u32) -> Vec<TestCase> {
        let mut tests = self.tests.clone();
        match order {
            TestOrder::Declared => {}
            TestOrder::Lexical => tests.sort_by(|a, b| a.info.name.cmp(&b.info.name)),
            TestOrder::Random => {
                let mut rng = Xoshiro256StarStar::seed_from_u64(u64::from(seed));
                tests.shuffle(&mut rng);
            }
        }
        tests
    }
}

/// Registers a test body with the current source location.
///
/// ```rust,ignore
/// test_case!(registry, "vectors grow", "[vector]", |ctx| {
///     require!(ctx, v.is_empty())?;
///     Ok(())
/// })?;
/// ```
#[macro_export]
macro_rules! test_case {
    ($registry:expr, $name:expr, $tags:expr, $body:expr) => {
        $registry.add($name, $tags, $crate::here!(), $body)
    };
    ($registry:expr, $name:expr, $body:expr) => {
        $registry.add($name, "", $crate::here!(), $body)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_: &mut RunContext) -> TestResult {
        Ok(())
    }

    #[test]
    fn tags_set_properties() {
        let info = TestCaseInfo::new("t", "[vector][!mayfail][.slow]", SourceLocation::unknown());
        assert!(info.is_hidden());
        assert!(info.ok_to_fail());
        assert!(!info.expected_to_fail());
        assert!(info.has_tag("VECTOR"));
        assert_eq!(info.tags_as_string(), "[!mayfail][.slow][vector]");
    }

    #[test]
    fn should_fail_implies_ok_to_fail() {
        let info = TestCaseInfo::new("t", "[!shouldfail]", SourceLocation::unknown());
        assert!(info.expected_to_fail());
        assert!(info.ok_to_fail());
    }

    #[test]
    fn throws_tag_is_recognised() {
        let info = TestCaseInfo::new("t", "[!throws][io]", SourceLocation::unknown());
        assert!(info.throws());
        assert!(!info.ok_to_fail());
        assert!(!TestCaseInfo::new("t", "[io]", SourceLocation::unknown()).throws());
    }

    #[test]
    fn parse_tags_ignores_stray_text() {
        let tags = parse_tags("x [a] y [ b ][] [unterminated");
        assert_eq!(tags.into_iter().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut registry = TestRegistry::new();
        registry
            .add("same", "", SourceLocation::new("a.rs", 1), noop)
            .unwrap();
        let err = registry
            .add("same", "", SourceLocation::new("b.rs", 2), noop)
            .unwrap_err();
        assert!(matches!(err, EngineError::DuplicateTestCase { .. }));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn filenames_become_tags() {
        let mut registry = TestRegistry::new();
        registry
            .add("t", "[x]", SourceLocation::new("suite/strings.rs", 1), noop)
            .unwrap();
        registry.apply_filenames_as_tags();
        assert!(registry.get("t").unwrap().info.has_tag("#strings"));
        assert!(registry.get("t").unwrap().info.has_tag("x"));
    }

    #[test]
    fn ordering_is_reproducible() {
        let mut registry = TestRegistry::new();
        for name in ["delta", "alpha", "charlie", "bravo", "echo"] {
            registry
                .add(name, "", SourceLocation::unknown(), noop)
                .unwrap();
        }
        let names = |tests: Vec<TestCase>| -> Vec<String> {
            tests.into_iter().map(|t| t.info.name).collect()
        };
        assert_eq!(
            names(registry.sorted(TestOrder::Declared, 0)),
            vec!["delta", "alpha", "charlie", "bravo", "echo"]
        );
        assert_eq!(
            names(registry.sorted(TestOrder::Lexical, 0)),
            vec!["alpha", "bravo", "charlie", "delta", "echo"]
        );
        let first = names(registry.sorted(TestOrder::Random, 7));
        let second = names(registry.sorted(TestOrder::Random, 7));
        assert_eq!(first, second);
        assert_eq!(first.len(), 5);
    }
}
