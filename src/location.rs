//! Source locations and scope identity.
//!
//! Every trackable scope (test case, section, generator) is identified by a
//! [`ScopeKey`]: its name plus the place in the source it was declared. Two
//! invocations of the same code path yield equal keys, which is what lets the
//! tracker re-associate a node with the scope that created it on an earlier
//! pass.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A call site, usually captured through [`here!`](crate::here).
///
/// The column takes part in equality so that two scopes declared on one
/// line stay distinct. It is not shown by `Display`; 0 means unknown.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceLocation {
    pub file: String,
    pub line: u32,
    #[serde(default)]
    pub column: u32,
}

impl SourceLocation {
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self::at(file, line, 0)
    }

    pub fn at(file: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            file: file.into(),
            line,
            column,
        }
    }

    /// Location used for outcomes that have no call site of their own.
    pub fn unknown() -> Self {
        Self::at(String::new(), 0, 0)
    }

    pub fn is_unknown(&self) -> bool {
        self.file.is_empty() && self.line == 0
    }

    /// File name without directories or extension, used for filename tags.
    pub fn file_stem(&self) -> &str {
        let name = self
            .file
            .rsplit(|c| c == '/' || c == '\\')
            .next()
            .unwrap_or(&self.file);
        match name.rfind('.') {
            Some(dot) => &name[..dot],
            None => name,
        }
    }
}

impl Default for SourceLocation {
    fn default() -> Self {
        Self::unknown()
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unknown() {
            write!(f, "<unknown>")
        } else {
            write!(f, "{}:{}", self.file, self.line)
        }
    }
}

/// Composite identity of a tracked scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScopeKey {
    pub name: String,
    pub location: SourceLocation,
}

impl ScopeKey {
    pub fn new(name: impl Into<String>, location: SourceLocation) -> Self {
        Self {
            name: name.into(),
            location,
        }
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.location)
    }
}

/// Captures the current file, line and column as a [`SourceLocation`].
#[macro_export]
macro_rules! here {
    () => {
        $crate::location::SourceLocation::at(file!(), line!(), column!())
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_stem_strips_directories_and_extension() {
        let loc = SourceLocation::new("tests/suites/vector_tests.rs", 12);
        assert_eq!(loc.file_stem(), "vector_tests");

        let windows = SourceLocation::new(r"C:\work\string.cpp", 3);
        assert_eq!(windows.file_stem(), "string");

        let bare = SourceLocation::new("Makefile", 1);
        assert_eq!(bare.file_stem(), "Makefile");
    }

    #[test]
    fn keys_from_the_same_site_are_equal() {
        let a = ScopeKey::new("section", SourceLocation::new("a.rs", 4));
        let b = ScopeKey::new("section", SourceLocation::new("a.rs", 4));
        let c = ScopeKey::new("section", SourceLocation::new("a.rs", 5));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.to_string(), "section@a.rs:4");
    }

    #[test]
    fn here_captures_this_file() {
        let loc = crate::here!();
        assert!(loc.file.ends_with("location.rs"));
        assert!(loc.line > 0);
        assert!(loc.column > 0);
    }

    #[test]
    fn scopes_on_one_line_get_distinct_keys() {
        let (first, second) = (crate::here!(), crate::here!());
        assert_eq!(first.line, second.line);
        assert_ne!(
            ScopeKey::new("twin", first.clone()),
            ScopeKey::new("twin", second)
        );
        assert_eq!(first.to_string(), format!("{}:{}", first.file, first.line));
    }
}
