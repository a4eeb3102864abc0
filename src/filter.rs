//! Test selection.
//!
//! A filter expression is a comma separated list of alternatives. Each
//! alternative is a space separated list of patterns that must all match:
//!
//! - `name` or `"quoted name"` matches the test name, `*` is a wildcard
//! - `[tag]` matches a tag; `[.]` matches hidden tests
//! - a leading `~` negates the pattern
//!
//! With no expression at all every non-hidden test is selected. Hidden
//! tests are selected only by an alternative that names them positively.

use regex::Regex;

use crate::errors::EngineError;
use crate::registry::TestCaseInfo;

#[derive(Debug, Clone)]
enum Matcher {
    Name(Regex),
    Tag(Regex),
    Hidden,
}

impl Matcher {
    fn matches(&self, info: &TestCaseInfo) -> bool {
        match self {
            Matcher::Name(re) => re.is_match(&info.name),
            Matcher::Tag(re) => info.tags.iter().any(|tag| re.is_match(tag)),
            Matcher::Hidden => info.is_hidden(),
        }
    }
}

#[derive(Debug, Clone)]
struct Pattern {
    matcher: Matcher,
    negated: bool,
}

impl Pattern {
    fn matches(&self, info: &TestCaseInfo) -> bool {
        self.matcher.matches(info) != self.negated
    }
}

#[derive(Debug, Clone, Default)]
struct Alternative {
    patterns: Vec<Pattern>,
}

impl Alternative {
    fn matches(&self, info: &TestCaseInfo) -> bool {
        if info.is_hidden() && !self.patterns.iter().any(|p| !p.negated) {
            return false;
        }
        self.patterns.iter().all(|p| p.matches(info))
    }
}

/// Parsed selection over registered tests.
#[derive(Debug, Clone)]
pub struct TestFilter {
    alternatives: Vec<Alternative>,
}

impl Default for TestFilter {
    fn default() -> Self {
        Self::all_visible()
    }
}

impl TestFilter {
    /// Every test that is not hidden.
    pub fn all_visible() -> Self {
        Self {
            alternatives: vec![Alternative {
                patterns: vec![Pattern {
                    matcher: Matcher::Hidden,
                    negated: true,
                }],
            }],
        }
    }

    /// Combines several expressions; each contributes its alternatives.
    pub fn from_expressions(expressions: &[String]) -> Result<Self, EngineError> {
        let mut alternatives = Vec::new();
        for expression in expressions {
            alternatives.extend(Self::parse(expression)?.alternatives);
        }
        if alternatives.is_empty() {
            return Ok(Self::all_visible());
        }
        Ok(Self { alternatives })
    }

    pub fn parse(expression: &str) -> Result<Self, EngineError> {
        let mut alternatives = Vec::new();
        for part in split_alternatives(expression) {
            let patterns = parse_alternative(expression, &part)?;
            if !patterns.is_empty() {
                alternatives.push(Alternative { patterns });
            }
        }
        if alternatives.is_empty() {
            return Ok(Self::all_visible());
        }
        Ok(Self { alternatives })
    }

    pub fn matches(&self, info: &TestCaseInfo) -> bool {
        self.alternatives.iter().any(|alt| alt.matches(info))
    }
}

/// Splits on commas that are outside quotes and brackets.
fn split_alternatives(expression: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut depth = 0usize;
    for c in expression.chars() {
        match c {
            '"' => in_quotes = !in_quotes,
            '[' if !in_quotes => depth += 1,
            ']' if !in_quotes => depth = depth.saturating_sub(1),
            ',' if !in_quotes && depth == 0 => {
                parts.push(std::mem::take(&mut current));
                continue;
            }
            _ => {}
        }
        current.push(c);
    }
    parts.push(current);
    parts
}

fn parse_alternative(expression: &str, part: &str) -> Result<Vec<Pattern>, EngineError> {
    let mut patterns = Vec::new();
    let mut chars = part.chars().peekable();
    let mut negated = false;

    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' => {
                chars.next();
            }
            '~' => {
                chars.next();
                negated = true;
            }
            '[' => {
                chars.next();
                let mut tag = String::new();
                loop {
                    match chars.next() {
                        Some(']') => break,
                        Some(ch) => tag.push(ch),
                        None => return Err(EngineError::invalid_filter(expression, "unterminated tag")),
                    }
                }
                let tag = tag.trim();
                let matcher = if tag == "." {
                    Matcher::Hidden
                } else if tag.is_empty() {
                    return Err(EngineError::invalid_filter(expression, "empty tag"));
                } else {
                    Matcher::Tag(wildcard(expression, tag)?)
                };
                patterns.push(Pattern { matcher, negated });
                negated = false;
            }
            '"' => {
                chars.next();
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some(ch) => name.push(ch),
                        None => return Err(EngineError::invalid_filter(expression, "unterminated quote")),
                    }
                }
                patterns.push(Pattern {
                    matcher: Matcher::Name(wildcard(expression, &name)?),
                    negated,
                });
                negated = false;
            }
            _ => {
                let mut name = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch == ' ' || ch == '[' || ch == '"' {
                        break;
                    }
                    name.push(ch);
                    chars.next();
                }
                patterns.push(Pattern {
                    matcher: Matcher::Name(wildcard(expression, &name)?),
                    negated,
                });
                negated = false;
            }
        }
    }

    if negated {
        return Err(EngineError::invalid_filter(expression, "'~' must precede a pattern"));
    }
    Ok(patterns)
}

/// Case-insensitive, anchored match where `*` stands for any text.
fn wildcard(expression: &str, text: &str) -> Result<Regex, EngineError> {
    let body = text
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    Regex::new(&format!("(?i)^{}$", body))
        .map_err(|e| EngineError::invalid_filter(expression, e.to_string()))
}
