//! Matcher kinds and their compiled patterns.
//!
//! `CompiledPattern::compile` and `CompiledPattern::matches` are the only two
//! places that know about individual kinds. Adding a kind means extending
//! `MatcherKind` and both of those matches.

use super::field::Field;
use super::xml::{self, XmlElement};
use crate::error::ConfigurationError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json_path::JsonPath;
use std::fmt;
use std::sync::Arc;

/// The strategies usable on a single request field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatcherKind {
    Exact,
    Xml,
    Xpath,
    Json,
    JsonPath,
    Regex,
    Glob,
}

impl MatcherKind {
    /// All kinds, in wire slot order.
    pub const ALL: [MatcherKind; 7] = [
        MatcherKind::Exact,
        MatcherKind::Xml,
        MatcherKind::Xpath,
        MatcherKind::Json,
        MatcherKind::JsonPath,
        MatcherKind::Regex,
        MatcherKind::Glob,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MatcherKind::Exact => "exact",
            MatcherKind::Xml => "xml",
            MatcherKind::Xpath => "xpath",
            MatcherKind::Json => "json",
            MatcherKind::JsonPath => "jsonpath",
            MatcherKind::Regex => "regex",
            MatcherKind::Glob => "glob",
        }
    }
}

impl fmt::Display for MatcherKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated pattern ready for per-request evaluation.
#[derive(Debug, Clone)]
pub enum CompiledPattern {
    Exact(String),
    Xml { source: String, tree: XmlElement },
    Xpath(String),
    Json {
        source: String,
        value: serde_json::Value,
    },
    JsonPath { source: String, path: JsonPath },
    Regex(Arc<Regex>),
    Glob { source: String, regex: Arc<Regex> },
}

impl CompiledPattern {
    /// Compile one (kind, pattern) entry of a field matcher.
    pub fn compile(
        field: Field,
        kind: MatcherKind,
        pattern: &str,
    ) -> Result<Self, ConfigurationError> {
        match kind {
            MatcherKind::Exact => Ok(CompiledPattern::Exact(pattern.to_string())),
            MatcherKind::Xml => {
                let tree = xml::parse_tree(pattern).map_err(|message| {
                    ConfigurationError::InvalidXml {
                        field,
                        pattern: pattern.to_string(),
                        message,
                    }
                })?;
                Ok(CompiledPattern::Xml {
                    source: pattern.to_string(),
                    tree,
                })
            }
            MatcherKind::Xpath => {
                let invalid = |message: String| ConfigurationError::InvalidXPath {
                    field,
                    expression: pattern.to_string(),
                    message,
                };
                match sxd_xpath::Factory::new().build(pattern) {
                    Ok(Some(_)) => {}
                    Ok(None) => return Err(invalid("empty expression".to_string())),
                    Err(e) => return Err(invalid(e.to_string())),
                }
                // No namespace context is ever bound, and sxd-xpath panics on
                // an unresolved prefix during evaluation
                if let Some(prefix) = namespace_prefix(pattern) {
                    return Err(invalid(format!("undeclared namespace prefix {prefix:?}")));
                }
                Ok(CompiledPattern::Xpath(pattern.to_string()))
            }
            MatcherKind::Json => {
                let value = serde_json::from_str(pattern).map_err(|source| {
                    ConfigurationError::InvalidJson {
                        field,
                        pattern: pattern.to_string(),
                        source,
                    }
                })?;
                Ok(CompiledPattern::Json {
                    source: pattern.to_string(),
                    value,
                })
            }
            MatcherKind::JsonPath => {
                let path = JsonPath::parse(pattern).map_err(|e| {
                    ConfigurationError::InvalidJsonPath {
                        field,
                        expression: pattern.to_string(),
                        message: e.to_string(),
                    }
                })?;
                Ok(CompiledPattern::JsonPath {
                    source: pattern.to_string(),
                    path,
                })
            }
            MatcherKind::Regex => {
                let regex = Regex::new(pattern).map_err(|source| {
                    ConfigurationError::InvalidRegex {
                        field,
                        kind,
                        pattern: pattern.to_string(),
                        source,
                    }
                })?;
                Ok(CompiledPattern::Regex(Arc::new(regex)))
            }
            MatcherKind::Glob => {
                let regex = Regex::new(&glob_to_regex(pattern)).map_err(|source| {
                    ConfigurationError::InvalidRegex {
                        field,
                        kind,
                        pattern: pattern.to_string(),
                        source,
                    }
                })?;
                Ok(CompiledPattern::Glob {
                    source: pattern.to_string(),
                    regex: Arc::new(regex),
                })
            }
        }
    }

    pub fn kind(&self) -> MatcherKind {
        match self {
            CompiledPattern::Exact(_) => MatcherKind::Exact,
            CompiledPattern::Xml { .. } => MatcherKind::Xml,
            CompiledPattern::Xpath(_) => MatcherKind::Xpath,
            CompiledPattern::Json { .. } => MatcherKind::Json,
            CompiledPattern::JsonPath { .. } => MatcherKind::JsonPath,
            CompiledPattern::Regex(_) => MatcherKind::Regex,
            CompiledPattern::Glob { .. } => MatcherKind::Glob,
        }
    }

    /// The pattern text as it was configured.
    pub fn source(&self) -> &str {
        match self {
            CompiledPattern::Exact(source)
            | CompiledPattern::Xpath(source)
            | CompiledPattern::Xml { source, .. }
            | CompiledPattern::Json { source, .. }
            | CompiledPattern::JsonPath { source, .. }
            | CompiledPattern::Glob { source, .. } => source,
            CompiledPattern::Regex(regex) => regex.as_str(),
        }
    }

    /// Evaluate the pattern against a candidate value.
    pub fn matches(&self, candidate: &str) -> bool {
        match self {
            CompiledPattern::Exact(expected) => candidate == expected,
            CompiledPattern::Xml { tree, .. } => {
                xml::parse_tree(candidate).is_ok_and(|actual| actual == *tree)
            }
            CompiledPattern::Xpath(expression) => xpath_selects(candidate, expression),
            CompiledPattern::Json { value, .. } => {
                serde_json::from_str::<serde_json::Value>(candidate)
                    .is_ok_and(|actual| actual == *value)
            }
            CompiledPattern::JsonPath { path, .. } => {
                serde_json::from_str::<serde_json::Value>(candidate)
                    .is_ok_and(|actual| !path.query(&actual).is_empty())
            }
            CompiledPattern::Regex(regex) => regex.is_match(candidate),
            CompiledPattern::Glob { regex, .. } => regex.is_match(candidate),
        }
    }
}

/// Translate a shell-style wildcard into an anchored regex.
///
/// `*` matches any run of characters, `?` exactly one; everything else is
/// literal.
fn glob_to_regex(glob: &str) -> String {
    let mut out = String::with_capacity(glob.len() + 8);
    out.push_str("(?s)^");
    let mut literal = String::new();
    for c in glob.chars() {
        match c {
            '*' | '?' => {
                out.push_str(&regex::escape(&literal));
                literal.clear();
                out.push_str(if c == '*' { ".*" } else { "." });
            }
            _ => literal.push(c),
        }
    }
    out.push_str(&regex::escape(&literal));
    out.push('$');
    out
}

/// The first `prefix:` qualifier in an XPath expression, outside string
/// literals. Axis separators (`::`) are not prefixes.
fn namespace_prefix(expression: &str) -> Option<&str> {
    let bytes = expression.as_bytes();
    let is_name = |b: u8| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b'.');
    let mut quote = None;
    let mut start = None;

    for (i, &b) in bytes.iter().enumerate() {
        if let Some(q) = quote {
            if b == q {
                quote = None;
            }
            continue;
        }
        match b {
            b'\'' | b'"' => {
                quote = Some(b);
                start = None;
            }
            b':' => {
                let prev_colon = i > 0 && bytes[i - 1] == b':';
                let next = bytes.get(i + 1).copied();
                let next_ok =
                    next.is_some_and(|n| n.is_ascii_alphabetic() || matches!(n, b'_' | b'*'));
                if let (Some(s), false, true) = (start, prev_colon, next_ok) {
                    return Some(&expression[s..i]);
                }
                start = None;
            }
            b if is_name(b) => {
                if start.is_none() {
                    start = Some(i);
                }
            }
            _ => start = None,
        }
    }
    None
}

/// Whether an XPath expression selects anything in an XML candidate.
fn xpath_selects(candidate: &str, expression: &str) -> bool {
    use sxd_xpath::{evaluate_xpath, Value};

    let Ok(package) = sxd_document::parser::parse(candidate) else {
        return false;
    };
    let document = package.as_document();

    match evaluate_xpath(&document, expression) {
        Ok(Value::Nodeset(nodes)) => nodes.iter().next().is_some(),
        Ok(Value::Boolean(b)) => b,
        Ok(Value::String(s)) => !s.is_empty(),
        Ok(Value::Number(n)) => n != 0.0 && !n.is_nan(),
        Err(_) => false,
    }
}
