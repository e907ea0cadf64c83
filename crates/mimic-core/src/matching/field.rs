//! Per-field matchers.
//!
//! A field matcher holds zero or more typed patterns for one request attribute.
//! No patterns means the field is unconstrained; otherwise the field is
//! satisfied when any one pattern matches.

use super::kind::{CompiledPattern, MatcherKind};
use crate::error::ConfigurationError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The six request attributes a rule can constrain besides headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Path,
    Method,
    Destination,
    Scheme,
    Query,
    Body,
}

impl Field {
    pub const ALL: [Field; 6] = [
        Field::Path,
        Field::Method,
        Field::Destination,
        Field::Scheme,
        Field::Query,
        Field::Body,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Path => "path",
            Field::Method => "method",
            Field::Destination => "destination",
            Field::Scheme => "scheme",
            Field::Query => "query",
            Field::Body => "body",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Matcher for a single request field.
#[derive(Debug, Clone, Default)]
pub enum FieldMatcher {
    /// No pattern configured: always satisfied.
    #[default]
    Unconstrained,
    /// Satisfied when at least one pattern matches.
    Constrained(Vec<CompiledPattern>),
}

impl FieldMatcher {
    /// Compile the configured (kind, pattern) entries for a field.
    pub fn compile<'a, I>(field: Field, entries: I) -> Result<Self, ConfigurationError>
    where
        I: IntoIterator<Item = (MatcherKind, &'a str)>,
    {
        let compiled = entries
            .into_iter()
            .map(|(kind, pattern)| CompiledPattern::compile(field, kind, pattern))
            .collect::<Result<Vec<_>, _>>()?;

        if compiled.is_empty() {
            Ok(FieldMatcher::Unconstrained)
        } else {
            Ok(FieldMatcher::Constrained(compiled))
        }
    }

    /// A field constrained to a single exact value.
    pub fn exact(value: impl Into<String>) -> Self {
        FieldMatcher::Constrained(vec![CompiledPattern::Exact(value.into())])
    }

    pub fn is_unconstrained(&self) -> bool {
        matches!(self, FieldMatcher::Unconstrained)
    }

    pub fn patterns(&self) -> &[CompiledPattern] {
        match self {
            FieldMatcher::Unconstrained => &[],
            FieldMatcher::Constrained(patterns) => patterns,
        }
    }

    /// The Exact pattern, if one is configured.
    pub fn exact_pattern(&self) -> Option<&str> {
        self.patterns().iter().find_map(|p| match p {
            CompiledPattern::Exact(value) => Some(value.as_str()),
            _ => None,
        })
    }

    /// True when the field is constrained by exactly one Exact pattern and
    /// nothing else, so the fingerprint value is the only value it accepts.
    pub fn is_single_exact(&self) -> bool {
        matches!(self.patterns(), [CompiledPattern::Exact(_)])
    }

    pub fn evaluate(&self, candidate: &str) -> bool {
        self.evaluate_with_exact(candidate, candidate)
    }

    /// Evaluate with a separate candidate for Exact patterns.
    ///
    /// Used for the query, where Exact patterns compare against the
    /// canonical form and every other kind sees the raw string.
    pub fn evaluate_with_exact(&self, candidate: &str, exact_candidate: &str) -> bool {
        match self {
            FieldMatcher::Unconstrained => true,
            FieldMatcher::Constrained(patterns) => patterns.iter().any(|p| match p {
                CompiledPattern::Exact(_) => p.matches(exact_candidate),
                _ => p.matches(candidate),
            }),
        }
    }
}
