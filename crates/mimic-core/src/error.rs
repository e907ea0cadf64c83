//! Error types for rule construction and simulation import.
//!
//! Matching itself never fails: a malformed pattern is rejected while the rule
//! is being built, and a candidate value that cannot be parsed simply does not
//! match.

use crate::matching::{Field, MatcherKind};

/// A matcher pattern that could not be compiled.
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("{field}: invalid {kind} pattern {pattern:?}: {source}")]
    InvalidRegex {
        field: Field,
        kind: MatcherKind,
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("{field}: unparsable XML pattern {pattern:?}: {message}")]
    InvalidXml {
        field: Field,
        pattern: String,
        message: String,
    },
    #[error("{field}: invalid XPath expression {expression:?}: {message}")]
    InvalidXPath {
        field: Field,
        expression: String,
        message: String,
    },
    #[error("{field}: unparsable JSON pattern {pattern:?}: {source}")]
    InvalidJson {
        field: Field,
        pattern: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("{field}: invalid JSONPath expression {expression:?}: {message}")]
    InvalidJsonPath {
        field: Field,
        expression: String,
        message: String,
    },
}

impl ConfigurationError {
    /// The request field whose matcher was rejected.
    pub fn field(&self) -> Field {
        match self {
            ConfigurationError::InvalidRegex { field, .. }
            | ConfigurationError::InvalidXml { field, .. }
            | ConfigurationError::InvalidXPath { field, .. }
            | ConfigurationError::InvalidJson { field, .. }
            | ConfigurationError::InvalidJsonPath { field, .. } => *field,
        }
    }
}

/// A rejected simulation import. The previously loaded rules stay active.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("pair {index}: {source}")]
    InvalidPair {
        index: usize,
        #[source]
        source: ConfigurationError,
    },
    #[error("malformed simulation document: {0}")]
    Malformed(#[from] serde_json::Error),
}
