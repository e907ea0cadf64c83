//! Request matching.
//!
//! A rule's request side is a [`RequestMatcher`]: six [`FieldMatcher`]s (path,
//! method, destination, scheme, query, body) plus a [`HeaderSet`] of required
//! header values. The fields AND together; within a field, the configured
//! matcher kinds OR together.
//!
//! # Module Structure
//!
//! - `kind` - Matcher kinds and compiled patterns (the only per-kind dispatch)
//! - `xml` - Owned XML trees for structural comparison
//! - `field` - Per-field matcher, unconstrained or constrained
//! - `headers` - Header name/value sets and containment
//! - `query` - Query string canonicalization
//! - `request` - Whole-request matcher, request details and fingerprints

mod field;
mod headers;
mod kind;
mod query;
mod request;
mod xml;

pub use field::{Field, FieldMatcher};
pub use headers::HeaderSet;
pub use kind::{CompiledPattern, MatcherKind};
pub use query::canonicalize;
pub use request::{ExactFields, RequestDetails, RequestFingerprint, RequestMatcher};
