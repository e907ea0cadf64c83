//! Whole-request matching and fingerprint reduction.

use super::field::{Field, FieldMatcher};
use super::headers::HeaderSet;
use super::kind::{CompiledPattern, MatcherKind};
use super::query::canonicalize;
use serde::{Deserialize, Serialize};

/// A concrete incoming request, as seen by the matcher.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct RequestDetails {
    pub method: String,
    pub scheme: String,
    pub destination: String,
    pub path: String,
    /// Raw query string, without the leading `?`
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub headers: HeaderSet,
}

impl RequestDetails {
    pub fn new(
        method: impl Into<String>,
        scheme: impl Into<String>,
        destination: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            method: method.into(),
            scheme: scheme.into(),
            destination: destination.into(),
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = query.into();
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// The six literal field values, with the query canonicalized.
    pub fn exact_fields(&self) -> ExactFields {
        ExactFields {
            method: self.method.clone(),
            scheme: self.scheme.clone(),
            destination: self.destination.clone(),
            path: self.path.clone(),
            query: canonicalize(&self.query),
            body: self.body.clone(),
        }
    }
}

/// Literal values for the six non-header fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
pub struct ExactFields {
    pub method: String,
    pub scheme: String,
    pub destination: String,
    pub path: String,
    pub query: String,
    pub body: String,
}

/// Cache key derived from a fully exact rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
pub struct RequestFingerprint {
    #[serde(flatten)]
    pub fields: ExactFields,
    pub headers: HeaderSet,
}

/// AND-predicate over a whole request.
///
/// Built once when a rule is constructed and never mutated afterwards.
#[derive(Debug, Clone, Default)]
pub struct RequestMatcher {
    path: FieldMatcher,
    method: FieldMatcher,
    destination: FieldMatcher,
    scheme: FieldMatcher,
    query: FieldMatcher,
    body: FieldMatcher,
    headers: HeaderSet,
}

impl RequestMatcher {
    /// A matcher with every field unconstrained.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the matcher for one field.
    ///
    /// Exact query patterns are stored in canonical form.
    pub fn with_field(mut self, field: Field, matcher: FieldMatcher) -> Self {
        let matcher = match (field, matcher) {
            (Field::Query, FieldMatcher::Constrained(patterns)) => FieldMatcher::Constrained(
                patterns
                    .into_iter()
                    .map(|p| match p {
                        CompiledPattern::Exact(q) => CompiledPattern::Exact(canonicalize(&q)),
                        other => other,
                    })
                    .collect(),
            ),
            (_, matcher) => matcher,
        };
        *self.field_mut(field) = matcher;
        self
    }

    pub fn with_headers(mut self, headers: HeaderSet) -> Self {
        self.headers = headers;
        self
    }

    pub fn field(&self, field: Field) -> &FieldMatcher {
        match field {
            Field::Path => &self.path,
            Field::Method => &self.method,
            Field::Destination => &self.destination,
            Field::Scheme => &self.scheme,
            Field::Query => &self.query,
            Field::Body => &self.body,
        }
    }

    fn field_mut(&mut self, field: Field) -> &mut FieldMatcher {
        match field {
            Field::Path => &mut self.path,
            Field::Method => &mut self.method,
            Field::Destination => &mut self.destination,
            Field::Scheme => &mut self.scheme,
            Field::Query => &mut self.query,
            Field::Body => &mut self.body,
        }
    }

    pub fn headers(&self) -> &HeaderSet {
        &self.headers
    }

    /// Check every field and the header constraint against a request.
    pub fn matches(&self, request: &RequestDetails) -> bool {
        self.method.evaluate(&request.method)
            && self.scheme.evaluate(&request.scheme)
            && self.destination.evaluate(&request.destination)
            && self.path.evaluate(&request.path)
            && self
                .query
                .evaluate_with_exact(&request.query, &canonicalize(&request.query))
            && self.body.evaluate(&request.body)
            && self.headers.satisfied_by(&request.headers)
    }

    /// Reduce to a fingerprint when all six fields carry an Exact pattern.
    ///
    /// Headers do not gate reducibility; they are copied as configured.
    pub fn reduce_to_fingerprint(&self) -> Option<RequestFingerprint> {
        Some(RequestFingerprint {
            fields: ExactFields {
                method: self.method.exact_pattern()?.to_string(),
                scheme: self.scheme.exact_pattern()?.to_string(),
                destination: self.destination.exact_pattern()?.to_string(),
                path: self.path.exact_pattern()?.to_string(),
                // Already canonical, see `with_field`
                query: self.query.exact_pattern()?.to_string(),
                body: self.body.exact_pattern()?.to_string(),
            },
            headers: self.headers.clone(),
        })
    }

    /// Cache key under which a scan hit for `request` may be remembered.
    ///
    /// Keeps only the headers this matcher requires, so the entry serves any
    /// request with the same six values that carries them. `None` when a
    /// non-Exact query pattern reads the raw query, whose token order the
    /// key does not preserve.
    pub fn fallback_fingerprint(&self, request: &RequestDetails) -> Option<RequestFingerprint> {
        if self
            .query
            .patterns()
            .iter()
            .any(|p| p.kind() != MatcherKind::Exact)
        {
            return None;
        }
        Some(RequestFingerprint {
            fields: request.exact_fields(),
            headers: self.headers.clone(),
        })
    }

    /// True when the fingerprint describes every request this matcher accepts,
    /// i.e. each field holds a single Exact pattern and nothing else.
    pub fn is_fully_exact(&self) -> bool {
        Field::ALL.iter().all(|f| self.field(*f).is_single_exact())
    }
}
