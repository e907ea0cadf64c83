//! Header name/value sets.
//!
//! The same type holds the headers a rule requires and the headers a request
//! actually carries, so the containment check is a comparison of two sets.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Header values keyed by lowercase header name.
///
/// As a rule constraint, a request satisfies it when, for every listed name, it carries
/// that header with every listed value among its actual values. Headers not
/// listed are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(from = "BTreeMap<String, Vec<String>>")]
pub struct HeaderSet(BTreeMap<String, BTreeSet<String>>);

impl HeaderSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a wire-style mapping of name to values.
    pub fn from_map<'a, I, V>(headers: I) -> Self
    where
        I: IntoIterator<Item = (&'a String, V)>,
        V: IntoIterator<Item = &'a String>,
    {
        let mut constraint = Self::new();
        for (name, values) in headers {
            for value in values {
                constraint.insert(name, value);
            }
        }
        constraint
    }

    pub fn with(mut self, name: &str, value: &str) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: &str, value: &str) {
        self.0
            .entry(name.to_ascii_lowercase())
            .or_default()
            .insert(value.to_string());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &BTreeSet<String>)> {
        self.0.iter()
    }

    /// Containment check against a request's headers.
    pub fn satisfied_by(&self, actual: &HeaderSet) -> bool {
        self.0.iter().all(|(name, required)| {
            actual
                .0
                .get(name)
                .is_some_and(|present| required.is_subset(present))
        })
    }

    /// Render as name → list of values.
    pub fn to_map(&self) -> BTreeMap<String, Vec<String>> {
        self.0
            .iter()
            .map(|(name, values)| (name.clone(), values.iter().cloned().collect()))
            .collect()
    }
}

impl From<BTreeMap<String, Vec<String>>> for HeaderSet {
    fn from(headers: BTreeMap<String, Vec<String>>) -> Self {
        Self::from_map(&headers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_constraint_always_satisfied() {
        let constraint = HeaderSet::new();
        assert!(constraint.satisfied_by(&HeaderSet::new()));
        assert!(constraint.satisfied_by(&HeaderSet::new().with("Accept", "*/*")));
    }

    #[test]
    fn test_names_case_insensitive() {
        let constraint = HeaderSet::new().with("X-Api-Key", "secret");
        let request = HeaderSet::new().with("x-api-key", "secret");
        assert!(constraint.satisfied_by(&request));
    }

    #[test]
    fn test_values_exact() {
        let constraint = HeaderSet::new().with("X-Api-Key", "secret");
        let request = HeaderSet::new().with("X-Api-Key", "SECRET");
        assert!(!constraint.satisfied_by(&request));
    }

    #[test]
    fn test_set_containment() {
        let constraint = HeaderSet::new()
            .with("Accept", "text/html")
            .with("Accept", "application/json");

        let superset = HeaderSet::new()
            .with("Accept", "application/json")
            .with("Accept", "text/html")
            .with("Accept", "text/plain")
            .with("Host", "example.com");
        assert!(constraint.satisfied_by(&superset));

        let partial = HeaderSet::new().with("Accept", "text/html");
        assert!(!constraint.satisfied_by(&partial));

        assert!(!constraint.satisfied_by(&HeaderSet::new()));
    }

    #[test]
    fn test_insertion_order_irrelevant() {
        let a = HeaderSet::new().with("A", "1").with("B", "2").with("A", "3");
        let b = HeaderSet::new().with("b", "2").with("a", "3").with("a", "1");
        assert_eq!(a, b);
    }

    #[test]
    fn test_from_map() {
        let mut wire = BTreeMap::new();
        wire.insert("Header".to_string(), vec!["value1".to_string()]);
        let constraint = HeaderSet::from_map(&wire);
        assert_eq!(constraint.to_map().get("header"), Some(&vec!["value1".to_string()]));
    }

    #[test]
    fn test_deserialize_lowercases_names() {
        let headers: HeaderSet =
            serde_json::from_str(r#"{"Header": ["value1"], "ACCEPT": ["a", "b"]}"#).unwrap();
        assert_eq!(
            headers,
            HeaderSet::new()
                .with("header", "value1")
                .with("accept", "a")
                .with("accept", "b")
        );

        let json = serde_json::to_value(&headers).unwrap();
        assert_eq!(json, serde_json::json!({"accept": ["a", "b"], "header": ["value1"]}));
        let back: HeaderSet = serde_json::from_value(json).unwrap();
        assert_eq!(back, headers);
    }
}
