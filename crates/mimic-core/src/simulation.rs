//! Simulation documents: the wire shape of imported rules.
//!
//! This is the only module that sees the wire representation. It maps
//! `PairView`s to [`Rule`]s on import and back again on export; everything
//! past this boundary works with the compiled matcher types.

use crate::error::{ConfigurationError, ImportError};
use crate::matching::{Field, FieldMatcher, HeaderSet, MatcherKind, RequestMatcher};
use crate::rules::Rule;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Schema version written on export.
pub const SCHEMA_VERSION: &str = "v2";

/// One optional pattern slot per matcher kind for a single field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct RequestFieldMatchersView {
    #[serde(default, alias = "exactMatch", skip_serializing_if = "Option::is_none")]
    pub exact_match: Option<String>,
    #[serde(default, alias = "xmlMatch", skip_serializing_if = "Option::is_none")]
    pub xml_match: Option<String>,
    #[serde(default, alias = "xpathMatch", skip_serializing_if = "Option::is_none")]
    pub xpath_match: Option<String>,
    #[serde(default, alias = "jsonMatch", skip_serializing_if = "Option::is_none")]
    pub json_match: Option<String>,
    #[serde(default, alias = "jsonPathMatch", skip_serializing_if = "Option::is_none")]
    pub json_path_match: Option<String>,
    #[serde(default, alias = "regexMatch", skip_serializing_if = "Option::is_none")]
    pub regex_match: Option<String>,
    #[serde(default, alias = "globMatch", skip_serializing_if = "Option::is_none")]
    pub glob_match: Option<String>,
}

impl RequestFieldMatchersView {
    pub fn exact(value: impl Into<String>) -> Self {
        Self {
            exact_match: Some(value.into()),
            ..Self::default()
        }
    }

    fn slot(&self, kind: MatcherKind) -> &Option<String> {
        match kind {
            MatcherKind::Exact => &self.exact_match,
            MatcherKind::Xml => &self.xml_match,
            MatcherKind::Xpath => &self.xpath_match,
            MatcherKind::Json => &self.json_match,
            MatcherKind::JsonPath => &self.json_path_match,
            MatcherKind::Regex => &self.regex_match,
            MatcherKind::Glob => &self.glob_match,
        }
    }

    fn slot_mut(&mut self, kind: MatcherKind) -> &mut Option<String> {
        match kind {
            MatcherKind::Exact => &mut self.exact_match,
            MatcherKind::Xml => &mut self.xml_match,
            MatcherKind::Xpath => &mut self.xpath_match,
            MatcherKind::Json => &mut self.json_match,
            MatcherKind::JsonPath => &mut self.json_path_match,
            MatcherKind::Regex => &mut self.regex_match,
            MatcherKind::Glob => &mut self.glob_match,
        }
    }

    /// Configured (kind, pattern) entries in slot order.
    pub fn entries(&self) -> impl Iterator<Item = (MatcherKind, &str)> + '_ {
        MatcherKind::ALL
            .into_iter()
            .filter_map(|kind| self.slot(kind).as_deref().map(|p| (kind, p)))
    }

    pub fn is_empty(&self) -> bool {
        self.entries().next().is_none()
    }

    fn compile(&self, field: Field) -> Result<FieldMatcher, ConfigurationError> {
        FieldMatcher::compile(field, self.entries())
    }

    fn from_matcher(matcher: &FieldMatcher) -> Option<Self> {
        if matcher.is_unconstrained() {
            return None;
        }
        let mut view = Self::default();
        for pattern in matcher.patterns() {
            *view.slot_mut(pattern.kind()) = Some(pattern.source().to_string());
        }
        Some(view)
    }
}

/// Request side of a pair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct RequestMatcherView {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<RequestFieldMatchersView>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<RequestFieldMatchersView>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<RequestFieldMatchersView>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheme: Option<RequestFieldMatchersView>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<RequestFieldMatchersView>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<RequestFieldMatchersView>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, Vec<String>>,
}

impl RequestMatcherView {
    fn field(&self, field: Field) -> Option<&RequestFieldMatchersView> {
        match field {
            Field::Path => self.path.as_ref(),
            Field::Method => self.method.as_ref(),
            Field::Destination => self.destination.as_ref(),
            Field::Scheme => self.scheme.as_ref(),
            Field::Query => self.query.as_ref(),
            Field::Body => self.body.as_ref(),
        }
    }

    fn field_mut(&mut self, field: Field) -> &mut Option<RequestFieldMatchersView> {
        match field {
            Field::Path => &mut self.path,
            Field::Method => &mut self.method,
            Field::Destination => &mut self.destination,
            Field::Scheme => &mut self.scheme,
            Field::Query => &mut self.query,
            Field::Body => &mut self.body,
        }
    }

    /// Set one field's view; returns self for chaining.
    pub fn with(mut self, field: Field, view: RequestFieldMatchersView) -> Self {
        *self.field_mut(field) = Some(view);
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers
            .entry(name.to_string())
            .or_default()
            .push(value.to_string());
        self
    }
}

/// Response side of a pair. Carried through untouched by the matching core.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ResponseDetails {
    pub status: u16,
    #[serde(default)]
    pub body: String,
    #[serde(default, alias = "encodedBody")]
    pub encoded_body: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub templated: bool,
}

/// A request matcher and its response, as imported.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct PairView {
    pub request: RequestMatcherView,
    pub response: ResponseDetails,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct SimulationData {
    #[serde(default)]
    pub pairs: Vec<PairView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SimulationMeta {
    #[serde(alias = "schemaVersion")]
    pub schema_version: String,
    #[serde(default, alias = "timeExported", skip_serializing_if = "Option::is_none")]
    pub time_exported: Option<String>,
}

impl Default for SimulationMeta {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            time_exported: None,
        }
    }
}

/// A full simulation document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct SimulationView {
    pub data: SimulationData,
    #[serde(default)]
    pub meta: SimulationMeta,
}

/// Accepted input layouts.
#[derive(Deserialize)]
#[serde(untagged)]
enum SimulationInput {
    Document(SimulationView),
    Pairs { pairs: Vec<PairView> },
    List(Vec<PairView>),
}

impl From<SimulationInput> for SimulationView {
    fn from(input: SimulationInput) -> Self {
        match input {
            SimulationInput::Document(view) => view,
            SimulationInput::Pairs { pairs } | SimulationInput::List(pairs) => {
                SimulationView::from_pairs(pairs)
            }
        }
    }
}

impl SimulationView {
    pub fn from_pairs(pairs: Vec<PairView>) -> Self {
        Self {
            data: SimulationData { pairs },
            meta: SimulationMeta::default(),
        }
    }

    /// Parse a JSON document: a full simulation, `{"pairs": [...]}`, or a
    /// bare list of pairs.
    pub fn from_json(input: &str) -> Result<Self, ImportError> {
        let parsed: SimulationInput = serde_json::from_str(input)?;
        Ok(parsed.into())
    }

    /// Parse a YAML document with the same accepted layouts as JSON.
    pub fn from_yaml(input: &str) -> Result<Self, serde_yaml::Error> {
        let parsed: SimulationInput = serde_yaml::from_str(input)?;
        Ok(parsed.into())
    }

    pub fn pairs(&self) -> &[PairView] {
        &self.data.pairs
    }

    /// Compile every pair, failing on the first invalid one.
    pub fn to_rules(&self) -> Result<Vec<Rule>, ImportError> {
        build_rules(self.pairs())
    }
}

/// Compile pairs into rules, in order. Any invalid matcher rejects the lot.
pub fn build_rules(pairs: &[PairView]) -> Result<Vec<Rule>, ImportError> {
    pairs
        .iter()
        .enumerate()
        .map(|(index, pair)| {
            Rule::try_from(pair).map_err(|source| ImportError::InvalidPair { index, source })
        })
        .collect()
}

impl TryFrom<&PairView> for Rule {
    type Error = ConfigurationError;

    fn try_from(pair: &PairView) -> Result<Self, Self::Error> {
        let mut matcher = RequestMatcher::new();
        for field in Field::ALL {
            if let Some(view) = pair.request.field(field) {
                matcher = matcher.with_field(field, view.compile(field)?);
            }
        }
        let matcher = matcher.with_headers(HeaderSet::from_map(&pair.request.headers));

        Ok(Rule::new(matcher, pair.response.clone()))
    }
}

impl From<&Rule> for PairView {
    fn from(rule: &Rule) -> Self {
        let mut request = RequestMatcherView {
            headers: rule.matcher.headers().to_map(),
            ..RequestMatcherView::default()
        };
        for field in Field::ALL {
            *request.field_mut(field) = RequestFieldMatchersView::from_matcher(rule.matcher.field(field));
        }

        PairView {
            request,
            response: (*rule.response).clone(),
        }
    }
}
