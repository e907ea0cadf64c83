//! Loaded rules.
//!
//! A `RulesTable` is one generation of imported rules. It is built in full
//! before it is published and never changes afterwards; an import replaces
//! the whole table.

use crate::matching::{RequestDetails, RequestMatcher};
use crate::simulation::ResponseDetails;
use std::sync::Arc;

/// A request matcher paired with the response it selects.
#[derive(Debug, Clone)]
pub struct Rule {
    pub matcher: RequestMatcher,
    pub response: Arc<ResponseDetails>,
}

impl Rule {
    pub fn new(matcher: RequestMatcher, response: ResponseDetails) -> Self {
        Self {
            matcher,
            response: Arc::new(response),
        }
    }
}

/// Ordered rules of one import generation.
#[derive(Debug, Default)]
pub struct RulesTable {
    generation: u64,
    rules: Vec<Rule>,
    /// Positions of rules whose fingerprint (if any) does not describe
    /// everything they accept. Only these can pre-empt a cache hit.
    inexact: Vec<usize>,
}

impl RulesTable {
    pub fn new(generation: u64, rules: Vec<Rule>) -> Self {
        let inexact = rules
            .iter()
            .enumerate()
            .filter(|(_, rule)| !rule.matcher.is_fully_exact())
            .map(|(index, _)| index)
            .collect();

        Self {
            generation,
            rules,
            inexact,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Number of rules that are not fully exact.
    pub fn inexact_count(&self) -> usize {
        self.inexact.len()
    }

    /// Fallback scan: the first rule, in import order, that matches.
    pub fn first_match(&self, request: &RequestDetails) -> Option<(usize, &Rule)> {
        self.rules
            .iter()
            .enumerate()
            .find(|(_, rule)| rule.matcher.matches(request))
    }

    /// The first non-fully-exact rule positioned before `limit` that matches.
    ///
    /// Fully exact rules are all represented in a preloaded cache, so a cache
    /// hit at `limit` can only be pre-empted by one of these.
    pub fn first_inexact_match_before(
        &self,
        request: &RequestDetails,
        limit: usize,
    ) -> Option<(usize, &Rule)> {
        self.inexact
            .iter()
            .take_while(|&&index| index < limit)
            .map(|&index| (index, &self.rules[index]))
            .find(|(_, rule)| rule.matcher.matches(request))
    }
}
