//! Fingerprint → response cache.
//!
//! Entries are bucketed by the six exact field values; inside a bucket they
//! are distinguished by the header set of the rule they came from. The whole
//! state sits behind a single lock and is only ever replaced wholesale by
//! `preload` and `flush`, so readers see either the old content or the new
//! content, never a partially built map.

use crate::matching::{ExactFields, HeaderSet, RequestFingerprint};
use crate::rules::RulesTable;
use crate::simulation::ResponseDetails;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// A cached response and the position of the rule that produced it.
#[derive(Debug, Clone)]
pub struct CachedMatch {
    pub rule_index: usize,
    pub response: Arc<ResponseDetails>,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    headers: HeaderSet,
    matched: CachedMatch,
}

/// Combined cache state protected by a single lock.
#[derive(Debug, Default)]
struct CacheState {
    /// Rules table generation this content was derived from
    generation: u64,
    /// Whether every reducible rule of `generation` is present
    preloaded: bool,
    buckets: HashMap<ExactFields, Vec<CacheEntry>>,
    len: usize,
    /// Entries added by fallback stores since the last preload or flush
    fallback: usize,
}

impl CacheState {
    fn new(generation: u64) -> Self {
        Self {
            generation,
            ..Self::default()
        }
    }

    /// Insert or overwrite the entry for a fingerprint. Returns whether a new
    /// entry was created.
    fn insert(&mut self, fingerprint: RequestFingerprint, matched: CachedMatch) -> bool {
        let bucket = self.buckets.entry(fingerprint.fields).or_default();
        match bucket.iter_mut().find(|e| e.headers == fingerprint.headers) {
            Some(existing) => {
                existing.matched = matched;
                false
            }
            None => {
                bucket.push(CacheEntry {
                    headers: fingerprint.headers,
                    matched,
                });
                self.len += 1;
                true
            }
        }
    }

    fn find(&self, fingerprint: &RequestFingerprint) -> Option<&CacheEntry> {
        self.buckets
            .get(&fingerprint.fields)?
            .iter()
            .find(|e| e.headers == fingerprint.headers)
    }

    /// Insert unless the fingerprint is already present. Returns whether it
    /// was inserted.
    fn insert_if_absent(&mut self, fingerprint: RequestFingerprint, matched: CachedMatch) -> bool {
        let bucket = self.buckets.entry(fingerprint.fields).or_default();
        if bucket.iter().any(|e| e.headers == fingerprint.headers) {
            return false;
        }
        bucket.push(CacheEntry {
            headers: fingerprint.headers,
            matched,
        });
        self.len += 1;
        true
    }
}

/// Cache statistics for inspection and logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub generation: u64,
    pub preloaded: bool,
    pub entries: usize,
}

/// Lookup cache for rules that reduce to a fingerprint.
#[derive(Debug, Default)]
pub struct MatchCache {
    state: RwLock<CacheState>,
}

impl MatchCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exact lookup of a fingerprint, headers included.
    pub fn lookup(&self, fingerprint: &RequestFingerprint) -> Option<CachedMatch> {
        self.state.read().find(fingerprint).map(|e| e.matched.clone())
    }

    /// Lookup for a concrete request.
    ///
    /// Among the entries for the request's field values whose header set the
    /// request carries, returns the one from the earliest rule, together with
    /// the generation the cache content belongs to.
    pub fn lookup_request(
        &self,
        fields: &ExactFields,
        headers: &HeaderSet,
    ) -> Option<(u64, CachedMatch)> {
        let state = self.state.read();
        let hit = state
            .buckets
            .get(fields)?
            .iter()
            .filter(|e| e.headers.satisfied_by(headers))
            .min_by_key(|e| e.matched.rule_index)?;
        Some((state.generation, hit.matched.clone()))
    }

    /// Insert or overwrite; the last writer for a fingerprint wins.
    pub fn store(&self, fingerprint: RequestFingerprint, matched: CachedMatch) {
        self.state.write().insert(fingerprint, matched);
    }

    /// Remember a fallback-scan result, only if the cache is a complete
    /// preload of `generation`.
    ///
    /// A result computed against a table that has since been replaced is
    /// dropped instead of leaking into the new generation. At most
    /// `capacity` entries are added this way per preload; an existing entry
    /// is only replaced by one from an earlier rule.
    pub fn store_fallback(
        &self,
        generation: u64,
        fingerprint: RequestFingerprint,
        matched: CachedMatch,
        capacity: usize,
    ) -> bool {
        let mut state = self.state.write();
        if !state.preloaded || state.generation != generation {
            return false;
        }
        match state.find(&fingerprint).map(|e| e.matched.rule_index) {
            Some(existing) if existing <= matched.rule_index => return false,
            Some(_) => {}
            None if state.fallback >= capacity => {
                debug!(capacity, "Fallback cache capacity reached");
                return false;
            }
            None => state.fallback += 1,
        }
        state.insert(fingerprint, matched);
        true
    }

    /// Rebuild the cache from a rules table.
    ///
    /// The new content is built off to the side and swapped in at once. When
    /// several rules reduce to the same fingerprint the earliest one is kept,
    /// matching the fallback scan's first-match order.
    pub fn preload(&self, table: &RulesTable) {
        let mut state = CacheState::new(table.generation());
        let mut skipped = 0usize;

        for (index, rule) in table.rules().iter().enumerate() {
            let Some(fingerprint) = rule.matcher.reduce_to_fingerprint() else {
                skipped += 1;
                continue;
            };
            let matched = CachedMatch {
                rule_index: index,
                response: Arc::clone(&rule.response),
            };
            if !state.insert_if_absent(fingerprint, matched) {
                debug!(rule = index, "Rule shadowed by an earlier identical fingerprint");
            }
        }
        state.preloaded = true;

        let entries = state.len;
        *self.state.write() = state;
        info!(
            generation = table.generation(),
            entries,
            skipped,
            "Preloaded match cache"
        );
    }

    /// Empty the cache and bind it to a rules table generation.
    pub fn flush(&self, generation: u64) {
        *self.state.write() = CacheState::new(generation);
        debug!(generation, "Flushed match cache");
    }

    pub fn len(&self) -> usize {
        self.state.read().len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.state.read();
        CacheStats {
            generation: state.generation,
            preloaded: state.preloaded,
            entries: state.len,
        }
    }

    /// Snapshot of all entries, ordered by rule position.
    pub fn entries(&self) -> Vec<(RequestFingerprint, CachedMatch)> {
        let state = self.state.read();
        let mut entries: Vec<_> = state
            .buckets
            .iter()
            .flat_map(|(fields, bucket)| {
                bucket.iter().map(move |e| {
                    (
                        RequestFingerprint {
                            fields: fields.clone(),
                            headers: e.headers.clone(),
                        },
                        e.matched.clone(),
                    )
                })
            })
            .collect();
        entries.sort_by(|a, b| {
            a.1.rule_index
                .cmp(&b.1.rule_index)
                .then_with(|| a.0.cmp(&b.0))
        });
        entries
    }

    /// Render the cache for the inspection endpoint.
    pub fn view(&self) -> CacheView {
        CacheView {
            cache: self
                .entries()
                .into_iter()
                .map(|(request, matched)| CacheEntryView {
                    rule_index: matched.rule_index,
                    request,
                    response: (*matched.response).clone(),
                })
                .collect(),
        }
    }
}

/// Cache inspection payload. Always a list, empty when the cache is.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct CacheView {
    pub cache: Vec<CacheEntryView>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CacheEntryView {
    pub rule_index: usize,
    pub request: RequestFingerprint,
    pub response: ResponseDetails,
}
