//! SimulationRegistry - the loaded rules, the match cache and the mode.
//!
//! Readers take a momentary read lock to clone the current `Arc<RulesTable>`
//! and then work on that snapshot without holding any lock. Imports build the
//! replacement table first and publish it with a single pointer swap.
//! Lifecycle transitions (import, mode change) are serialized so that the
//! cache is always rebuilt from the table that is actually published.

use crate::cache::{CacheStats, CacheView, CachedMatch, MatchCache};
use crate::config::{read_simulation, CacheConfig, CoreConfig};
use crate::error::ImportError;
use crate::matching::RequestDetails;
use crate::mode::{CacheAction, Mode};
use crate::rules::{Rule, RulesTable};
use crate::simulation::{build_rules, PairView, ResponseDetails, SimulationView};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Where a resolved response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchSource {
    Cache,
    Scan,
}

/// A successful resolution.
#[derive(Debug, Clone)]
pub struct Resolution {
    /// Position of the matching rule in import order
    pub rule_index: usize,
    pub response: Arc<ResponseDetails>,
    pub source: MatchSource,
}

/// Owner of the rules table, the match cache and the current mode.
pub struct SimulationRegistry {
    config: CacheConfig,
    table: RwLock<Arc<RulesTable>>,
    cache: MatchCache,
    mode: RwLock<Mode>,
    /// Serializes imports and mode transitions
    lifecycle: Mutex<()>,
}

impl Default for SimulationRegistry {
    fn default() -> Self {
        Self::new(&CoreConfig::default())
    }
}

impl SimulationRegistry {
    /// Create an empty registry in the configured initial mode.
    pub fn new(config: &CoreConfig) -> Self {
        Self {
            config: config.cache.clone(),
            table: RwLock::new(Arc::new(RulesTable::default())),
            cache: MatchCache::new(),
            mode: RwLock::new(config.mode),
            lifecycle: Mutex::new(()),
        }
    }

    /// Create a registry and import the configured simulation, if any.
    pub fn from_config(config: &CoreConfig) -> Result<Self, anyhow::Error> {
        let registry = Self::new(config);
        if let Some(ref path) = config.simulation {
            let view = read_simulation(path)?;
            let count = registry.import_simulation(&view)?;
            info!(path = %path.display(), rules = count, "Loaded startup simulation");
        }
        Ok(registry)
    }

    pub fn mode(&self) -> Mode {
        *self.mode.read()
    }

    /// Snapshot of the currently published rules.
    pub fn rules(&self) -> Arc<RulesTable> {
        Arc::clone(&self.table.read())
    }

    /// Import a simulation document, replacing all loaded rules.
    pub fn import_simulation(&self, simulation: &SimulationView) -> Result<usize, ImportError> {
        self.import(simulation.pairs())
    }

    /// Import pairs, replacing all loaded rules.
    ///
    /// Every pair is compiled before anything is published; one invalid
    /// matcher rejects the whole import and leaves the current rules active.
    pub fn import(&self, pairs: &[PairView]) -> Result<usize, ImportError> {
        let rules = build_rules(pairs).inspect_err(|e| {
            warn!("Rejected simulation import: {}", e);
        })?;
        Ok(self.replace_rules(rules))
    }

    /// Publish already compiled rules as the new table.
    pub fn replace_rules(&self, rules: Vec<Rule>) -> usize {
        let _guard = self.lifecycle.lock();

        let generation = self.table.read().generation() + 1;
        let table = Arc::new(RulesTable::new(generation, rules));
        let count = table.len();

        *self.table.write() = Arc::clone(&table);
        self.cache.flush(generation);

        let mode = self.mode();
        if mode.serves_simulation() {
            self.cache.preload(&table);
        }

        info!(
            generation,
            rules = count,
            inexact = table.inexact_count(),
            mode = %mode,
            "Imported simulation"
        );
        count
    }

    /// Switch mode and apply the cache action for the mode being entered.
    pub fn set_mode(&self, mode: Mode) {
        let _guard = self.lifecycle.lock();

        *self.mode.write() = mode;
        let table = self.rules();
        match mode.cache_action() {
            CacheAction::Preload => self.cache.preload(&table),
            CacheAction::Flush => self.cache.flush(table.generation()),
            CacheAction::Keep => {}
        }
        info!(mode = %mode, "Mode changed");
    }

    /// Resolve a request to a response, or `None` when no rule applies.
    pub fn resolve(&self, request: &RequestDetails) -> Option<Arc<ResponseDetails>> {
        self.resolve_match(request).map(|r| r.response)
    }

    /// Resolve a request, reporting which rule answered and how.
    pub fn resolve_match(&self, request: &RequestDetails) -> Option<Resolution> {
        let table = self.rules();
        let fields = request.exact_fields();

        if let Some((generation, hit)) = self.cache.lookup_request(&fields, &request.headers) {
            if generation == table.generation() {
                // An earlier rule the cache cannot represent may still win
                if let Some((index, rule)) =
                    table.first_inexact_match_before(request, hit.rule_index)
                {
                    debug!(rule = index, cached = hit.rule_index, "Cache hit pre-empted");
                    return Some(Resolution {
                        rule_index: index,
                        response: Arc::clone(&rule.response),
                        source: MatchSource::Scan,
                    });
                }
                debug!(rule = hit.rule_index, "Cache hit");
                return Some(Resolution {
                    rule_index: hit.rule_index,
                    response: hit.response,
                    source: MatchSource::Cache,
                });
            }
        }

        let Some((index, rule)) = table.first_match(request) else {
            debug!(path = %request.path, "No matching rule");
            return None;
        };
        debug!(rule = index, "Matched by fallback scan");

        if self.config.cache_fallback_matches && self.mode().serves_simulation() {
            if let Some(fingerprint) = rule.matcher.fallback_fingerprint(request) {
                self.cache.store_fallback(
                    table.generation(),
                    fingerprint,
                    CachedMatch {
                        rule_index: index,
                        response: Arc::clone(&rule.response),
                    },
                    self.config.max_fallback_entries,
                );
            }
        }

        Some(Resolution {
            rule_index: index,
            response: Arc::clone(&rule.response),
            source: MatchSource::Scan,
        })
    }

    /// Empty the cache without touching the rules.
    pub fn flush_cache(&self) {
        let _guard = self.lifecycle.lock();
        self.cache.flush(self.rules().generation());
    }

    /// Current cache content for inspection.
    pub fn cache_view(&self) -> CacheView {
        self.cache.view()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Render the loaded rules back into a simulation document.
    pub fn export(&self) -> SimulationView {
        let table = self.rules();
        let mut view =
            SimulationView::from_pairs(table.rules().iter().map(PairView::from).collect());
        view.meta.time_exported = Some(chrono::Utc::now().to_rfc3339());
        view
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::Field;
    use crate::simulation::{RequestFieldMatchersView, RequestMatcherView};

    fn exact_pair(path: &str, body: &str) -> PairView {
        PairView {
            request: RequestMatcherView::default()
                .with(Field::Method, RequestFieldMatchersView::exact("GET"))
                .with(Field::Scheme, RequestFieldMatchersView::exact("http"))
                .with(Field::Destination, RequestFieldMatchersView::exact("example.com"))
                .with(Field::Path, RequestFieldMatchersView::exact(path))
                .with(Field::Query, RequestFieldMatchersView::exact(""))
                .with(Field::Body, RequestFieldMatchersView::exact("")),
            response: ResponseDetails {
                status: 200,
                body: body.to_string(),
                ..ResponseDetails::default()
            },
        }
    }

    fn glob_pair(pattern: &str, body: &str) -> PairView {
        PairView {
            request: RequestMatcherView::default().with(
                Field::Path,
                RequestFieldMatchersView {
                    glob_match: Some(pattern.to_string()),
                    ..RequestFieldMatchersView::default()
                },
            ),
            response: ResponseDetails {
                status: 200,
                body: body.to_string(),
                ..ResponseDetails::default()
            },
        }
    }

    fn get(path: &str) -> RequestDetails {
        RequestDetails::new("GET", "http", "example.com", path)
    }

    #[test]
    fn test_starts_empty() {
        let registry = SimulationRegistry::default();
        assert_eq!(registry.mode(), Mode::Simulate);
        assert!(registry.rules().is_empty());
        assert!(registry.cache_view().cache.is_empty());
        assert!(registry.resolve(&get("/foo")).is_none());
    }

    #[test]
    fn test_import_in_simulate_preloads() {
        let registry = SimulationRegistry::default();
        registry.import(&[exact_pair("/foo", "foo")]).unwrap();

        assert_eq!(registry.cache_view().cache.len(), 1);
        let resolution = registry.resolve_match(&get("/foo")).unwrap();
        assert_eq!(resolution.source, MatchSource::Cache);
        assert_eq!(resolution.response.body, "foo");
    }

    #[test]
    fn test_import_in_capture_only_flushes() {
        let registry = SimulationRegistry::default();
        registry.set_mode(Mode::Capture);
        registry.import(&[exact_pair("/foo", "foo")]).unwrap();

        assert!(registry.cache_view().cache.is_empty());
        let resolution = registry.resolve_match(&get("/foo")).unwrap();
        assert_eq!(resolution.source, MatchSource::Scan);
    }

    #[test]
    fn test_rejected_import_keeps_previous_rules() {
        let registry = SimulationRegistry::default();
        registry.import(&[exact_pair("/foo", "foo")]).unwrap();
        let generation = registry.rules().generation();

        let mut bad = glob_pair("/x", "x");
        bad.request.body = Some(RequestFieldMatchersView {
            json_match: Some("{oops".to_string()),
            ..RequestFieldMatchersView::default()
        });
        let result = registry.import(&[exact_pair("/bar", "bar"), bad]);

        assert!(matches!(result, Err(ImportError::InvalidPair { index: 1, .. })));
        assert_eq!(registry.rules().generation(), generation);
        assert_eq!(registry.rules().len(), 1);
        assert_eq!(registry.cache_view().cache.len(), 1);
        assert_eq!(registry.resolve(&get("/foo")).unwrap().body, "foo");
        assert!(registry.resolve(&get("/bar")).is_none());
    }

    #[test]
    fn test_earlier_inexact_rule_preempts_cache_hit() {
        let registry = SimulationRegistry::default();
        registry
            .import(&[glob_pair("/fo*", "glob"), exact_pair("/foo", "exact")])
            .unwrap();
        assert_eq!(registry.cache_view().cache.len(), 1);

        let resolution = registry.resolve_match(&get("/foo")).unwrap();
        assert_eq!(resolution.rule_index, 0);
        assert_eq!(resolution.response.body, "glob");
    }

    #[test]
    fn test_later_inexact_rule_does_not_preempt() {
        let registry = SimulationRegistry::default();
        registry
            .import(&[exact_pair("/foo", "exact"), glob_pair("/fo*", "glob")])
            .unwrap();

        let resolution = registry.resolve_match(&get("/foo")).unwrap();
        assert_eq!(resolution.source, MatchSource::Cache);
        assert_eq!(resolution.response.body, "exact");
    }

    fn fallback_registry(max_fallback_entries: usize) -> SimulationRegistry {
        SimulationRegistry::new(&CoreConfig {
            cache: CacheConfig {
                cache_fallback_matches: true,
                max_fallback_entries,
            },
            ..CoreConfig::default()
        })
    }

    #[test]
    fn test_fallback_matches_cached_when_enabled() {
        let registry = fallback_registry(64);
        let mut pair = glob_pair("/api/*", "api");
        pair.request = pair.request.with_header("Accept", "application/json");
        registry.import(&[pair]).unwrap();
        assert!(registry.cache_view().cache.is_empty());

        let request = get("/api/users").with_header("Accept", "application/json");
        assert_eq!(
            registry.resolve_match(&request).unwrap().source,
            MatchSource::Scan
        );
        assert_eq!(registry.cache_view().cache.len(), 1);
        assert_eq!(
            registry.resolve_match(&request).unwrap().source,
            MatchSource::Cache
        );

        // Stored under the rule's headers, not the request's
        let entry = &registry.cache_view().cache[0];
        assert_eq!(entry.request.headers.len(), 1);

        // Without the header the rule requires, nothing matches
        assert!(registry.resolve_match(&get("/api/users")).is_none());
    }

    #[test]
    fn test_fallback_cache_ignores_unrelated_headers() {
        let registry = fallback_registry(64);
        registry.import(&[glob_pair("/api/*", "api")]).unwrap();

        let mut hits = 0;
        for i in 0..500 {
            let request = get("/api/users").with_header("X-Request-Id", &i.to_string());
            let resolution = registry.resolve_match(&request).unwrap();
            assert_eq!(resolution.response.body, "api");
            if resolution.source == MatchSource::Cache {
                hits += 1;
            }
        }

        assert_eq!(hits, 499);
        assert_eq!(registry.cache_stats().entries, 1);
    }

    #[test]
    fn test_fallback_cache_is_bounded() {
        let registry = fallback_registry(8);
        registry
            .import(&[exact_pair("/fixed", "fixed"), glob_pair("/api/*", "api")])
            .unwrap();

        for i in 0..100 {
            registry.resolve(&get(&format!("/api/{i}"))).unwrap();
        }
        assert_eq!(registry.cache_stats().entries, 1 + 8);

        // Past the limit, requests are still answered by scan
        let resolution = registry.resolve_match(&get("/api/99")).unwrap();
        assert_eq!(resolution.source, MatchSource::Scan);
        assert_eq!(resolution.response.body, "api");
    }

    #[test]
    fn test_fallback_not_cached_for_inexact_query() {
        let registry = fallback_registry(64);
        let pair = PairView {
            request: RequestMatcherView::default().with(
                Field::Query,
                RequestFieldMatchersView {
                    regex_match: Some("^b=".to_string()),
                    ..RequestFieldMatchersView::default()
                },
            ),
            response: ResponseDetails::default(),
        };
        registry.import(&[pair]).unwrap();

        assert!(registry.resolve(&get("/q").with_query("b=2&a=1")).is_some());
        assert!(registry.cache_view().cache.is_empty());
        // Same canonical query, different raw order
        assert!(registry.resolve(&get("/q").with_query("a=1&b=2")).is_none());
    }

    #[test]
    fn test_fallback_matches_not_cached_by_default() {
        let registry = SimulationRegistry::default();
        registry.import(&[glob_pair("/api/*", "api")]).unwrap();
        registry.resolve(&get("/api/users")).unwrap();
        assert!(registry.cache_view().cache.is_empty());
    }

    #[test]
    fn test_modify_keeps_cache() {
        let registry = SimulationRegistry::default();
        registry.import(&[exact_pair("/foo", "foo")]).unwrap();
        registry.set_mode(Mode::Modify);
        assert_eq!(registry.cache_view().cache.len(), 1);
    }

    #[test]
    fn test_flush_cache_keeps_rules() {
        let registry = SimulationRegistry::default();
        registry.import(&[exact_pair("/foo", "foo")]).unwrap();
        registry.flush_cache();

        assert!(registry.cache_view().cache.is_empty());
        let resolution = registry.resolve_match(&get("/foo")).unwrap();
        assert_eq!(resolution.source, MatchSource::Scan);
    }

    #[test]
    fn test_export_round_trips() {
        let registry = SimulationRegistry::default();
        let pairs = vec![exact_pair("/foo", "foo"), glob_pair("/api/*", "api")];
        registry.import(&pairs).unwrap();

        let exported = registry.export();
        assert_eq!(exported.pairs(), pairs.as_slice());
        assert!(exported.meta.time_exported.is_some());

        let other = SimulationRegistry::default();
        other.import_simulation(&exported).unwrap();
        assert_eq!(other.resolve(&get("/api/x")).unwrap().body, "api");
    }
}
