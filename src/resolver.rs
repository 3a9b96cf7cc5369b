// 🧭 Creditor Resolver - What the agent workspace calls
//
// Wires the snapshot cache, the match engine and the miss reporter together:
// - search()   → interactive substring search on a cached snapshot
// - validate() → batch exact match on a freshly fetched snapshot
// - report_misses() / validate_and_report() → persist unresolved codes
//
// Fail-open: when the alias table cannot be fetched the engine runs against an
// empty snapshot, so search finds nothing and every batch candidate becomes a
// miss the agent can still report. Nothing here is fatal.

use crate::config::ResolverConfig;
use crate::db::SqliteStore;
use crate::engine::{BatchResult, MatchEngine};
use crate::index::{AliasIndex, CreditorRecord};
use crate::loader::{AliasCache, AliasSource, FetchMode};
use crate::reporter::{MissReporter, MissStore};
use chrono::Duration;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize)]
pub struct SearchOutcome {
    pub query: String,
    pub records: Vec<CreditorRecord>,
    /// False when the alias table could not be fetched
    pub index_available: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchOutcome {
    pub result: BatchResult,
    /// False when the alias table could not be fetched
    pub index_available: bool,
    /// None when no report was attempted
    pub report_saved: Option<bool>,
}

pub struct CreditorResolver {
    cache: AliasCache,
    engine: MatchEngine,
    reporter: MissReporter,
}

impl CreditorResolver {
    pub fn new(
        source: Arc<dyn AliasSource>,
        store: Arc<dyn MissStore>,
        engine: MatchEngine,
        cache_max_age: Duration,
    ) -> Self {
        CreditorResolver {
            cache: AliasCache::new(source, cache_max_age),
            engine,
            reporter: MissReporter::new(store),
        }
    }

    /// Resolver over one SQLite database serving both boundaries
    pub fn with_sqlite(store: Arc<SqliteStore>, config: &ResolverConfig) -> Self {
        let engine = MatchEngine::new(config.noise_filter(), config.min_code_length);
        Self::new(store.clone(), store, engine, config.cache_max_age)
    }

    pub fn cache(&self) -> &AliasCache {
        &self.cache
    }

    /// Interactive search, tolerating a snapshot up to the cache max age
    pub fn search(&self, raw_query: &str) -> SearchOutcome {
        let (index, index_available) = self.snapshot_or_empty(FetchMode::Cached);

        SearchOutcome {
            query: raw_query.to_string(),
            records: self.engine.match_interactive(&index, raw_query),
            index_available,
        }
    }

    /// Batch validation against freshly fetched master data
    pub fn validate(&self, raw_text: &str, case_reference: &str) -> BatchOutcome {
        let (index, index_available) = self.snapshot_or_empty(FetchMode::Fresh);
        let result = self.engine.validate_batch(&index, raw_text, case_reference);

        tracing::debug!(
            case_reference,
            lines = result.summary.lines_total,
            hits = result.summary.hits,
            misses = result.summary.misses,
            fingerprint = %result.snapshot_fingerprint,
            "batch validated"
        );

        BatchOutcome {
            result,
            index_available,
            report_saved: None,
        }
    }

    /// Persist unresolved codes; true when saved or nothing to save
    pub fn report_misses(&self, codes: &BTreeSet<String>, case_reference: &str) -> bool {
        self.reporter.report_misses(codes, case_reference)
    }

    /// Same as `report_misses`, returning the number of rows written
    pub fn try_report_misses(
        &self,
        codes: &BTreeSet<String>,
        case_reference: &str,
    ) -> crate::error::Result<usize> {
        self.reporter.try_report(codes, case_reference)
    }

    /// Validate, then report the misses under the same case reference
    pub fn validate_and_report(&self, raw_text: &str, case_reference: &str) -> BatchOutcome {
        let mut outcome = self.validate(raw_text, case_reference);
        let saved = self.report_misses(&outcome.result.misses, case_reference);
        outcome.report_saved = Some(saved);
        outcome
    }

    fn snapshot_or_empty(&self, mode: FetchMode) -> (Arc<AliasIndex>, bool) {
        match self.cache.snapshot(mode) {
            Ok(index) => (index, true),
            Err(e) => {
                tracing::warn!(?mode, error = %e, "alias table unavailable, resolving against empty index");
                (Arc::new(AliasIndex::empty()), false)
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
