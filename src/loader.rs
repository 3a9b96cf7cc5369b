// 🔄 Alias Table Loader - Snapshot ownership and refresh policy
//
// The master list lives in an external store (AliasSource). AliasCache owns the
// current AliasIndex snapshot and its build time, and refreshes it on demand:
//
// - FetchMode::Cached → reuse the snapshot while it is younger than max_age
// - FetchMode::Fresh  → always refetch (batch validation is an audit path)
//
// Readers clone an Arc under a short read lock. A refresh fetches and builds
// without holding any lock, then swaps the Arc in. Readers therefore see the
// old complete snapshot or the new complete one, never a partial build.

use crate::error::{ResolverError, Result};
use crate::index::{AliasIndex, CreditorRecord};
use anyhow::{Context, Result as SourceResult};
use chrono::{DateTime, Duration, Utc};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

// ============================================================================
// ALIAS SOURCE (inbound boundary)
// ============================================================================

/// Supplies the raw (code, name) rows in their source order
pub trait AliasSource: Send + Sync {
    fn fetch_alias_table(&self) -> SourceResult<Vec<CreditorRecord>>;

    /// Label for logs
    fn describe(&self) -> String {
        "alias source".to_string()
    }
}

/// Reads the master list from a `code,name` CSV file on every fetch
pub struct CsvAliasSource {
    path: PathBuf,
}

impl CsvAliasSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        CsvAliasSource { path: path.into() }
    }
}

impl AliasSource for CsvAliasSource {
    fn fetch_alias_table(&self) -> SourceResult<Vec<CreditorRecord>> {
        load_creditors_csv(&self.path)
    }

    fn describe(&self) -> String {
        format!("csv:{}", self.path.display())
    }
}

/// Load creditor rows from a CSV with `code` and `name` headers
///
/// Rows whose code is blank are skipped.
pub fn load_creditors_csv(csv_path: &Path) -> SourceResult<Vec<CreditorRecord>> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(csv_path)
        .with_context(|| format!("Failed to open creditor CSV {}", csv_path.display()))?;

    let mut records = Vec::new();

    for result in rdr.deserialize() {
        let record: CreditorRecord = result.context("Failed to deserialize creditor row")?;
        if record.has_code() {
            records.push(record);
        }
    }

    Ok(records)
}

// ============================================================================
// FETCH MODE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    /// Interactive use: a snapshot up to max_age old is fine
    Cached,

    /// Batch / report use: always refetch
    Fresh,
}

// ============================================================================
// ALIAS CACHE
// ============================================================================

pub struct AliasCache {
    source: Arc<dyn AliasSource>,
    max_age: Duration,
    current: RwLock<Option<Arc<AliasIndex>>>,
}

impl AliasCache {
    pub fn new(source: Arc<dyn AliasSource>, max_age: Duration) -> Self {
        AliasCache {
            source,
            max_age,
            current: RwLock::new(None),
        }
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    /// Snapshot for the given mode, refreshing when the policy requires it
    pub fn snapshot(&self, mode: FetchMode) -> Result<Arc<AliasIndex>> {
        self.snapshot_at(mode, Utc::now())
    }

    /// Same as `snapshot`, with an explicit "now" for the max-age check
    pub fn snapshot_at(&self, mode: FetchMode, now: DateTime<Utc>) -> Result<Arc<AliasIndex>> {
        if mode == FetchMode::Cached {
            if let Some(index) = self.current() {
                if !index.is_older_than(self.max_age, now) {
                    return Ok(index);
                }
                tracing::debug!(built_at = %index.built_at(), "alias snapshot expired");
            }
        }

        self.refresh()
    }

    /// Fetch the table, build a new snapshot and swap it in
    ///
    /// The snapshot is stamped with the time the fetch started. When an
    /// overlapping refresh that started later has already stored its snapshot,
    /// that newer one is kept and returned. On failure the previous snapshot
    /// stays in place.
    pub fn refresh(&self) -> Result<Arc<AliasIndex>> {
        let started = Utc::now();
        let records = self.source.fetch_alias_table().map_err(|e| {
            ResolverError::DataUnavailable(format!("{}: {:#}", self.source.describe(), e))
        })?;

        let index = Arc::new(AliasIndex::build_at(records, started));

        {
            let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
            if let Some(newer) = current.as_ref().filter(|c| c.built_at() > started) {
                tracing::debug!(
                    started = %started,
                    stored = %newer.built_at(),
                    "newer alias snapshot already stored, discarding this one"
                );
                return Ok(newer.clone());
            }
            *current = Some(index.clone());
        }

        tracing::info!(
            source = %self.source.describe(),
            records = index.len(),
            codes = index.code_count(),
            fingerprint = %index.fingerprint(),
            "alias snapshot refreshed"
        );

        Ok(index)
    }

    /// The stored snapshot, if one has been built
    pub fn current(&self) -> Option<Arc<AliasIndex>> {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// When the stored snapshot was built
    pub fn last_refreshed(&self) -> Option<DateTime<Utc>> {
        self.current().map(|index| index.built_at())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{mpsc, Mutex};

    /// Source that counts fetches and can be switched to failing
    struct CountingSource {
        rows: Vec<CreditorRecord>,
        fetches: AtomicUsize,
        fail: AtomicBool,
    }

    impl CountingSource {
        fn new(rows: Vec<CreditorRecord>) -> Self {
            CountingSource {
                rows,
                fetches: AtomicUsize::new(0),
                fail: AtomicBool::new(false),
            }
        }
    }

    impl AliasSource for CountingSource {
        fn fetch_alias_table(&self) -> SourceResult<Vec<CreditorRecord>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                anyhow::bail!("connection refused");
            }
            Ok(self.rows.clone())
        }
    }

    fn amex_source() -> Arc<CountingSource> {
        Arc::new(CountingSource::new(vec![CreditorRecord::new(
            "AMEX",
            "American Express",
        )]))
    }

    #[test]
    fn test_cached_reuses_fresh_snapshot() {
        let source = amex_source();
        let cache = AliasCache::new(source.clone(), Duration::seconds(600));

        let first = cache.snapshot(FetchMode::Cached).unwrap();
        let second = cache.snapshot(FetchMode::Cached).unwrap();

        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_cached_refreshes_expired_snapshot() {
        let source = amex_source();
        let cache = AliasCache::new(source.clone(), Duration::seconds(600));

        let first = cache.snapshot(FetchMode::Cached).unwrap();
        let later = first.built_at() + Duration::seconds(601);
        let second = cache.snapshot_at(FetchMode::Cached, later).unwrap();

        assert_eq!(source.fetches.load(Ordering::SeqCst), 2);
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_fresh_always_refetches() {
        let source = amex_source();
        let cache = AliasCache::new(source.clone(), Duration::seconds(600));

        cache.snapshot(FetchMode::Cached).unwrap();
        cache.snapshot(FetchMode::Fresh).unwrap();
        cache.snapshot(FetchMode::Fresh).unwrap();

        assert_eq!(source.fetches.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_failed_refresh_keeps_previous_snapshot() {
        let source = amex_source();
        let cache = AliasCache::new(source.clone(), Duration::seconds(600));

        let before = cache.snapshot(FetchMode::Fresh).unwrap();
        source.fail.store(true, Ordering::SeqCst);

        let err = cache.snapshot(FetchMode::Fresh).unwrap_err();
        assert!(matches!(err, ResolverError::DataUnavailable(_)));
        assert!(err.to_string().contains("connection refused"));

        let kept = cache.current().unwrap();
        assert!(Arc::ptr_eq(&before, &kept));
        assert_eq!(cache.last_refreshed(), Some(before.built_at()));
    }

    #[test]
    fn test_readers_keep_old_snapshot_across_refresh() {
        let source = amex_source();
        let cache = AliasCache::new(source, Duration::seconds(600));

        let held = cache.snapshot(FetchMode::Cached).unwrap();
        let refreshed = cache.refresh().unwrap();

        // A reader holding the old Arc still sees a complete index
        assert!(held.lookup_exact("AMEX").is_some());
        assert!(!Arc::ptr_eq(&held, &refreshed));
        assert!(Arc::ptr_eq(&cache.current().unwrap(), &refreshed));
    }

    /// Source whose first fetch blocks until released, returning older rows
    struct GatedSource {
        calls: AtomicUsize,
        entered: Mutex<mpsc::Sender<()>>,
        release: Mutex<mpsc::Receiver<()>>,
    }

    impl AliasSource for GatedSource {
        fn fetch_alias_table(&self) -> SourceResult<Vec<CreditorRecord>> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                self.entered.lock().unwrap().send(()).unwrap();
                self.release.lock().unwrap().recv().unwrap();
                return Ok(vec![CreditorRecord::new("OLDCO", "Old Lender")]);
            }
            Ok(vec![CreditorRecord::new("NEWCO", "New Lender")])
        }
    }

    #[test]
    fn test_slow_refresh_does_not_overwrite_newer_snapshot() {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let cache = AliasCache::new(
            Arc::new(GatedSource {
                calls: AtomicUsize::new(0),
                entered: Mutex::new(entered_tx),
                release: Mutex::new(release_rx),
            }),
            Duration::seconds(600),
        );

        std::thread::scope(|s| {
            let slow = s.spawn(|| cache.refresh().unwrap());

            // The slow fetch has started; a later refresh completes first
            entered_rx.recv().unwrap();
            std::thread::sleep(std::time::Duration::from_millis(2));
            let fast = cache.refresh().unwrap();
            assert!(fast.lookup_exact("NEWCO").is_some());

            release_tx.send(()).unwrap();
            let returned = slow.join().unwrap();

            assert!(Arc::ptr_eq(&returned, &fast));
        });

        let current = cache.current().unwrap();
        assert!(current.lookup_exact("NEWCO").is_some());
        assert!(current.lookup_exact("OLDCO").is_none());
    }

    #[test]
    fn test_no_snapshot_before_first_fetch() {
        let cache = AliasCache::new(amex_source(), Duration::seconds(600));
        assert!(cache.current().is_none());
        assert!(cache.last_refreshed().is_none());
    }

    #[test]
    fn test_load_creditors_csv() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "code,name").unwrap();
        writeln!(file, "AMEX,American Express").unwrap();
        writeln!(file, "  ,Blank Code Lender").unwrap();
        writeln!(file, " TBOM , Third Bank of Mexico ").unwrap();
        file.flush().unwrap();

        let records = load_creditors_csv(file.path()).unwrap();

        assert_eq!(
            records,
            vec![
                CreditorRecord::new("AMEX", "American Express"),
                CreditorRecord::new("TBOM", "Third Bank of Mexico"),
            ]
        );
    }

    #[test]
    fn test_load_creditors_csv_capitalized_headers() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "Code,Name").unwrap();
        writeln!(file, "CITI,Citibank").unwrap();
        file.flush().unwrap();

        let source = CsvAliasSource::new(file.path());
        let records = source.fetch_alias_table().unwrap();

        assert_eq!(records, vec![CreditorRecord::new("CITI", "Citibank")]);
        assert!(source.describe().starts_with("csv:"));
    }

    #[test]
    fn test_missing_csv_is_an_error() {
        let source = CsvAliasSource::new("/nonexistent/creditors.csv");
        assert!(source.fetch_alias_table().is_err());
    }
}
