// 📇 Alias Index - Immutable snapshot of the creditor master list
//
// Built wholesale from the rows an AliasSource returns, never patched in place.
// A refresh builds a new index and swaps it in (see loader::AliasCache).
//
// Duplicate policy: several rows may normalize to the same code. The exact map
// is filled in load order and a later row overwrites an earlier one, so the
// LAST row for a normalized code wins. Substring search sees every distinct
// (code, name) pair.

use crate::normalize::normalize;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};

// ============================================================================
// CREDITOR RECORD
// ============================================================================

/// One row of the master alias table
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CreditorRecord {
    /// Short alias used by the CRM (may contain spaces)
    #[serde(alias = "Code", alias = "CODE")]
    pub code: String,

    /// Official creditor name
    #[serde(alias = "Name", alias = "NAME")]
    pub name: String,
}

impl CreditorRecord {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        CreditorRecord {
            code: code.into(),
            name: name.into(),
        }
    }

    /// Comparable form of the code
    pub fn normalized_code(&self) -> String {
        normalize(&self.code)
    }

    /// Records with a blank code are never indexed
    pub fn has_code(&self) -> bool {
        !self.code.trim().is_empty()
    }
}

// ============================================================================
// ALIAS INDEX
// ============================================================================

#[derive(Debug, Clone)]
pub struct AliasIndex {
    /// NormalizedCode → record (last write wins)
    exact: HashMap<String, CreditorRecord>,

    /// Distinct (code, name) pairs in load order
    records: Vec<CreditorRecord>,

    /// (normalized code, uppercased name) per entry of `records`
    search_keys: Vec<(String, String)>,

    built_at: DateTime<Utc>,
    fingerprint: String,
}

impl AliasIndex {
    /// Build a snapshot stamped with the current time
    pub fn build(records: Vec<CreditorRecord>) -> Self {
        Self::build_at(records, Utc::now())
    }

    /// Build a snapshot with an explicit build time
    pub fn build_at(records: Vec<CreditorRecord>, built_at: DateTime<Utc>) -> Self {
        let mut exact = HashMap::new();
        let mut seen = HashSet::new();
        let mut kept = Vec::new();
        let mut search_keys = Vec::new();

        for record in records {
            let key = record.normalized_code();
            if key.is_empty() {
                continue;
            }

            exact.insert(key.clone(), record.clone());

            if seen.insert((record.code.clone(), record.name.clone())) {
                search_keys.push((key, record.name.to_uppercase()));
                kept.push(record);
            }
        }

        let fingerprint = compute_fingerprint(&kept);

        AliasIndex {
            exact,
            records: kept,
            search_keys,
            built_at,
            fingerprint,
        }
    }

    /// Snapshot with no records (used when the alias table is unavailable)
    pub fn empty() -> Self {
        Self::build(Vec::new())
    }

    /// Exact lookup by normalized code
    pub fn lookup_exact(&self, normalized_code: &str) -> Option<&CreditorRecord> {
        self.exact.get(normalized_code)
    }

    /// Every record whose normalized code or uppercased name contains the query
    ///
    /// Containment is case-insensitive and unanchored. Results keep load order,
    /// with no relevance ranking. An empty query matches every record.
    pub fn search_substring(&self, query: &str) -> Vec<&CreditorRecord> {
        let query_upper = query.to_uppercase();

        self.records
            .iter()
            .zip(&self.search_keys)
            .filter(|(_, (code, name))| code.contains(&query_upper) || name.contains(&query_upper))
            .map(|(record, _)| record)
            .collect()
    }

    /// Distinct records in load order
    pub fn records(&self) -> &[CreditorRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of distinct normalized codes
    pub fn code_count(&self) -> usize {
        self.exact.len()
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    /// True when the snapshot is older than `max_age` at `now`
    pub fn is_older_than(&self, max_age: Duration, now: DateTime<Utc>) -> bool {
        now - self.built_at > max_age
    }

    /// SHA-256 over the ordered records, identifies the master-data snapshot
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

fn compute_fingerprint(records: &[CreditorRecord]) -> String {
    let mut hasher = Sha256::new();
    for record in records {
        hasher.update(record.code.as_bytes());
        hasher.update(b"\t");
        hasher.update(record.name.as_bytes());
        hasher.update(b"\n");
    }
    format!("{:x}", hasher.finalize())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_index() -> AliasIndex {
        AliasIndex::build(vec![
            CreditorRecord::new("AMEX", "American Express"),
            CreditorRecord::new("CHASE", "JPMorgan Chase Bank"),
            CreditorRecord::new("CITI", "Citibank"),
            CreditorRecord::new("TBOM", "Third Bank of Mexico"),
        ])
    }

    #[test]
    fn test_lookup_exact_normalized() {
        let index = AliasIndex::build(vec![CreditorRecord::new("AMEX", "American Express")]);

        let found = index.lookup_exact(&normalize("  amex "));
        assert_eq!(found, Some(&CreditorRecord::new("AMEX", "American Express")));
        assert!(index.lookup_exact("AME").is_none());
    }

    #[test]
    fn test_lookup_exact_record_code_is_normalized() {
        let index = AliasIndex::build(vec![CreditorRecord::new(" capital   one ", "Capital One")]);

        let found = index.lookup_exact("CAPITAL ONE").unwrap();
        assert_eq!(found.name, "Capital One");
    }

    #[test]
    fn test_last_write_wins_on_duplicate_codes() {
        let index = AliasIndex::build(vec![
            CreditorRecord::new("DISC", "Discover Bank"),
            CreditorRecord::new("disc", "Discover Financial Services"),
        ]);

        assert_eq!(index.code_count(), 1);
        assert_eq!(
            index.lookup_exact("DISC").unwrap().name,
            "Discover Financial Services"
        );
        // Both pairs stay searchable
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_identical_pairs_deduplicated() {
        let index = AliasIndex::build(vec![
            CreditorRecord::new("AMEX", "American Express"),
            CreditorRecord::new("AMEX", "American Express"),
        ]);

        assert_eq!(index.len(), 1);
        assert_eq!(index.search_substring("AMEX").len(), 1);
    }

    #[test]
    fn test_blank_codes_excluded() {
        let index = AliasIndex::build(vec![
            CreditorRecord::new("   ", "Nameless Lender"),
            CreditorRecord::new("", "Another"),
            CreditorRecord::new("AMEX", "American Express"),
        ]);

        assert_eq!(index.len(), 1);
        assert!(index.search_substring("LENDER").is_empty());
    }

    #[test]
    fn test_search_substring_case_insensitive() {
        let index = sample_index();

        let hits = index.search_substring("chase");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].code, "CHASE");

        // Name-only match
        let hits = index.search_substring("express");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].code, "AMEX");
    }

    #[test]
    fn test_search_substring_mixes_code_and_name_in_load_order() {
        let index = sample_index();

        // "BANK" hits CHASE by name and TBOM by name, CITI via "Citibank"
        let codes: Vec<&str> = index
            .search_substring("bank")
            .iter()
            .map(|r| r.code.as_str())
            .collect();
        assert_eq!(codes, vec!["CHASE", "CITI", "TBOM"]);

        // "CI" hits CITI by code and name
        let codes: Vec<&str> = index
            .search_substring("ci")
            .iter()
            .map(|r| r.code.as_str())
            .collect();
        assert_eq!(codes, vec!["CITI"]);
    }

    #[test]
    fn test_search_substring_no_match() {
        let index = sample_index();
        assert!(index.search_substring("ZZZ").is_empty());
    }

    #[test]
    fn test_empty_index() {
        let index = AliasIndex::empty();

        assert!(index.is_empty());
        assert!(index.lookup_exact("XYZ").is_none());
        assert!(index.search_substring("XYZ").is_empty());
    }

    #[test]
    fn test_fingerprint_tracks_content() {
        let a = sample_index();
        let b = sample_index();
        let c = AliasIndex::build(vec![CreditorRecord::new("AMEX", "American Express")]);

        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);
    }

    #[test]
    fn test_is_older_than() {
        let built = Utc::now();
        let index = AliasIndex::build_at(vec![], built);

        assert!(!index.is_older_than(Duration::seconds(60), built + Duration::seconds(30)));
        assert!(index.is_older_than(Duration::seconds(60), built + Duration::seconds(61)));
    }
}
