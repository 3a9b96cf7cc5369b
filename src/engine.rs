// 🎯 Match Engine - Interactive search and batch validation
//
// Two strategies over one AliasIndex snapshot:
// - Interactive: substring containment over code and name (agent typing a query)
// - Batch: exact match of one tokenized code per pasted line (audit validation)
//
// Both are pure over (index, input): same text + same snapshot = same result.

use crate::index::{AliasIndex, CreditorRecord};
use crate::normalize::normalize;
use crate::tokenizer::tokenize;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

/// Spreadsheet header words that get pasted along with the data
pub const DEFAULT_NOISE_TOKENS: &[&str] = &[
    "CREDITOR",
    "CREDITORS",
    "CREDITOR NAME",
    "ACCOUNT",
    "ACCOUNT NUMBER",
    "BALANCE",
    "CURRENT BALANCE",
    "DEBT",
    "AMOUNT",
    "TOTAL",
    "NAME",
];

/// Minimum normalized length of a batch candidate
pub const DEFAULT_MIN_CODE_LENGTH: usize = 2;

// ============================================================================
// NOISE FILTER
// ============================================================================

/// Stoplist of normalized tokens that are never treated as codes
#[derive(Debug, Clone)]
pub struct NoiseFilter {
    tokens: HashSet<String>,
}

impl NoiseFilter {
    /// Built-in stoplist plus extra tokens (normalized on the way in)
    pub fn with_extra<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut tokens: HashSet<String> = DEFAULT_NOISE_TOKENS.iter().map(|t| t.to_string()).collect();
        tokens.extend(
            extra
                .into_iter()
                .map(|t| normalize(t.as_ref()))
                .filter(|t| !t.is_empty()),
        );
        NoiseFilter { tokens }
    }

    /// `normalized` must already be normalized
    pub fn is_noise(&self, normalized: &str) -> bool {
        self.tokens.contains(normalized)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl Default for NoiseFilter {
    fn default() -> Self {
        Self::with_extra(Vec::<String>::new())
    }
}

// ============================================================================
// BATCH RESULT
// ============================================================================

/// A pasted line whose candidate matched a known alias exactly
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchHit {
    /// 1-based line number in the submitted text
    pub line_number: usize,

    /// The line as pasted
    pub input_line: String,

    /// Normalized candidate that was looked up
    pub candidate: String,

    pub record: CreditorRecord,
}

/// Per-batch counters, for the agent's summary line
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub lines_total: usize,
    pub lines_blank: usize,
    /// Non-blank lines the tokenizer found nothing in
    pub no_candidate: usize,
    pub discarded_noise: usize,
    pub discarded_short: usize,
    pub hits: usize,
    /// Distinct missed codes
    pub misses: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResult {
    pub case_reference: String,

    /// Fingerprint of the snapshot the batch was resolved against
    pub snapshot_fingerprint: String,

    /// One entry per matching line, in line order
    pub hits: Vec<BatchHit>,

    /// Distinct normalized candidates with no exact match
    pub misses: BTreeSet<String>,

    pub summary: BatchSummary,
}

impl BatchResult {
    pub fn has_misses(&self) -> bool {
        !self.misses.is_empty()
    }

    pub fn summary_line(&self) -> String {
        format!(
            "{} lines, {} matched, {} unresolved, {} skipped",
            self.summary.lines_total,
            self.summary.hits,
            self.summary.misses,
            self.summary.lines_blank
                + self.summary.no_candidate
                + self.summary.discarded_noise
                + self.summary.discarded_short
        )
    }
}

// ============================================================================
// MATCH ENGINE
// ============================================================================

#[derive(Debug, Clone)]
pub struct MatchEngine {
    noise: NoiseFilter,
    min_code_length: usize,
}

impl MatchEngine {
    pub fn new(noise: NoiseFilter, min_code_length: usize) -> Self {
        MatchEngine {
            noise,
            min_code_length,
        }
    }

    /// Substring search for an agent's typed query
    ///
    /// The query is normalized (trimmed, collapsed, uppercased). Short queries
    /// are allowed; an empty one means no search was performed.
    pub fn match_interactive(&self, index: &AliasIndex, raw_query: &str) -> Vec<CreditorRecord> {
        let query = normalize(raw_query);
        if query.is_empty() {
            return Vec::new();
        }

        index
            .search_substring(&query)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Resolve every line of a pasted block by exact match
    pub fn validate_batch(
        &self,
        index: &AliasIndex,
        raw_text: &str,
        case_reference: &str,
    ) -> BatchResult {
        let mut summary = BatchSummary::default();
        let mut hits = Vec::new();
        let mut misses = BTreeSet::new();

        for (i, line) in raw_text.lines().enumerate() {
            summary.lines_total += 1;

            if line.trim().is_empty() {
                summary.lines_blank += 1;
                continue;
            }

            let candidate = normalize(&tokenize(line));
            if candidate.is_empty() {
                summary.no_candidate += 1;
                continue;
            }
            if self.noise.is_noise(&candidate) {
                summary.discarded_noise += 1;
                continue;
            }
            if candidate.chars().count() < self.min_code_length {
                summary.discarded_short += 1;
                continue;
            }

            match index.lookup_exact(&candidate) {
                Some(record) => hits.push(BatchHit {
                    line_number: i + 1,
                    input_line: line.to_string(),
                    candidate,
                    record: record.clone(),
                }),
                None => {
                    misses.insert(candidate);
                }
            }
        }

        summary.hits = hits.len();
        summary.misses = misses.len();

        BatchResult {
            case_reference: case_reference.to_string(),
            snapshot_fingerprint: index.fingerprint().to_string(),
            hits,
            misses,
            summary,
        }
    }
}

impl Default for MatchEngine {
    fn default() -> Self {
        Self::new(NoiseFilter::default(), DEFAULT_MIN_CODE_LENGTH)
    }
}

// ============================================================================
// TESTS
// ============================================================================
