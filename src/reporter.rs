// 📮 Miss Reporter - Record codes that failed batch validation
//
// Unresolved codes go to an append-only store, tagged with the agent's case
// reference, for the curation team to review. This side only writes.
//
// - Empty set: nothing to write, succeeds trivially
// - A failed append fails the whole report (no partial-success accounting)
// - Not idempotent: reporting the same codes twice appends them twice

use crate::error::{ResolverError, Result};
use crate::normalize::normalize;
use anyhow::Result as StoreResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

// ============================================================================
// MISS RECORD
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissRecord {
    /// Shared by every row written in one report call
    pub report_id: String,

    /// Normalized, unmatched candidate
    pub code: String,

    /// Free-form case / ticket identifier
    pub case_reference: String,

    pub reported_at: DateTime<Utc>,
}

// ============================================================================
// MISS STORE (outbound boundary)
// ============================================================================

/// Append-only sink for miss records
pub trait MissStore: Send + Sync {
    /// Append all rows; any failure fails the whole call
    fn append_miss_records(&self, rows: &[MissRecord]) -> StoreResult<()>;
}

// ============================================================================
// MISS REPORTER
// ============================================================================

#[derive(Clone)]
pub struct MissReporter {
    store: Arc<dyn MissStore>,
}

impl MissReporter {
    pub fn new(store: Arc<dyn MissStore>) -> Self {
        MissReporter { store }
    }

    /// Report codes, true when they were saved (or there was nothing to save)
    pub fn report_misses(&self, codes: &BTreeSet<String>, case_reference: &str) -> bool {
        match self.try_report(codes, case_reference) {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(
                    case_reference,
                    codes = codes.len(),
                    error = %e,
                    "miss report not saved"
                );
                false
            }
        }
    }

    /// Same as `report_misses`, returning the number of rows written
    ///
    /// Codes are normalized first; blank ones are dropped.
    pub fn try_report(&self, codes: &BTreeSet<String>, case_reference: &str) -> Result<usize> {
        let codes: BTreeSet<String> = codes
            .iter()
            .map(|code| normalize(code))
            .filter(|code| !code.is_empty())
            .collect();

        if codes.is_empty() {
            return Ok(0);
        }

        let rows = build_rows(&codes, case_reference, Utc::now());

        self.store
            .append_miss_records(&rows)
            .map_err(|e| ResolverError::MissReportFailure(format!("{:#}", e)))?;

        tracing::info!(
            case_reference,
            report_id = %rows[0].report_id,
            codes = rows.len(),
            "miss report saved"
        );

        Ok(rows.len())
    }
}

/// One row per code, all sharing a fresh report id
fn build_rows(
    codes: &BTreeSet<String>,
    case_reference: &str,
    reported_at: DateTime<Utc>,
) -> Vec<MissRecord> {
    let report_id = uuid::Uuid::new_v4().to_string();

    codes
        .iter()
        .map(|code| MissRecord {
            report_id: report_id.clone(),
            code: code.clone(),
            case_reference: case_reference.to_string(),
            reported_at,
        })
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================
