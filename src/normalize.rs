// 🔤 Normalizer - Canonical comparison form for creditor codes
//
// "  chase   bank " and "Chase Bank" are the same alias:
// - Trim leading/trailing whitespace
// - Collapse internal whitespace runs to one space
// - Uppercase
//
// Pure and total: every string has a normalized form, empty means "no candidate".

/// Collapse every run of whitespace into a single space and trim both ends
///
/// Example: "  CHASE \t  BANK " → "CHASE BANK"
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalize a raw code into its comparable form
///
/// Idempotent: `normalize(&normalize(s)) == normalize(s)`.
pub fn normalize(raw: &str) -> String {
    collapse_whitespace(raw).to_uppercase()
}

// ============================================================================
// TESTS
// ============================================================================
