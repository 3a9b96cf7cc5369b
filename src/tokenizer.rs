// ✂️ Line Tokenizer - Pull one candidate creditor code out of a pasted line
//
// Agents paste rows from spreadsheets and CRM screens:
//   "AMEX\t$120.00"            → "AMEX"
//   "Chase Bank    1,200.00"   → "Chase Bank"
//   "CHASE1234.56"             → "CHASE"
//
// The code is conventionally the first column; balances trail it, sometimes
// glued on with no separator. Each step below is a pure string → string
// transform, applied in PIPELINE order. Case is preserved; callers normalize.

use crate::normalize::collapse_whitespace;

pub const CURRENCY_SYMBOL: char = '$';

/// One pure transformation over the candidate text
pub type Step = fn(&str) -> String;

/// Tokenizer steps in application order
pub const PIPELINE: [(&str, Step); 4] = [
    ("first_column", first_column),
    ("strip_amount_tail", strip_amount_tail),
    ("collapse_whitespace", collapse_whitespace),
    ("require_letter", require_letter),
];

/// Extract the candidate code from one line of pasted text
///
/// Returns "" when the line holds no candidate (blank, numbers only, ...).
pub fn tokenize(line: &str) -> String {
    PIPELINE
        .iter()
        .fold(line.trim().to_string(), |text, (_, step)| step(&text))
}

// ============================================================================
// STEPS
// ============================================================================

/// Keep the first column: text before the first tab or run of 2+ spaces
pub fn first_column(line: &str) -> String {
    let bytes = line.as_bytes();

    for (i, b) in bytes.iter().enumerate() {
        if *b == b'\t' || (*b == b' ' && bytes.get(i + 1) == Some(&b' ')) {
            return line[..i].to_string();
        }
    }

    line.to_string()
}

/// Drop a balance figure trailing the code
///
/// Cuts at the first currency symbol, then at a trailing amount: the longest
/// suffix of digits, ',' and '.' that starts with a digit and has a separator
/// followed by a digit. Whole numeric words after whitespace ("AMEX 500") go
/// too. A digit run glued to the code with no separator ("TBOM1") stays.
pub fn strip_amount_tail(base: &str) -> String {
    let before_currency = match base.find(CURRENCY_SYMBOL) {
        Some(pos) => &base[..pos],
        None => base,
    };
    let trimmed = before_currency.trim_end();

    let mut kept = match amount_suffix_start(trimmed) {
        Some(pos) => trimmed[..pos].trim_end_matches(|c: char| c == '-' || c.is_whitespace()),
        None => trimmed,
    };

    while let Some((head, last_word)) = kept.rsplit_once(char::is_whitespace) {
        if !is_numeric_word(last_word) {
            break;
        }
        kept = head.trim_end();
    }

    kept.to_string()
}

/// Discard candidates with no letter at all (pure numbers or punctuation)
pub fn require_letter(candidate: &str) -> String {
    if candidate.chars().any(char::is_alphabetic) {
        candidate.to_string()
    } else {
        String::new()
    }
}

/// A standalone figure such as "500", "-45" or "1,200"
fn is_numeric_word(word: &str) -> bool {
    word.chars().any(|c| c.is_ascii_digit())
        && word
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, ',' | '.' | '-'))
}

/// Byte offset where a trailing amount ("1234.56", "1,200") begins
fn amount_suffix_start(s: &str) -> Option<usize> {
    let start = s
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit() || *c == ',' || *c == '.')
        .last()
        .map(|(i, _)| i)?;

    let suffix = &s[start..];
    let first_digit = suffix.find(|c: char| c.is_ascii_digit())?;
    let amount = &suffix[first_digit..];

    let has_separated_digits = amount
        .as_bytes()
        .windows(2)
        .any(|w| (w[0] == b',' || w[0] == b'.') && w[1].is_ascii_digit());

    if has_separated_digits {
        Some(start + first_digit)
    } else {
        None
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_column_splits_on_tab() {
        assert_eq!(first_column("AMEX\t$120.00"), "AMEX");
        assert_eq!(first_column("Creditor\tBalance"), "Creditor");
    }

    #[test]
    fn test_first_column_splits_on_wide_spaces() {
        assert_eq!(first_column("Chase Bank   1,200.00"), "Chase Bank");
        assert_eq!(first_column("CITI  500"), "CITI");
    }

    #[test]
    fn test_first_column_keeps_single_spaces() {
        assert_eq!(first_column("Chase Bank"), "Chase Bank");
        assert_eq!(first_column("Wells Fargo 300"), "Wells Fargo 300");
    }

    #[test]
    fn test_strip_amount_tail_currency() {
        assert_eq!(strip_amount_tail("AMEX $120.00"), "AMEX");
        assert_eq!(strip_amount_tail("AMEX$5"), "AMEX");
        assert_eq!(strip_amount_tail("$45.00"), "");
    }

    #[test]
    fn test_strip_amount_tail_glued_balance() {
        assert_eq!(strip_amount_tail("CHASE1234.56"), "CHASE");
        assert_eq!(strip_amount_tail("Wells Fargo 1,200"), "Wells Fargo");
        assert_eq!(strip_amount_tail("CITI -45.10"), "CITI");
    }

    #[test]
    fn test_strip_amount_tail_keeps_code_digits() {
        assert_eq!(strip_amount_tail("TBOM1"), "TBOM1");
        assert_eq!(strip_amount_tail("CHASE1234"), "CHASE1234");
        assert_eq!(strip_amount_tail("ACME CO."), "ACME CO.");
    }

    #[test]
    fn test_strip_amount_tail_spaced_integer_balance() {
        assert_eq!(strip_amount_tail("AMEX 500"), "AMEX");
        assert_eq!(strip_amount_tail("Wells Fargo 300"), "Wells Fargo");
        assert_eq!(strip_amount_tail("CITI -45"), "CITI");
        assert_eq!(strip_amount_tail("CAP1 360 12"), "CAP1");
        assert_eq!(strip_amount_tail("500"), "500");
    }

    #[test]
    fn test_require_letter() {
        assert_eq!(require_letter("AMEX"), "AMEX");
        assert_eq!(require_letter("12345"), "");
        assert_eq!(require_letter("--"), "");
        assert_eq!(require_letter(""), "");
    }

    #[test]
    fn test_tokenize_examples() {
        assert_eq!(tokenize("AMEX\t$120.00"), "AMEX");
        assert_eq!(tokenize("CHASE1234.56"), "CHASE");
        assert_eq!(tokenize("AMEX123\t$45.00"), "AMEX123");
        assert_eq!(tokenize("TBOM1"), "TBOM1");
        assert_eq!(tokenize("AMEX 500"), "AMEX");
        assert_eq!(tokenize("UNKNOWNCO"), "UNKNOWNCO");
    }

    #[test]
    fn test_tokenize_preserves_case_and_collapses() {
        assert_eq!(tokenize("Chase \u{00A0}Bank"), "Chase Bank");
        assert_eq!(tokenize("   capital one\t  900.00"), "capital one");
    }

    #[test]
    fn test_tokenize_no_candidate() {
        assert_eq!(tokenize(""), "");
        assert_eq!(tokenize("   "), "");
        assert_eq!(tokenize("12345"), "");
        assert_eq!(tokenize("$1,200.00"), "");
        assert_eq!(tokenize("\t\tAMEX"), "AMEX");
    }

    #[test]
    fn test_pipeline_order() {
        let names: Vec<&str> = PIPELINE.iter().map(|(name, _)| *name).collect();
        assert_eq!(
            names,
            vec!["first_column", "strip_amount_tail", "collapse_whitespace", "require_letter"]
        );
    }
}
