// ⚠️ Error taxonomy for the resolution engine
//
// Text handling never fails: normalization and tokenizing are total over any
// input, so there is no "malformed input" variant. Everything below degrades
// to "no match" or "report not saved" at the facade.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ResolverError>;

#[derive(Error, Debug)]
pub enum ResolverError {
    /// The alias table could not be fetched from its collaborator
    #[error("Creditor alias table unavailable: {0}")]
    DataUnavailable(String),

    /// Appending unresolved codes to the miss store failed
    #[error("Failed to save unresolved codes: {0}")]
    MissReportFailure(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}
