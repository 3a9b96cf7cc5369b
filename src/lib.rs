// Creditor Resolver - Core Library
// Resolves pasted / typed creditor codes against the master alias list.
// Exposes all modules for use in CLI, API server, and tests

pub mod normalize;
pub mod tokenizer;
pub mod index;
pub mod engine;
pub mod reporter;
pub mod loader;
pub mod db;
pub mod resolver;
pub mod config;
pub mod error;

// Re-export commonly used types
pub use normalize::{normalize, collapse_whitespace};
pub use tokenizer::tokenize;
pub use index::{AliasIndex, CreditorRecord};
pub use engine::{
    MatchEngine, NoiseFilter, BatchResult, BatchHit, BatchSummary,
    DEFAULT_NOISE_TOKENS, DEFAULT_MIN_CODE_LENGTH,
};
pub use reporter::{MissRecord, MissReporter, MissStore};
pub use loader::{AliasCache, AliasSource, CsvAliasSource, FetchMode, load_creditors_csv};
pub use db::{
    SqliteStore,
    setup_database, replace_creditors, fetch_creditors, count_creditors,
    append_miss_records, get_miss_records,
};
pub use resolver::{CreditorResolver, SearchOutcome, BatchOutcome};
pub use config::ResolverConfig;
pub use error::{ResolverError, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Install the tracing subscriber used by the binaries
///
/// `RUST_LOG` selects the filter (default `info`), `CREDITOR_LOG_FORMAT=json`
/// switches to JSON lines.
pub fn init_tracing() {
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::{fmt, EnvFilter};

    let log_format = std::env::var("CREDITOR_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_current_span(false).with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}
