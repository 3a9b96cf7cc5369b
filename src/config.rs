// ⚙️ Configuration - Environment driven, `.env` aware
//
// CREDITOR_DB_PATH         SQLite file holding creditors + miss_reports
// CREDITOR_CACHE_TTL_SECS  max age of the interactive snapshot
// CREDITOR_MIN_CODE_LEN    shortest batch candidate considered a code
// CREDITOR_NOISE_TOKENS    extra header words to ignore (comma-separated)
// CREDITOR_SERVER_ADDR     listen address for creditor-server

use crate::engine::{NoiseFilter, DEFAULT_MIN_CODE_LENGTH};
use crate::error::{ResolverError, Result};
use chrono::Duration;
use std::path::PathBuf;

pub const DEFAULT_DB_PATH: &str = "creditors.db";
pub const DEFAULT_CACHE_TTL_SECS: i64 = 600;
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:3000";

#[derive(Debug, Clone, PartialEq)]
pub struct ResolverConfig {
    pub database_path: PathBuf,
    pub cache_max_age: Duration,
    pub min_code_length: usize,
    pub extra_noise_tokens: Vec<String>,
    pub listen_addr: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        ResolverConfig {
            database_path: PathBuf::from(DEFAULT_DB_PATH),
            cache_max_age: Duration::seconds(DEFAULT_CACHE_TTL_SECS),
            min_code_length: DEFAULT_MIN_CODE_LENGTH,
            extra_noise_tokens: Vec::new(),
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
        }
    }
}

impl ResolverConfig {
    /// Read `.env` (if present), then the process environment
    pub fn from_env() -> Result<Self> {
        // Missing .env is fine
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key → value lookup; unset keys keep their defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = ResolverConfig::default();

        if let Some(path) = non_empty(lookup("CREDITOR_DB_PATH")) {
            config.database_path = PathBuf::from(path);
        }

        if let Some(raw) = non_empty(lookup("CREDITOR_CACHE_TTL_SECS")) {
            let secs: i64 = parse_number("CREDITOR_CACHE_TTL_SECS", &raw)?;
            if secs < 0 {
                return Err(ResolverError::Config(format!(
                    "CREDITOR_CACHE_TTL_SECS must not be negative, got {}",
                    secs
                )));
            }
            config.cache_max_age = Duration::seconds(secs);
        }

        if let Some(raw) = non_empty(lookup("CREDITOR_MIN_CODE_LEN")) {
            config.min_code_length = parse_number("CREDITOR_MIN_CODE_LEN", &raw)?;
        }

        if let Some(raw) = non_empty(lookup("CREDITOR_NOISE_TOKENS")) {
            config.extra_noise_tokens = raw
                .split(',')
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect();
        }

        if let Some(addr) = non_empty(lookup("CREDITOR_SERVER_ADDR")) {
            config.listen_addr = addr;
        }

        Ok(config)
    }

    pub fn noise_filter(&self) -> NoiseFilter {
        NoiseFilter::with_extra(&self.extra_noise_tokens)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.parse::<T>()
        .map_err(|_| ResolverError::Config(format!("{} is not a valid number: {:?}", key, raw)))
}

// ============================================================================
// TESTS
// ============================================================================
