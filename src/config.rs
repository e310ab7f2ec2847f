use std::collections::BTreeSet;
use std::time::Duration;

use clap::ValueEnum;
use serde::Serialize;

use crate::domain::Accession;
use crate::error::GxaError;
use crate::flatten::DEFAULT_KEEP_KEYS;

pub const DEFAULT_BASE_URL: &str = "https://www.ebi.ac.uk/gxa/json/experiments";
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// What the harvest does with an accession whose record never arrives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FetchFailurePolicy {
    #[default]
    Skip,
    Abort,
}

/// Constant-delay retry budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    pub fn single_attempt() -> Self {
        Self::new(1, DEFAULT_RETRY_DELAY)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY)
    }
}

/// Unvalidated settings as they come off the command line.
#[derive(Debug, Clone)]
pub struct HarvestSettings {
    pub base_url: String,
    pub max_attempts: u32,
    pub retry_delay_secs: u64,
    pub listing_attempts: u32,
    pub timeout_secs: u64,
    pub on_fetch_error: FetchFailurePolicy,
    pub accessions: Vec<String>,
    pub limit: Option<usize>,
    pub keep_keys: Vec<String>,
}

impl Default for HarvestSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay_secs: DEFAULT_RETRY_DELAY.as_secs(),
            listing_attempts: 1,
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
            on_fetch_error: FetchFailurePolicy::Skip,
            accessions: Vec::new(),
            limit: None,
            keep_keys: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HarvestConfig {
    pub base_url: String,
    pub fetch_retry: RetryPolicy,
    pub listing_retry: RetryPolicy,
    pub timeout: Duration,
    pub on_fetch_error: FetchFailurePolicy,
    /// When non-empty the listing call is skipped.
    pub accessions: Vec<Accession>,
    pub limit: Option<usize>,
    pub keep_keys: Vec<String>,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            fetch_retry: RetryPolicy::default(),
            listing_retry: RetryPolicy::single_attempt(),
            timeout: DEFAULT_TIMEOUT,
            on_fetch_error: FetchFailurePolicy::Skip,
            accessions: Vec::new(),
            limit: None,
            keep_keys: default_keep_keys(),
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(settings: HarvestSettings) -> Result<HarvestConfig, GxaError> {
        if settings.max_attempts == 0 {
            return Err(GxaError::InvalidConfig(
                "--max-attempts must be at least 1".to_string(),
            ));
        }
        if settings.listing_attempts == 0 {
            return Err(GxaError::InvalidConfig(
                "--listing-attempts must be at least 1".to_string(),
            ));
        }
        let base_url = settings.base_url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(GxaError::InvalidConfig("--base-url is empty".to_string()));
        }

        let accessions = settings
            .accessions
            .iter()
            .map(|value| value.parse::<Accession>())
            .collect::<Result<BTreeSet<_>, GxaError>>()?
            .into_iter()
            .collect();

        let keep_keys = if settings.keep_keys.is_empty() {
            default_keep_keys()
        } else {
            settings.keep_keys
        };

        let delay = Duration::from_secs(settings.retry_delay_secs);
        Ok(HarvestConfig {
            base_url,
            fetch_retry: RetryPolicy::new(settings.max_attempts, delay),
            listing_retry: RetryPolicy::new(settings.listing_attempts, delay),
            timeout: Duration::from_secs(settings.timeout_secs),
            on_fetch_error: settings.on_fetch_error,
            accessions,
            limit: settings.limit,
            keep_keys,
        })
    }
}

pub fn default_keep_keys() -> Vec<String> {
    DEFAULT_KEEP_KEYS.iter().map(|key| key.to_string()).collect()
}
