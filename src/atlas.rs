use std::collections::BTreeSet;
use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::RetryPolicy;
use crate::domain::Accession;
use crate::error::GxaError;

pub trait AtlasClient {
    /// Performs one GET and returns the body of a 2xx response.
    fn get_text(&self, url: &str) -> Result<String, GxaError>;
}

pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

#[derive(Clone)]
pub struct AtlasHttpClient {
    client: Client,
}

impl AtlasHttpClient {
    pub fn new(timeout: Duration) -> Result<Self, GxaError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("gxa-meta/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| GxaError::Client(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|err| GxaError::Client(err.to_string()))?;
        Ok(Self { client })
    }
}

impl AtlasClient for AtlasHttpClient {
    fn get_text(&self, url: &str) -> Result<String, GxaError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| GxaError::Http(err.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "Expression Atlas request failed".to_string());
            return Err(GxaError::Status { status, message });
        }
        response
            .text()
            .map_err(|err| GxaError::Http(err.to_string()))
    }
}

pub fn experiment_url(base_url: &str, accession: &Accession) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), accession.as_str())
}

/// Lists every experiment accession the source knows about, deduplicated and
/// sorted ascending.
pub fn list_accessions<C, S>(
    client: &C,
    sleeper: &S,
    base_url: &str,
    policy: RetryPolicy,
) -> Result<Vec<Accession>, GxaError>
where
    C: AtlasClient + ?Sized,
    S: Sleeper + ?Sized,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut last_reason = String::new();
    for attempt in 1..=max_attempts {
        if attempt > 1 {
            sleeper.sleep(policy.delay);
        }
        debug!(attempt, url = base_url, "listing experiments");
        let outcome = client
            .get_text(base_url)
            .map_err(|err| err.to_string())
            .and_then(|body| parse_accession_listing(&body));
        match outcome {
            Ok(accessions) => return Ok(accessions),
            Err(reason) => {
                if attempt < max_attempts {
                    warn!(attempt, %reason, "experiment listing failed, retrying");
                }
                last_reason = reason;
            }
        }
    }
    Err(GxaError::Listing {
        attempts: max_attempts,
        reason: last_reason,
    })
}

pub fn parse_accession_listing(body: &str) -> Result<Vec<Accession>, String> {
    let json: Value =
        serde_json::from_str(body).map_err(|err| format!("invalid listing JSON: {err}"))?;
    let entries = json
        .get("experiments")
        .and_then(|v| v.as_array())
        .ok_or_else(|| "listing has no experiments array".to_string())?;

    let mut accessions = BTreeSet::new();
    let mut dropped = 0usize;
    for entry in entries {
        let Some(raw) = entry.get("experimentAccession").and_then(|v| v.as_str()) else {
            continue;
        };
        match raw.parse::<Accession>() {
            Ok(accession) => {
                accessions.insert(accession);
            }
            Err(_) => {
                dropped += 1;
                warn!(accession = raw, "dropping malformed accession from listing");
            }
        }
    }
    if dropped > 0 {
        info!(
            dropped,
            kept = accessions.len(),
            "listing contained unusable accessions"
        );
    }
    Ok(accessions.into_iter().collect())
}

/// Fetches one experiment record, retrying with a constant delay until the
/// body parses as a JSON object carrying an `experiment` key.
pub fn fetch_experiment<C, S>(
    client: &C,
    sleeper: &S,
    base_url: &str,
    accession: &Accession,
    policy: RetryPolicy,
) -> Result<Value, GxaError>
where
    C: AtlasClient + ?Sized,
    S: Sleeper + ?Sized,
{
    let url = experiment_url(base_url, accession);
    let max_attempts = policy.max_attempts.max(1);
    let mut last_reason = String::new();
    for attempt in 1..=max_attempts {
        if attempt > 1 {
            sleeper.sleep(policy.delay);
        }
        debug!(attempt, %url, "fetching experiment");
        match client.get_text(&url) {
            Ok(body) => match accept_experiment_body(&body) {
                Ok(json) => return Ok(json),
                Err(reason) => last_reason = reason,
            },
            Err(err) => last_reason = err.to_string(),
        }
        if attempt < max_attempts {
            warn!(%accession, attempt, reason = %last_reason, "retrying experiment fetch");
        }
    }
    Err(GxaError::Fetch {
        accession: accession.to_string(),
        attempts: max_attempts,
        reason: last_reason,
    })
}

fn accept_experiment_body(body: &str) -> Result<Value, String> {
    if body.trim().is_empty() {
        return Err("empty response body".to_string());
    }
    let json: Value = serde_json::from_str(body).map_err(|err| format!("invalid JSON: {err}"))?;
    let has_experiment = json
        .as_object()
        .map(|obj| obj.contains_key("experiment"))
        .unwrap_or(false);
    if !has_experiment {
        return Err("response has no experiment object".to_string());
    }
    Ok(json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn experiment_url_joins_without_double_slash() {
        let acc: Accession = "E-MTAB-513".parse().unwrap();
        assert_eq!(
            experiment_url("https://www.ebi.ac.uk/gxa/json/experiments/", &acc),
            "https://www.ebi.ac.uk/gxa/json/experiments/E-MTAB-513"
        );
    }

    #[test]
    fn accept_rejects_whitespace_and_non_objects() {
        assert!(accept_experiment_body("  \n").is_err());
        assert!(accept_experiment_body("[1, 2]").is_err());
        assert!(accept_experiment_body("{\"columnHeaders\": []}").is_err());
        assert!(accept_experiment_body("{\"experiment\": {}}").is_ok());
    }
}
