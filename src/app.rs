use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::atlas::{AtlasClient, Sleeper, fetch_experiment, list_accessions};
use crate::config::{FetchFailurePolicy, HarvestConfig};
use crate::domain::{Accession, ExperimentDocument, ExperimentRecord};
use crate::error::GxaError;
use crate::normalize::normalize_experiment;
use crate::output::RecordSink;

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

/// Forwards progress to the log.
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn event(&self, event: ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => info!(elapsed_ms = elapsed.as_millis() as u64, "{}", event.message),
            None => info!("{}", event.message),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HarvestResult {
    pub records: Vec<ExperimentRecord>,
    pub skipped: Vec<Accession>,
}

pub struct Harvester<C: AtlasClient, S: Sleeper> {
    client: C,
    sleeper: S,
    config: HarvestConfig,
}

impl<C: AtlasClient, S: Sleeper> Harvester<C, S> {
    pub fn new(client: C, sleeper: S, config: HarvestConfig) -> Self {
        Self {
            client,
            sleeper,
            config,
        }
    }

    /// Explicit accessions win over the listing endpoint; `limit` applies to
    /// either.
    pub fn accessions(&self) -> Result<Vec<Accession>, GxaError> {
        let mut accessions = if self.config.accessions.is_empty() {
            list_accessions(
                &self.client,
                &self.sleeper,
                &self.config.base_url,
                self.config.listing_retry,
            )?
        } else {
            self.config.accessions.clone()
        };
        if let Some(limit) = self.config.limit {
            accessions.truncate(limit);
        }
        Ok(accessions)
    }

    pub fn harvest(&self, sink: &dyn ProgressSink) -> Result<HarvestResult, GxaError> {
        let accessions = self.accessions()?;
        let total = accessions.len();
        sink.event(ProgressEvent {
            message: format!("found {total} experiment(s)"),
            elapsed: None,
        });

        let mut records = Vec::with_capacity(total);
        let mut skipped = Vec::new();
        let mut sequence_number = 0usize;
        for (index, accession) in accessions.into_iter().enumerate() {
            let started = Instant::now();
            let raw = match fetch_experiment(
                &self.client,
                &self.sleeper,
                &self.config.base_url,
                &accession,
                self.config.fetch_retry,
            ) {
                Ok(raw) => raw,
                Err(err) => match self.config.on_fetch_error {
                    FetchFailurePolicy::Abort => return Err(err),
                    FetchFailurePolicy::Skip => {
                        warn!(%accession, error = %err, "skipping experiment");
                        skipped.push(accession);
                        continue;
                    }
                },
            };
            sequence_number += 1;
            let record = normalize_experiment(&raw, &accession, sequence_number);
            sink.event(ProgressEvent {
                message: format!(
                    "[{}/{total}] {accession}: {} assay group(s)",
                    index + 1,
                    record.assay_groups.len()
                ),
                elapsed: Some(started.elapsed()),
            });
            records.push(record);
        }

        if !skipped.is_empty() {
            warn!(skipped = skipped.len(), "some experiments could not be fetched");
        }
        Ok(HarvestResult { records, skipped })
    }
}

/// Hands the same document to every sink, stopping at the first failure.
pub fn emit_all(
    document: &ExperimentDocument,
    sinks: &mut [Box<dyn RecordSink>],
) -> Result<(), GxaError> {
    for sink in sinks.iter_mut() {
        sink.emit(document)?;
    }
    Ok(())
}
