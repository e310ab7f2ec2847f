use std::cell::Cell;
use std::fs;
use std::time::Duration;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use gxa_metadata::app::{Harvester, ProgressEvent, ProgressSink, emit_all};
use gxa_metadata::atlas::{AtlasClient, Sleeper};
use gxa_metadata::config::{FetchFailurePolicy, HarvestConfig, RetryPolicy, default_keep_keys};
use gxa_metadata::domain::ExperimentDocument;
use gxa_metadata::error::GxaError;
use gxa_metadata::output::{ConsoleSink, DocumentSink, RecordSink, TableSink, render_yaml};

const BASE_URL: &str = "https://atlas.test/gxa/json/experiments";
const RUN_DATE: &str = "2024-05-06 07:08:09";

struct NoopSink;

impl ProgressSink for NoopSink {
    fn event(&self, _event: ProgressEvent) {}
}

#[derive(Default)]
struct CountingSleeper {
    calls: Cell<usize>,
}

impl Sleeper for CountingSleeper {
    fn sleep(&self, _duration: Duration) {
        self.calls.set(self.calls.get() + 1);
    }
}

/// Serves the JSON fixtures; any accession without one gets a 404.
struct FixtureAtlas;

impl AtlasClient for FixtureAtlas {
    fn get_text(&self, url: &str) -> Result<String, GxaError> {
        let name = match url.strip_prefix(BASE_URL) {
            Some("") => "listing".to_string(),
            Some(rest) => rest.trim_start_matches('/').to_string(),
            None => return Err(GxaError::Http(format!("unexpected url {url}"))),
        };
        fs::read_to_string(format!("tests/fixtures/{name}.json")).map_err(|_| GxaError::Status {
            status: 404,
            message: format!("no fixture for {name}"),
        })
    }
}

fn config() -> HarvestConfig {
    HarvestConfig {
        base_url: BASE_URL.to_string(),
        fetch_retry: RetryPolicy::new(5, Duration::ZERO),
        ..HarvestConfig::default()
    }
}

fn fixture_document() -> ExperimentDocument {
    let harvester = Harvester::new(FixtureAtlas, CountingSleeper::default(), config());
    let result = harvester.harvest(&NoopSink).unwrap();
    assert!(result.skipped.is_empty());
    ExperimentDocument::new(RUN_DATE, result.records)
}

#[test]
fn end_to_end_outputs_match_golden_files() {
    let temp = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    let yaml_path = root.join("experiments.yaml");
    let tsv_path = root.join("experiments.tsv");

    let document = fixture_document();
    let mut sinks: Vec<Box<dyn RecordSink>> = vec![
        Box::new(DocumentSink::new(yaml_path.clone())),
        Box::new(TableSink::new(tsv_path.clone(), default_keep_keys())),
    ];
    emit_all(&document, &mut sinks).unwrap();

    assert_eq!(
        fs::read_to_string(&yaml_path).unwrap(),
        fs::read_to_string("tests/golden/experiments.yaml").unwrap()
    );
    assert_eq!(
        fs::read_to_string(&tsv_path).unwrap(),
        fs::read_to_string("tests/golden/experiments.tsv").unwrap()
    );
}

#[test]
fn document_counts_and_numbers_records() {
    let document = fixture_document();
    assert_eq!(document.experiment_count, 2);
    let numbered: Vec<(usize, &str)> = document
        .experiments
        .iter()
        .map(|r| (r.sequence_number, r.accession.as_str()))
        .collect();
    assert_eq!(numbered, vec![(1, "E-GEOD-1000"), (2, "E-MTAB-2000")]);
}

#[test]
fn console_sink_writes_the_same_document() {
    let document = fixture_document();
    let mut console = ConsoleSink::new(Vec::new());
    console.emit(&document).unwrap();
    let printed = String::from_utf8(console.into_inner()).unwrap();
    assert_eq!(printed, render_yaml(&document).unwrap());
    assert!(printed.starts_with("---\n"));
}

#[test]
fn missing_records_are_skipped_by_default() {
    let config = HarvestConfig {
        accessions: vec!["E-GEOD-1000".parse().unwrap(), "E-MTAB-404".parse().unwrap()],
        ..config()
    };
    let sleeper = CountingSleeper::default();
    let harvester = Harvester::new(FixtureAtlas, sleeper, config);

    let result = harvester.harvest(&NoopSink).unwrap();
    assert_eq!(result.records.len(), 1);
    assert_eq!(result.skipped[0].as_str(), "E-MTAB-404");
}

#[test]
fn abort_policy_surfaces_fetch_error() {
    let config = HarvestConfig {
        accessions: vec!["E-MTAB-404".parse().unwrap()],
        fetch_retry: RetryPolicy::new(2, Duration::ZERO),
        on_fetch_error: FetchFailurePolicy::Abort,
        ..config()
    };
    let harvester = Harvester::new(FixtureAtlas, CountingSleeper::default(), config);

    let err = harvester.harvest(&NoopSink).unwrap_err();
    assert_matches!(err, GxaError::Fetch { attempts: 2, .. });
}

#[test]
fn limit_truncates_the_listing() {
    let config = HarvestConfig {
        limit: Some(1),
        ..config()
    };
    let harvester = Harvester::new(FixtureAtlas, CountingSleeper::default(), config);
    let accessions = harvester.accessions().unwrap();
    assert_eq!(accessions.len(), 1);
    assert_eq!(accessions[0].as_str(), "E-GEOD-1000");
}

#[test]
fn unwritable_output_names_the_path() {
    let temp = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    let target = root.join("missing-dir").join("out.yaml");

    let mut sink = DocumentSink::new(target.clone());
    let err = sink
        .emit(&ExperimentDocument::new(RUN_DATE, Vec::new()))
        .unwrap_err();
    assert_matches!(err, GxaError::Output { ref path, .. } if *path == target);
}
