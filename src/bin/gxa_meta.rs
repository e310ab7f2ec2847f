use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use gxa_metadata::app::{Harvester, TracingProgress, emit_all};
use gxa_metadata::atlas::{AtlasHttpClient, ThreadSleeper};
use gxa_metadata::config::{
    ConfigLoader, DEFAULT_BASE_URL, DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY, DEFAULT_TIMEOUT,
    FetchFailurePolicy, HarvestSettings,
};
use gxa_metadata::domain::ExperimentDocument;
use gxa_metadata::error::GxaError;
use gxa_metadata::output::{ConsoleSink, DocumentSink, RecordSink, TableSink};

#[derive(Parser)]
#[command(name = "gxa-meta")]
#[command(about = "Harvest Expression Atlas experiment metadata into YAML and TSV")]
#[command(version, author)]
struct Cli {
    /// Output YAML document followed by output TSV table
    #[arg(value_name = "OUTPUT")]
    outputs: Vec<Utf8PathBuf>,

    /// Print the YAML document to stdout instead of writing files
    #[arg(long)]
    stdout: bool,

    #[arg(long, default_value = DEFAULT_BASE_URL)]
    base_url: String,

    #[arg(long, default_value_t = DEFAULT_MAX_ATTEMPTS)]
    max_attempts: u32,

    #[arg(long, default_value_t = DEFAULT_RETRY_DELAY.as_secs())]
    retry_delay_secs: u64,

    #[arg(long, default_value_t = 1)]
    listing_attempts: u32,

    #[arg(long, default_value_t = DEFAULT_TIMEOUT.as_secs())]
    timeout_secs: u64,

    #[arg(long, value_enum, default_value_t = FetchFailurePolicy::Skip)]
    on_fetch_error: FetchFailurePolicy,

    /// Only harvest these accessions (skips the listing call)
    #[arg(long = "accession")]
    accessions: Vec<String>,

    #[arg(long)]
    limit: Option<usize>,

    /// Assay-group properties merged into the TSV (repeatable)
    #[arg(long = "keep-key")]
    keep_keys: Vec<String>,
}

enum Outputs {
    Files { yaml: Utf8PathBuf, tsv: Utf8PathBuf },
    Stdout,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) {
                err.exit();
            }
            let _ = err.print();
            return ExitCode::from(1);
        }
    };
    let Some(outputs) = select_outputs(&cli) else {
        eprintln!("{}", Cli::command().render_usage());
        return ExitCode::from(1);
    };

    if let Err(report) = run(cli, outputs) {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<GxaError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn select_outputs(cli: &Cli) -> Option<Outputs> {
    match (cli.stdout, cli.outputs.as_slice()) {
        (true, []) => Some(Outputs::Stdout),
        (false, [yaml, tsv]) => Some(Outputs::Files {
            yaml: yaml.clone(),
            tsv: tsv.clone(),
        }),
        _ => None,
    }
}

fn map_exit_code(error: &GxaError) -> u8 {
    match error {
        GxaError::Listing { .. }
        | GxaError::Fetch { .. }
        | GxaError::Http(_)
        | GxaError::Status { .. } => 3,
        _ => 1,
    }
}

fn run(cli: Cli, outputs: Outputs) -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = ConfigLoader::resolve(HarvestSettings {
        base_url: cli.base_url,
        max_attempts: cli.max_attempts,
        retry_delay_secs: cli.retry_delay_secs,
        listing_attempts: cli.listing_attempts,
        timeout_secs: cli.timeout_secs,
        on_fetch_error: cli.on_fetch_error,
        accessions: cli.accessions,
        limit: cli.limit,
        keep_keys: cli.keep_keys,
    })?;

    let mut sinks: Vec<Box<dyn RecordSink>> = match outputs {
        Outputs::Files { yaml, tsv } => vec![
            Box::new(DocumentSink::new(yaml)),
            Box::new(TableSink::new(tsv, config.keep_keys.clone())),
        ],
        Outputs::Stdout => vec![Box::new(ConsoleSink::stdout())],
    };

    let client = AtlasHttpClient::new(config.timeout)?;
    let harvester = Harvester::new(client, ThreadSleeper, config);
    let result = harvester.harvest(&TracingProgress)?;

    let document = ExperimentDocument::stamped_now(result.records);
    emit_all(&document, &mut sinks)?;

    if !result.skipped.is_empty() {
        let skipped = result
            .skipped
            .iter()
            .map(|acc| acc.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        eprintln!("skipped {} experiment(s): {skipped}", result.skipped.len());
    }
    Ok(())
}
