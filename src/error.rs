use camino::Utf8PathBuf;
use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum GxaError {
    #[error("invalid experiment accession: {0}")]
    InvalidAccession(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to build HTTP client: {0}")]
    Client(String),

    #[error("Expression Atlas request failed: {0}")]
    Http(String),

    #[error("Expression Atlas returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("failed to list experiments after {attempts} attempt(s): {reason}")]
    #[diagnostic(help("check network access to the Expression Atlas API or raise --listing-attempts"))]
    Listing { attempts: u32, reason: String },

    #[error("failed to fetch {accession} after {attempts} attempt(s): {reason}")]
    Fetch {
        accession: String,
        attempts: u32,
        reason: String,
    },

    #[error("failed to write {path}: {message}")]
    Output { path: Utf8PathBuf, message: String },
}
