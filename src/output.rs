use std::fs;
use std::io::{self, Write};

use camino::{Utf8Path, Utf8PathBuf};

use crate::domain::ExperimentDocument;
use crate::error::GxaError;
use crate::flatten::{FlatRecord, flatten_record, render_scalar};

/// A destination for a finished harvest.
pub trait RecordSink {
    fn emit(&mut self, document: &ExperimentDocument) -> Result<(), GxaError>;
}

/// Renders the document as block-style YAML with a leading `---` marker.
/// Keys keep struct order and long values are not wrapped.
pub fn render_yaml(document: &ExperimentDocument) -> Result<String, serde_yaml::Error> {
    let body = serde_yaml::to_string(document)?;
    Ok(format!("---\n{body}"))
}

/// Writes flattened rows as TSV. The header is the union of all columns in
/// first-seen order; cells a row lacks are left empty.
pub fn write_table<W: Write>(rows: &[FlatRecord], writer: W) -> Result<(), csv::Error> {
    let mut columns: Vec<&str> = Vec::new();
    for row in rows {
        for key in row.keys() {
            if !columns.contains(&key.as_str()) {
                columns.push(key);
            }
        }
    }

    let mut wtr = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(writer);
    wtr.write_record(&columns)?;
    for row in rows {
        let cells = columns
            .iter()
            .map(|column| row.get(*column).map(render_scalar).unwrap_or_default());
        wtr.write_record(cells)?;
    }
    wtr.flush()?;
    Ok(())
}

pub struct DocumentSink {
    path: Utf8PathBuf,
}

impl DocumentSink {
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl RecordSink for DocumentSink {
    fn emit(&mut self, document: &ExperimentDocument) -> Result<(), GxaError> {
        let yaml = render_yaml(document).map_err(|err| output_error(&self.path, err))?;
        fs::write(&self.path, yaml).map_err(|err| output_error(&self.path, err))?;
        tracing::info!(path = %self.path, experiments = document.experiment_count, "wrote YAML document");
        Ok(())
    }
}

pub struct TableSink {
    path: Utf8PathBuf,
    keep_keys: Vec<String>,
}

impl TableSink {
    pub fn new(path: impl Into<Utf8PathBuf>, keep_keys: Vec<String>) -> Self {
        Self {
            path: path.into(),
            keep_keys,
        }
    }
}

impl RecordSink for TableSink {
    fn emit(&mut self, document: &ExperimentDocument) -> Result<(), GxaError> {
        let rows = document
            .experiments
            .iter()
            .map(|record| flatten_record(record, &self.keep_keys))
            .collect::<Vec<_>>();
        let file = fs::File::create(&self.path).map_err(|err| output_error(&self.path, err))?;
        write_table(&rows, io::BufWriter::new(file))
            .map_err(|err| output_error(&self.path, err))?;
        tracing::info!(path = %self.path, rows = rows.len(), "wrote TSV table");
        Ok(())
    }
}

/// Writes the YAML document to any writer, stdout by default.
pub struct ConsoleSink<W: Write> {
    writer: W,
}

impl ConsoleSink<io::Stdout> {
    pub fn stdout() -> Self {
        Self {
            writer: io::stdout(),
        }
    }
}

impl<W: Write> ConsoleSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> RecordSink for ConsoleSink<W> {
    fn emit(&mut self, document: &ExperimentDocument) -> Result<(), GxaError> {
        let target = Utf8Path::new("<stdout>");
        let yaml = render_yaml(document).map_err(|err| output_error(target, err))?;
        self.writer
            .write_all(yaml.as_bytes())
            .and_then(|_| self.writer.flush())
            .map_err(|err| output_error(target, err))
    }
}

fn output_error(path: &Utf8Path, err: impl std::fmt::Display) -> GxaError {
    GxaError::Output {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}
