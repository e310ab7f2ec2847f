use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

use crate::error::GxaError;

/// Placeholder used for fields the source record leaves out.
pub const NOT_AVAILABLE: &str = "N/A";

/// Accepts any single URL path segment, so new accession schemes still
/// pass; rejects blanks, whitespace and path or query characters.
fn accession_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]*$").expect("valid accession regex"))
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Accession(String);

impl Accession {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Accession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Accession {
    type Err = GxaError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim();
        if !accession_regex().is_match(normalized) {
            return Err(GxaError::InvalidAccession(value.to_string()));
        }
        Ok(Self(normalized.to_string()))
    }
}

/// The property buckets a contrast group may carry, in output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ContrastProperty {
    ClinicalInformation,
    Disease,
    Age,
    ArrayDesign,
    DevelopmentalStage,
    Individual,
    OrganismPart,
    Sex,
}

impl ContrastProperty {
    pub const ALL: [ContrastProperty; 8] = [
        ContrastProperty::ClinicalInformation,
        ContrastProperty::Disease,
        ContrastProperty::Age,
        ContrastProperty::ArrayDesign,
        ContrastProperty::DevelopmentalStage,
        ContrastProperty::Individual,
        ContrastProperty::OrganismPart,
        ContrastProperty::Sex,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContrastProperty::ClinicalInformation => "clinical_information",
            ContrastProperty::Disease => "disease",
            ContrastProperty::Age => "age",
            ContrastProperty::ArrayDesign => "array_design",
            ContrastProperty::DevelopmentalStage => "developmental_stage",
            ContrastProperty::Individual => "individual",
            ContrastProperty::OrganismPart => "organism_part",
            ContrastProperty::Sex => "sex",
        }
    }

    /// Matches an already underscore-normalized property name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|prop| prop.as_str() == name)
    }
}

impl fmt::Display for ContrastProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContrastGroup {
    /// `None` when the source sends an explicit null; rendered as YAML `null`.
    pub contrast_description: Option<String>,
    pub properties: Vec<(ContrastProperty, Vec<String>)>,
    pub resource: Option<Resource>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub resource_type: Option<String>,
    pub resource_uri: Option<String>,
}

impl Serialize for ContrastGroup {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("contrast_description", &self.contrast_description)?;
        for (property, values) in &self.properties {
            map.serialize_entry(property.as_str(), values)?;
        }
        if let Some(resource) = &self.resource {
            map.serialize_entry("resource_type", &resource.resource_type)?;
            map.serialize_entry("resource_uri", &resource.resource_uri)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleGroup {
    pub assay_group_id: String,
    pub properties: Vec<(String, Vec<String>)>,
}

impl SampleGroup {
    pub fn property(&self, name: &str) -> Option<&[String]> {
        self.properties
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, values)| values.as_slice())
    }
}

impl Serialize for SampleGroup {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.properties.len() + 1))?;
        for (name, values) in &self.properties {
            map.serialize_entry(name, values)?;
        }
        map.serialize_entry("assay_group_id", &self.assay_group_id)?;
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum AssayGroup {
    Contrast(ContrastGroup),
    Sample(SampleGroup),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExperimentRecord {
    pub sequence_number: usize,
    pub accession: Accession,
    pub experiment_type: String,
    pub organism: String,
    pub assay_groups: Vec<AssayGroup>,
}

impl ExperimentRecord {
    pub fn is_differential(&self) -> bool {
        is_differential(&self.experiment_type)
    }

    pub fn contrast_groups(&self) -> impl Iterator<Item = &ContrastGroup> {
        self.assay_groups.iter().filter_map(|group| match group {
            AssayGroup::Contrast(contrast) => Some(contrast),
            AssayGroup::Sample(_) => None,
        })
    }

    pub fn sample_groups(&self) -> impl Iterator<Item = &SampleGroup> {
        self.assay_groups.iter().filter_map(|group| match group {
            AssayGroup::Sample(sample) => Some(sample),
            AssayGroup::Contrast(_) => None,
        })
    }
}

pub fn is_differential(experiment_type: &str) -> bool {
    experiment_type.to_lowercase().contains("differential")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExperimentDocument {
    pub date: String,
    pub experiment_count: usize,
    pub experiments: Vec<ExperimentRecord>,
}

impl ExperimentDocument {
    pub fn new(date: impl Into<String>, experiments: Vec<ExperimentRecord>) -> Self {
        Self {
            date: date.into(),
            experiment_count: experiments.len(),
            experiments,
        }
    }

    pub fn stamped_now(experiments: Vec<ExperimentRecord>) -> Self {
        let date = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        Self::new(date, experiments)
    }
}
