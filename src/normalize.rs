use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;

use crate::clean::clean_value;
use crate::domain::{
    Accession, AssayGroup, ContrastGroup, ContrastProperty, ExperimentRecord, NOT_AVAILABLE,
    Resource, SampleGroup, is_differential,
};

/// Turns one accepted experiment payload into an [`ExperimentRecord`].
/// Missing fields fall back to `"N/A"` or are skipped; this never fails.
pub fn normalize_experiment(
    raw: &Value,
    accession: &Accession,
    sequence_number: usize,
) -> ExperimentRecord {
    let experiment = raw.get("experiment");
    let experiment_type = string_field(experiment, "type");
    let organism = string_field(experiment, "species");

    let columns: &[Value] = raw
        .get("columnHeaders")
        .and_then(|v| v.as_array())
        .map(|arr| arr.as_slice())
        .unwrap_or_default();

    let mut assay_groups = Vec::new();
    if is_differential(&experiment_type) {
        assay_groups.extend(
            columns
                .iter()
                .filter_map(contrast_group)
                .map(AssayGroup::Contrast),
        );
    }
    assay_groups.extend(
        columns
            .iter()
            .filter_map(sample_group)
            .map(AssayGroup::Sample),
    );

    ExperimentRecord {
        sequence_number,
        accession: accession.clone(),
        experiment_type,
        organism,
        assay_groups,
    }
}

pub fn normalize_property_name(name: &str) -> String {
    name.replace(' ', "_")
}

fn string_field(parent: Option<&Value>, key: &str) -> String {
    parent
        .and_then(|v| v.get(key))
        .and_then(|v| v.as_str())
        .unwrap_or(NOT_AVAILABLE)
        .to_string()
}

/// Reads `key` as text and cleans it. Numbers and booleans keep their JSON
/// spelling. A missing key yields `default`; an explicit null yields `None`.
fn cleaned_field(parent: &Value, key: &str, default: &str) -> Option<String> {
    match parent.get(key).cloned().map(clean_value) {
        None => Some(default.to_string()),
        Some(Value::Null) => None,
        Some(Value::String(text)) => Some(text),
        Some(other) => Some(other.to_string()),
    }
}

fn properties_of(value: Option<&Value>) -> &[Value] {
    value
        .and_then(|v| v.as_array())
        .map(|arr| arr.as_slice())
        .unwrap_or_default()
}

fn contrast_group(column: &Value) -> Option<ContrastGroup> {
    let summary = column.get("contrastSummary")?;
    if summary.as_object().is_none_or(|obj| obj.is_empty()) {
        return None;
    }

    let contrast_description = cleaned_field(summary, "contrastDescription", NOT_AVAILABLE);

    let mut buckets: BTreeMap<ContrastProperty, BTreeSet<String>> = BTreeMap::new();
    for prop in properties_of(summary.get("properties")) {
        let name = prop
            .get("propertyName")
            .and_then(|v| v.as_str())
            .map(normalize_property_name)
            .unwrap_or_else(|| NOT_AVAILABLE.to_string());
        let Some(bucket) = ContrastProperty::from_name(&name) else {
            continue;
        };
        match cleaned_field(prop, "testValue", NOT_AVAILABLE) {
            Some(value) if !value.is_empty() => {
                buckets.entry(bucket).or_default().insert(value);
            }
            _ => {}
        }
    }
    // BTreeMap over the enum keeps the fixed bucket order.
    let properties = buckets
        .into_iter()
        .map(|(bucket, values)| (bucket, values.into_iter().collect()))
        .collect();

    // Only one resource pair is kept per contrast; later entries win.
    let resource = properties_of(summary.get("resources"))
        .iter()
        .map(|res| Resource {
            resource_type: cleaned_field(res, "type", NOT_AVAILABLE),
            resource_uri: cleaned_field(res, "uri", NOT_AVAILABLE),
        })
        .last();

    Some(ContrastGroup {
        contrast_description,
        properties,
        resource,
    })
}

fn sample_group(column: &Value) -> Option<SampleGroup> {
    let assay_group_id = match column.get("assayGroupId") {
        Some(Value::String(id)) => id.clone(),
        Some(Value::Null) | None => return None,
        Some(other) => other.to_string(),
    };
    if assay_group_id == NOT_AVAILABLE {
        return None;
    }

    let summary = column.get("assayGroupSummary");
    let mut properties: Vec<(String, BTreeSet<String>)> = Vec::new();
    for prop in properties_of(summary.and_then(|s| s.get("properties"))) {
        let name = prop
            .get("propertyName")
            .and_then(|v| v.as_str())
            .map(normalize_property_name)
            .unwrap_or_default();
        let value = cleaned_field(prop, "testValue", "").unwrap_or_default();
        if name.is_empty() || value.is_empty() || name == "assay_group_id" {
            continue;
        }
        match properties.iter_mut().find(|(key, _)| *key == name) {
            Some((_, values)) => {
                values.insert(value);
            }
            None => properties.push((name, BTreeSet::from([value]))),
        }
    }

    if properties.is_empty() {
        return None;
    }
    Some(SampleGroup {
        assay_group_id,
        properties: properties
            .into_iter()
            .map(|(name, values)| (name, values.into_iter().collect()))
            .collect(),
    })
}
