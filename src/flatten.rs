use std::collections::{BTreeMap, BTreeSet};

use serde_json::{Map, Value};

use crate::domain::ExperimentRecord;

/// Assay-group properties collected into the tabular export by default.
pub const DEFAULT_KEEP_KEYS: [&str; 6] = [
    "organism_part",
    "developmental_stage",
    "disease",
    "age",
    "genotype",
    "sex",
];

const SEPARATOR: &str = "_";
const JOINER: &str = "; ";

/// One single-level row, columns in first-seen order.
pub type FlatRecord = Map<String, Value>;

pub fn flatten_record<K: AsRef<str>>(record: &ExperimentRecord, keep: &[K]) -> FlatRecord {
    match serde_json::to_value(record) {
        Ok(Value::Object(map)) => flatten_map(&map, keep),
        _ => FlatRecord::new(),
    }
}

/// Flattens a nested mapping. Lists of mappings only contribute the sub-keys
/// named in `keep`; their values are unioned per column and rendered sorted.
pub fn flatten_map<K: AsRef<str>>(map: &Map<String, Value>, keep: &[K]) -> FlatRecord {
    let keep: BTreeSet<&str> = keep.iter().map(|key| key.as_ref()).collect();
    let mut items = FlatRecord::new();
    let mut merged: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    flatten_into(map, "", &keep, &mut items, &mut merged);

    for (key, values) in merged {
        let joined = values.into_iter().collect::<Vec<_>>().join(JOINER);
        items.insert(key, Value::String(joined));
    }
    items
}

fn flatten_into(
    map: &Map<String, Value>,
    prefix: &str,
    keep: &BTreeSet<&str>,
    items: &mut FlatRecord,
    merged: &mut BTreeMap<String, BTreeSet<String>>,
) {
    for (key, value) in map {
        let column = join_key(prefix, key);
        match value {
            Value::Object(nested) => flatten_into(nested, &column, keep, items, merged),
            Value::Array(elements) if elements.iter().all(Value::is_object) => {
                for element in elements.iter().filter_map(Value::as_object) {
                    for (sub_key, sub_value) in element {
                        if !keep.contains(sub_key.as_str()) {
                            continue;
                        }
                        let merged_column = format!("{column}{SEPARATOR}{sub_key}");
                        if !items.contains_key(&merged_column) {
                            // Reserve the column position; filled in after traversal.
                            items.insert(merged_column.clone(), Value::Null);
                        }
                        let bucket = merged.entry(merged_column).or_default();
                        match sub_value {
                            Value::Array(values) => bucket.extend(values.iter().map(render_scalar)),
                            other => {
                                bucket.insert(render_scalar(other));
                            }
                        }
                    }
                }
            }
            Value::Array(elements) => {
                let joined = elements
                    .iter()
                    .map(render_scalar)
                    .collect::<Vec<_>>()
                    .join(JOINER);
                items.insert(column, Value::String(joined));
            }
            scalar => {
                items.insert(column, scalar.clone());
            }
        }
    }
}

fn join_key(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}{SEPARATOR}{key}")
    }
}

/// Text form used inside joined cells.
pub fn render_scalar(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn nested_mappings_join_keys_with_underscore() {
        let flat = flatten_map(
            &object(json!({"a": {"b": {"c": 1}, "d": "x"}, "e": true})),
            &DEFAULT_KEEP_KEYS,
        );
        assert_eq!(flat.get("a_b_c"), Some(&json!(1)));
        assert_eq!(flat.get("a_d"), Some(&json!("x")));
        assert_eq!(flat.get("e"), Some(&json!(true)));
    }

    #[test]
    fn scalar_lists_join_with_semicolon() {
        let flat = flatten_map(&object(json!({"tags": ["b", "a", 3]})), &DEFAULT_KEEP_KEYS);
        assert_eq!(flat.get("tags"), Some(&json!("b; a; 3")));
    }

    #[test]
    fn empty_list_yields_no_column() {
        let flat = flatten_map(&object(json!({"groups": []})), &DEFAULT_KEEP_KEYS);
        assert!(flat.is_empty());
    }

    #[test]
    fn merged_columns_keep_first_seen_position() {
        let flat = flatten_map(
            &object(json!({
                "id": 1,
                "groups": [{"sex": ["male"], "skip": ["x"]}, {"sex": "female"}],
                "tail": "t"
            })),
            &["sex"],
        );
        let keys: Vec<&str> = flat.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["id", "groups_sex", "tail"]);
        assert_eq!(flat.get("groups_sex"), Some(&json!("female; male")));
    }
}
