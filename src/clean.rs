use serde_json::Value;

/// Strips stray colons, swaps double quotes for single quotes and trims
/// leading commas/spaces. A result starting with `>` is wrapped in double
/// quotes so YAML readers do not take it for a folded block indicator.
pub fn clean_text(text: &str) -> String {
    let text = text.replace(" :", "").replace(": ", "").replace(':', "");
    let text = text.replace('"', "'");
    let text = text.trim_start_matches([',', ' ']);
    if text.starts_with('>') {
        format!("\"{text}\"")
    } else {
        text.to_string()
    }
}

/// Cleans string values; every other JSON value is returned untouched.
pub fn clean_value(value: Value) -> Value {
    match value {
        Value::String(text) => Value::String(clean_text(&text)),
        other => other,
    }
}
