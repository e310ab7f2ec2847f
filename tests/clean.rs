use gxa_metadata::clean::{clean_text, clean_value};
use serde_json::json;

const SAMPLES: &[&str] = &[
    " : a:b: \")",
    "upper lobe : lung",
    ",, leading separators",
    "ratio 1:2",
    "\"quoted\" value",
    "wild type",
    "",
    " :: ",
    "time: 24 hour",
];

#[test]
fn documented_example() {
    assert_eq!(clean_text(" : a:b: \")"), "ab')");
}

#[test]
fn cleaning_is_idempotent() {
    for sample in SAMPLES {
        let once = clean_text(sample);
        assert_eq!(clean_text(&once), once, "input: {sample:?}");
    }
}

#[test]
fn only_commas_and_spaces_are_stripped_from_the_front() {
    assert_eq!(clean_text(" , ,x, y"), "x, y");
    assert_eq!(clean_text("\nx"), "\nx");
    assert_eq!(clean_text("x  "), "x  ");
}

#[test]
fn angle_bracket_values_are_quoted() {
    assert_eq!(clean_text(">50 year"), "\">50 year\"");
    assert_eq!(clean_text("age > 50"), "age > 50");
}

#[test]
fn clean_value_leaves_non_strings_alone() {
    assert_eq!(clean_value(json!(3.5)), json!(3.5));
    assert_eq!(clean_value(json!(["a:b"])), json!(["a:b"]));
    assert_eq!(clean_value(json!("a:b")), json!("ab"));
}
