use serde_json::{Value, json};
use streamline::Selector;
use streamline::extractor::{Extractor, extract_path, parse_selectors};

fn extract(data: &Value, path: &str) -> Value {
    Extractor::new(path).extract(data)
}

// --- parse_selectors ---

#[test]
fn test_parse_mixed_segments() {
    assert_eq!(
        parse_selectors("foo.bar[0][*].*"),
        vec![
            Selector::Name("foo".to_string()),
            Selector::Name("bar".to_string()),
            Selector::Index(0),
            Selector::WildcardIndex,
            Selector::WildcardName,
        ]
    );
}

#[test]
fn test_parse_malformed_segment_is_name() {
    assert_eq!(
        parse_selectors("a[x]"),
        vec![Selector::Name("a[x]".to_string())]
    );
    assert_eq!(
        parse_selectors("a[1"),
        vec![Selector::Name("a[1".to_string())]
    );
}

#[test]
fn test_parse_skips_empty_segments() {
    assert_eq!(parse_selectors(""), Vec::<Selector>::new());
    assert_eq!(
        parse_selectors("foo.numbers.[2]"),
        vec![
            Selector::Name("foo".to_string()),
            Selector::Name("numbers".to_string()),
            Selector::Index(2),
        ]
    );
}

// --- extract ---

#[test]
fn test_extract_index_and_wildcard() {
    let data = json!({"a": {"b": [10, 20, 30]}});
    assert_eq!(extract(&data, "a.b[1]"), json!(20));
    assert_eq!(extract(&data, "a.b[*]"), json!([10, 20, 30]));
    assert_eq!(extract(&data, "a.b[-1]"), json!(30));
}

#[test]
fn test_extract_missing_is_null() {
    assert_eq!(extract(&json!({"a": 1}), "x.y"), Value::Null);
    assert_eq!(extract(&json!({"a": 1}), "a.b"), Value::Null);
    assert_eq!(extract(&json!({"a": [1]}), "a[5]"), Value::Null);
    assert_eq!(extract(&json!({"a": "str"}), "a[0]"), Value::Null);
}

#[test]
fn test_extract_wildcard_name_then_index() {
    let data = json!({"foo": {"x": [1, 2, 3], "y": [4, 5, 6]}});
    assert_eq!(extract(&data, "foo.*[0]"), json!([1, 4]));
    assert_eq!(extract(&data, "foo.*"), json!([[1, 2, 3], [4, 5, 6]]));
}

#[test]
fn test_extract_wildcard_fans_out_without_flattening() {
    let data = json!({"rows": [{"v": [1, 2]}, {"v": [3]}]});
    assert_eq!(extract(&data, "rows[*].v"), json!([[1, 2], [3]]));
    assert_eq!(extract(&data, "rows[*].v[0]"), json!([1, 3]));
}

#[test]
fn test_extract_wildcard_on_non_collection_is_empty() {
    assert_eq!(extract(&json!({"a": null}), "a[*]"), json!([]));
    assert_eq!(extract(&json!({"a": 3}), "a.*"), json!([]));
}

#[test]
fn test_extract_index_wildcard_on_object_is_empty() {
    assert_eq!(extract(&json!({"a": {"x": 1, "y": 2}}), "a[*]"), json!([]));
    assert_eq!(extract(&json!({"a": "text"}), "a[*]"), json!([]));
}

#[test]
fn test_extract_extra_dot() {
    let data = json!({"foo": {"numbers": [1, 2, 3]}});
    assert_eq!(extract(&data, "foo.numbers.[2]"), json!(3));
}

#[test]
fn test_extract_malformed_path_reads_literal_key() {
    assert_eq!(extract(&json!({"a[x]": 5}), "a[x]"), json!(5));
}

#[test]
fn test_extract_path_free_fn() {
    let selectors = parse_selectors("a.b");
    assert_eq!(extract_path(&json!({"a": {"b": true}}), &selectors), json!(true));
}

// --- value symbol ---

#[test]
fn test_value_symbol() {
    let data = json!({"a": {"b": 1}});
    assert!(Extractor::with_value_symbol("value").is_identity());
    assert_eq!(Extractor::with_value_symbol("value").extract(&data), data);
    assert_eq!(Extractor::with_value_symbol("value.a.b").extract(&data), json!(1));
    assert_eq!(
        Extractor::with_value_symbol("a.b").selectors(),
        Extractor::new("a.b").selectors()
    );
    // Plain extractor treats `value` as a key.
    assert_eq!(Extractor::new("value").extract(&data), Value::Null);
}
