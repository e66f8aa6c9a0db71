use serde_json::Value;

/// Generate column names that cover every leaf of `sample`.
///
/// Maps contribute `prefix.key` for each key in sorted order. A list
/// contributes `prefix[id]`, then the names of its first element under
/// `prefix[]` (or a bare `prefix[]` when it is empty). Any other value
/// contributes `prefix` itself.
///
/// NOTE: lists are sampled through their first element only, so lists whose
/// elements differ in shape produce an incomplete column set.
///
/// ```rust
/// use nested_csv::generate_field_names;
/// use serde_json::json;
///
/// let names = generate_field_names(&json!({"b": 1, "a": [{"c": 2}]}), "");
/// assert_eq!(names, vec!["a[id]", "a[].c", "b"]);
/// ```
pub fn generate_field_names(sample: &Value, prefix: &str) -> Vec<String> {
    let mut names = Vec::new();
    collect(sample, prefix, &mut names);
    names
}

fn collect(value: &Value, prefix: &str, names: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for key in keys {
                let name = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", prefix, key)
                };
                collect(&map[key.as_str()], &name, names);
            }
        }
        Value::Array(items) => {
            names.push(format!("{}[id]", prefix));
            let element = format!("{}[]", prefix);
            match items.first() {
                Some(first) => collect(first, &element, names),
                None => names.push(element),
            }
        }
        _ => names.push(prefix.to_string()),
    }
}
