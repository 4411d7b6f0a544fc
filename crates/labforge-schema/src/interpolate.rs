//! `${name}` placeholder substitution over raw YAML values.
//!
//! Unresolved placeholders are left verbatim; interpolation never fails.

use serde_yaml::{Mapping, Value};

/// Render a scalar YAML value the way it reads in the source file.
/// Returns `None` for null, sequences and mappings.
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Tagged(tagged) => scalar_to_string(&tagged.value),
        Value::Null | Value::Sequence(_) | Value::Mapping(_) => None,
    }
}

/// Substitute every `${identifier}` in `input`, where identifier is
/// `[A-Za-z0-9_]+`.
pub fn interpolate_str(input: &str, lookup: &dyn Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let ident_len = after
            .bytes()
            .take_while(|b| b.is_ascii_alphanumeric() || *b == b'_')
            .count();

        if ident_len > 0 && after.as_bytes().get(ident_len) == Some(&b'}') {
            let key = &after[..ident_len];
            match lookup(key) {
                Some(value) => out.push_str(&value),
                None => out.push_str(&rest[start..start + ident_len + 3]),
            }
            rest = &after[ident_len + 1..];
        } else {
            out.push_str("${");
            rest = after;
        }
    }

    out.push_str(rest);
    out
}

/// Recursively interpolate every string in `value`. Mapping keys are kept as-is.
pub fn interpolate_value(value: Value, lookup: &dyn Fn(&str) -> Option<String>) -> Value {
    match value {
        Value::String(s) => Value::String(interpolate_str(&s, lookup)),
        Value::Sequence(items) => Value::Sequence(
            items
                .into_iter()
                .map(|item| interpolate_value(item, lookup))
                .collect(),
        ),
        Value::Mapping(map) => Value::Mapping(
            map.into_iter()
                .map(|(k, v)| (k, interpolate_value(v, lookup)))
                .collect::<Mapping>(),
        ),
        Value::Tagged(tagged) => {
            let mut tagged = *tagged;
            tagged.value = interpolate_value(tagged.value, lookup);
            Value::Tagged(Box::new(tagged))
        }
        other => other,
    }
}
