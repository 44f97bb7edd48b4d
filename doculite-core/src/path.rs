//! Dotted-path field accessor over a recursive JSON document.

use crate::value::Document;
use serde_json::Value;

/// Outcome of resolving a dotted key against a document.
#[derive(Debug, Clone, PartialEq)]
pub enum PathLookup {
    Found(Value),
    Absent,
}

/// Resolve `key` (a `.`-separated path) against `doc` by descending nested
/// objects. Intermediate steps that aren't objects, or missing keys, yield
/// `Absent` rather than an error.
pub fn resolve(doc: &Document, key: &str) -> PathLookup {
    let nodes: Vec<&str> = key.split('.').collect();
    resolve_nodes(&Value::Object(doc.clone()), &nodes)
}

fn resolve_nodes(current: &Value, nodes: &[&str]) -> PathLookup {
    match nodes {
        [] => PathLookup::Found(current.clone()),
        [head, rest @ ..] => match current {
            Value::Object(map) => match map.get(*head) {
                Some(next) => resolve_nodes(next, rest),
                None => PathLookup::Absent,
            },
            _ => PathLookup::Absent,
        },
    }
}

/// Resolve a flat (literal, undotted) top-level key directly. Used for the
/// "secondary match path" rule: a top-level key that is itself written with
/// dots (e.g. `"a.b"` as one literal key) is checked in addition to nested
/// descent through `resolve`.
pub fn resolve_flat(doc: &Document, key: &str) -> PathLookup {
    match doc.get(key) {
        Some(v) => PathLookup::Found(v.clone()),
        None => PathLookup::Absent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(v: Value) -> Document {
        v.as_object().unwrap().clone()
    }

    #[test]
    fn resolves_nested_value() {
        let d = doc(json!({"nested": {"value": 42}}));
        assert_eq!(resolve(&d, "nested.value"), PathLookup::Found(json!(42)));
    }

    #[test]
    fn missing_key_is_absent() {
        let d = doc(json!({"a": 1}));
        assert_eq!(resolve(&d, "b"), PathLookup::Absent);
    }

    #[test]
    fn non_object_intermediate_is_absent() {
        let d = doc(json!({"a": 1}));
        assert_eq!(resolve(&d, "a.b"), PathLookup::Absent);
    }

    #[test]
    fn flat_dotted_key_resolves_literally() {
        let d = doc(json!({"a.b": 7}));
        assert_eq!(resolve_flat(&d, "a.b"), PathLookup::Found(json!(7)));
        assert_eq!(resolve(&d, "a.b"), PathLookup::Absent);
    }
}
