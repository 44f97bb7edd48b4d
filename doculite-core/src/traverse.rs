//! Filter-tree traversal: flattens a nested filter mapping into a lazy
//! sequence of `(dotted_key, value)` pairs via depth-first descent.

use crate::value::encode_tree;
use serde_json::{Map, Value};

/// Depth-first flatten of a filter mapping into dotted-key/value pairs.
///
/// Nested objects recurse, joining keys with `.`. An empty object found at
/// a non-root position is emitted as a single `(key, {})` pair rather than
/// recursed into further, since it represents "match exactly the empty
/// object" once we're below the root.
pub fn flatten(filter: &Map<String, Value>) -> Vec<(String, Value)> {
    let mut out = Vec::new();
    for (key, value) in filter {
        walk(key.clone(), value, &mut out);
    }
    out
}

fn walk(prefix: String, value: &Value, out: &mut Vec<(String, Value)>) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (key, nested) in map {
                walk(format!("{}.{}", prefix, key), nested, out);
            }
        }
        other => out.push((prefix, encode_tree(other.clone()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(v: Value) -> Map<String, Value> {
        v.as_object().unwrap().clone()
    }

    #[test]
    fn flattens_nested_keys() {
        let f = obj(json!({"a": {"b": {"c": 1}}}));
        let pairs = flatten(&f);
        assert_eq!(pairs, vec![("a.b.c".to_string(), json!(1))]);
    }

    #[test]
    fn empty_object_at_non_root_is_leaf() {
        let f = obj(json!({"a": {}}));
        let pairs = flatten(&f);
        assert_eq!(pairs, vec![("a".to_string(), json!({}))]);
    }

    #[test]
    fn lists_are_preserved_as_arrays() {
        let f = obj(json!({"tags": {"$in": [1, 2]}}));
        let pairs = flatten(&f);
        assert_eq!(pairs, vec![("tags.$in".to_string(), json!([1, 2]))]);
    }

    #[test]
    fn multiple_top_level_keys_each_flatten() {
        let f = obj(json!({"a": 1, "b": {"c": 2}}));
        let pairs = flatten(&f);
        assert_eq!(
            pairs,
            vec![("a".to_string(), json!(1)), ("b.c".to_string(), json!(2))]
        );
    }
}
