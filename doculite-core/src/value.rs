//! Recursive JSON value handling: canonical hashable keys and the
//! normalize-by-round-trip step used for both documents and filters.

use serde_json::{Map, Value};
use std::cmp::Ordering;

/// A document is a schema-less JSON object keyed by the collection's
/// configured primary key.
pub type Document = Map<String, Value>;

/// Sentinel bucket key used when a resolved value is itself a JSON object:
/// it participates in `$exists` but never in value equality.
pub const DICT_PLACEHOLDER: &str = "\u{0}__dict_placeholder__";

/// The hashable form of a `serde_json::Value`. Arrays become vectors of
/// canonical elements (playing the role of Python's tuple-of-canonical),
/// objects collapse to the `DICT_PLACEHOLDER` sentinel, and numbers carry
/// their bit pattern so that `Canonical` can implement `Hash`/`Eq`/`Ord`.
#[derive(Debug, Clone, PartialEq)]
pub enum Canonical {
    Null,
    Bool(bool),
    Int(i64),
    Float(u64), // bit pattern of the f64, for Eq/Hash/Ord
    Str(String),
    Seq(Vec<Canonical>),
    Dict,
}

impl Eq for Canonical {}

impl std::hash::Hash for Canonical {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Canonical::Null | Canonical::Dict => {}
            Canonical::Bool(b) => b.hash(state),
            Canonical::Int(i) => i.hash(state),
            Canonical::Float(bits) => bits.hash(state),
            Canonical::Str(s) => s.hash(state),
            Canonical::Seq(items) => items.hash(state),
        }
    }
}

impl PartialOrd for Canonical {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Canonical::Int(a), Canonical::Int(b)) => a.partial_cmp(b),
            (Canonical::Float(a), Canonical::Float(b)) => {
                f64::from_bits(*a).partial_cmp(&f64::from_bits(*b))
            }
            (Canonical::Int(a), Canonical::Float(b)) => {
                (*a as f64).partial_cmp(&f64::from_bits(*b))
            }
            (Canonical::Float(a), Canonical::Int(b)) => {
                f64::from_bits(*a).partial_cmp(&(*b as f64))
            }
            (Canonical::Str(a), Canonical::Str(b)) => a.partial_cmp(b),
            (Canonical::Bool(a), Canonical::Bool(b)) => a.partial_cmp(b),
            // Incomparable types: numeric/string comparisons across
            // incompatible kinds return "no order" rather than panicking,
            // so operator dispatch can treat them as non-matches.
            _ => None,
        }
    }
}

impl Canonical {
    /// Convert a `serde_json::Value` into its canonical hashable form.
    /// Arrays recurse; objects collapse to the dict sentinel.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Null => Canonical::Null,
            Value::Bool(b) => Canonical::Bool(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Canonical::Int(i)
                } else {
                    Canonical::Float(n.as_f64().unwrap_or(0.0).to_bits())
                }
            }
            Value::String(s) => Canonical::Str(s.clone()),
            Value::Array(items) => {
                Canonical::Seq(items.iter().map(Canonical::from_value).collect())
            }
            Value::Object(_) => Canonical::Dict,
        }
    }

    pub fn is_dict(&self) -> bool {
        matches!(self, Canonical::Dict)
    }
}

/// Recursively replace inner JSON arrays with arrays-of-normalized-elements
/// (the list-to-tuple step from the filter/index grammar). Objects and
/// scalars are returned unchanged at this stage; only the "sequences become
/// comparable-by-value" normalization happens here — full canonicalization
/// for index keys happens later, via `Canonical::from_value`.
pub fn encode_tree(value: Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.into_iter().map(encode_tree).collect()),
        other => other,
    }
}

/// Normalize a document or filter via a JSON encode/decode round-trip, per
/// the spec: this guarantees only JSON-representable values enter the
/// engine and erases incidental type distinctions.
pub fn normalize(value: &Value) -> crate::error::Result<Value> {
    let bytes = serde_json::to_vec(value)?;
    let normalized: Value = serde_json::from_slice(&bytes)?;
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn canonical_equates_list_literal_with_array_value() {
        let a = Canonical::from_value(&json!([1, 2, 3]));
        let b = Canonical::from_value(&json!([1, 2, 3]));
        assert_eq!(a, b);
    }

    #[test]
    fn canonical_collapses_objects_to_dict_sentinel() {
        let c = Canonical::from_value(&json!({"a": 1}));
        assert!(c.is_dict());
    }

    #[test]
    fn canonical_orders_ints_and_floats_together() {
        let a = Canonical::from_value(&json!(3));
        let b = Canonical::from_value(&json!(3.5));
        assert!(a < b);
    }

    #[test]
    fn canonical_incomparable_types_have_no_order() {
        let a = Canonical::from_value(&json!(3));
        let b = Canonical::from_value(&json!("x"));
        assert_eq!(a.partial_cmp(&b), None);
    }

    #[test]
    fn normalize_round_trips_through_json() {
        let v = json!({"b": 1, "a": [1, 2]});
        let n = normalize(&v).unwrap();
        assert_eq!(n, v);
    }
}
