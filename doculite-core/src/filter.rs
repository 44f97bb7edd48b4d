//! Filter grammar validation.
//!
//! A filter is `null`, an empty object (match-all), or an object whose
//! entries are one of: field equality, field operator (`key.$op`), field
//! existence (`key.$exists`), or a logical combinator (`$and`, `$or`,
//! `$not`). This module only validates well-formedness; decomposition and
//! evaluation live in `planner`.

use crate::error::{CollectionError, Result};
use crate::index::Operator;
use serde_json::{Map, Value};

const LOGICAL_LIST_OPS: [&str; 2] = ["$and", "$or"];

/// Validate a normalized filter against the grammar's guard rails.
/// `None`/`Value::Null` and an empty object are valid (match-all).
pub fn validate(filter: &Value) -> Result<()> {
    match filter {
        Value::Null => Ok(()),
        Value::Object(map) => validate_object(map),
        other => Err(CollectionError::MalformedFilter(format!(
            "filter must be an object or null, got {}",
            other
        ))),
    }
}

fn validate_object(map: &Map<String, Value>) -> Result<()> {
    for (key, value) in map {
        match key.as_str() {
            "$and" | "$or" => validate_logical_list(key, value)?,
            "$not" => validate(value)?,
            _ => validate_field_entry(key, value)?,
        }
    }
    Ok(())
}

fn validate_logical_list(op: &str, value: &Value) -> Result<()> {
    let items = value.as_array().ok_or_else(|| {
        CollectionError::MalformedFilter(format!("{} requires a non-empty list argument", op))
    })?;
    if items.is_empty() {
        return Err(CollectionError::MalformedFilter(format!(
            "{} requires a non-empty list argument",
            op
        )));
    }
    for item in items {
        validate(item)?;
    }
    Ok(())
}

fn validate_field_entry(key: &str, value: &Value) -> Result<()> {
    let segments: Vec<&str> = key.split('.').collect();
    let dollar_positions: Vec<usize> = segments
        .iter()
        .enumerate()
        .filter(|(_, s)| s.starts_with('$'))
        .map(|(i, _)| i)
        .collect();

    if dollar_positions.len() > 1 {
        return Err(CollectionError::MalformedFilter(format!(
            "key {} may contain at most one $ segment",
            key
        )));
    }

    if let Some(&pos) = dollar_positions.first() {
        if pos != segments.len() - 1 {
            return Err(CollectionError::MalformedFilter(format!(
                "$ segment must be the final dotted segment in key {}",
                key
            )));
        }
        let op_name = segments[pos];
        if op_name == "$exists" {
            if !value.is_boolean() {
                return Err(CollectionError::MalformedFilter(format!(
                    "$exists requires a boolean argument, got {}",
                    value
                )));
            }
            return Ok(());
        }
        if Operator::parse(op_name).is_none() {
            return Err(CollectionError::MalformedFilter(format!(
                "unknown operator: {}",
                op_name
            )));
        }
        if matches!(op_name, "$in" | "$nin") && !value.is_array() {
            return Err(CollectionError::MalformedFilter(format!(
                "{} requires a list argument",
                op_name
            )));
        }
        return Ok(());
    }

    // Plain field equality: a list value is a legal equality argument (it
    // matches a document whose field resolves to that same sequence, via
    // `Canonical::Seq`). Only a bare list standing in for the *entire*
    // top-level filter is rejected, and `validate` already does that before
    // ever reaching a field entry.
    Ok(())
}

/// True if `name` is one of the logical list combinators (`$and`/`$or`).
pub fn is_logical_list_op(name: &str) -> bool {
    LOGICAL_LIST_OPS.contains(&name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn null_and_empty_are_valid() {
        assert!(validate(&Value::Null).is_ok());
        assert!(validate(&json!({})).is_ok());
    }

    #[test]
    fn list_is_a_valid_equality_value() {
        assert!(validate(&json!({"tags": [1, 2]})).is_ok());
    }

    #[test]
    fn bare_list_as_the_entire_filter_is_rejected() {
        assert!(validate(&json!([1, 2, 3])).is_err());
    }

    #[test]
    fn list_inside_in_operator_is_allowed() {
        assert!(validate(&json!({"tags.$in": [1, 2]})).is_ok());
    }

    #[test]
    fn unknown_operator_is_rejected() {
        assert!(validate(&json!({"age.$bogus": 1})).is_err());
    }

    #[test]
    fn multiple_dollar_segments_rejected() {
        assert!(validate(&json!({"a.$gt.$lt": 1})).is_err());
    }

    #[test]
    fn dollar_must_be_final_segment() {
        assert!(validate(&json!({"a.$gt.b": 1})).is_err());
    }

    #[test]
    fn and_or_require_nonempty_list() {
        assert!(validate(&json!({"$and": []})).is_err());
        assert!(validate(&json!({"$or": "nope"})).is_err());
        assert!(validate(&json!({"$and": [{"a": 1}]})).is_ok());
    }

    #[test]
    fn exists_requires_bool() {
        assert!(validate(&json!({"a.$exists": 1})).is_err());
        assert!(validate(&json!({"a.$exists": true})).is_ok());
    }

    #[test]
    fn not_recurses_into_nested_filter() {
        assert!(validate(&json!({"$not": {"tags": [1]}})).is_err());
        assert!(validate(&json!({"$not": {"a": 1}})).is_ok());
    }
}
