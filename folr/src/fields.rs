//! `key=value` field assignments for record updates
//!
//! Values that parse as json (numbers, booleans, arrays, objects, quoted
//! strings, null) keep their json type; anything else is a plain string.
//! `key+=value` appends to a list field, `key-=value` removes from it.

use anyhow::{Result, bail};
use folio::store::Patch;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum Assignment {
    Set(String, Value),
    Append(String, String),
    Remove(String, String),
}

pub fn parse_assignment(input: &str) -> Result<Assignment> {
    let (left, value) = input
        .split_once('=')
        .ok_or_else(|| anyhow::anyhow!("invalid field assignment (expected key=value): {input}"))?;

    let (key, op) = match left.strip_suffix('+') {
        Some(key) => (key, '+'),
        None => match left.strip_suffix('-') {
            Some(key) => (key, '-'),
            None => (left, '='),
        },
    };
    let key = key.trim();
    if key.is_empty() {
        bail!("invalid field key: {input}");
    }
    if key == "id" {
        bail!("the id field cannot be changed");
    }
    let value = value.trim();
    Ok(match op {
        '+' => Assignment::Append(key.to_string(), value.to_string()),
        '-' => Assignment::Remove(key.to_string(), value.to_string()),
        _ => Assignment::Set(key.to_string(), parse_value(value)),
    })
}

pub fn parse_value(value: &str) -> Value {
    serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()))
}

/// Builds a patch from assignments, using `current` (the record as json) for list edits.
pub fn build_patch(assignments: &[String], current: &Value) -> Result<Patch> {
    let mut patch = Patch::new();
    for input in assignments {
        match parse_assignment(input)? {
            Assignment::Set(key, value) => {
                patch.insert(key, value);
            }
            Assignment::Append(key, item) => {
                let mut list = list_field(&patch, current, &key)?;
                if !list.iter().any(|v| v.as_str() == Some(item.as_str())) {
                    list.push(Value::String(item));
                }
                patch.insert(key, Value::Array(list));
            }
            Assignment::Remove(key, item) => {
                let mut list = list_field(&patch, current, &key)?;
                list.retain(|v| v.as_str().is_none_or(|s| !s.eq_ignore_ascii_case(&item)));
                patch.insert(key, Value::Array(list));
            }
        }
    }
    Ok(patch)
}

// pending value from the patch, else the current record's value
fn list_field(patch: &Patch, current: &Value, key: &str) -> Result<Vec<Value>> {
    match patch.get(key).or_else(|| current.get(key)) {
        Some(Value::Array(items)) => Ok(items.clone()),
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(_) => bail!("field {key} is not a list"),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn values_keep_json_types() {
        assert_eq!(
            parse_assignment("featured=true").expect("bool"),
            Assignment::Set("featured".into(), json!(true))
        );
        assert_eq!(
            parse_assignment("order = 3").expect("number"),
            Assignment::Set("order".into(), json!(3))
        );
        assert_eq!(
            parse_assignment("title=Hello world").expect("string"),
            Assignment::Set("title".into(), json!("Hello world"))
        );
        assert!(parse_assignment("=x").is_err());
        assert!(parse_assignment("id=p2").is_err());
        assert!(parse_assignment("title").is_err());
    }

    #[test]
    fn list_edits_start_from_current_record() {
        let current = json!({"technologies": ["Rust", "Go"]});
        let patch = build_patch(
            &["technologies+=Zig".to_string(), "technologies-=go".to_string()],
            &current,
        )
        .expect("patch");
        assert_eq!(patch.get("technologies"), Some(&json!(["Rust", "Zig"])));

        let err = build_patch(&["title+=x".to_string()], &json!({"title": "t"}));
        assert!(err.is_err());
    }
}
