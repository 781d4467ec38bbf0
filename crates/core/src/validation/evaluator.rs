//! Field evaluator: pure logic, no database access.
//!
//! CSV payloads arrive as strings, so numeric checks accept either JSON
//! numbers or strings that parse as numbers.

use serde_json::{Number, Value};

use super::rules::{FieldError, FieldKind, FieldRule, RuleSet};
use crate::types::Record;

/// Evaluate every rule against a single record at `row` (1-based).
pub fn evaluate_record(rules: &[FieldRule], record: &Record, row: usize) -> Vec<FieldError> {
    rules
        .iter()
        .filter_map(|rule| evaluate_field(rule, record.get(&rule.field), row))
        .collect()
}

/// Whether a value counts as absent for presence checks.
pub fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        _ => false,
    }
}

fn evaluate_field(rule: &FieldRule, value: Option<&Value>, row: usize) -> Option<FieldError> {
    if is_blank(value) {
        return rule
            .required
            .then(|| field_error(rule, row, value, format!("{} is required", rule.field)));
    }
    let value = value?;

    if matches!(rule.kind, FieldKind::String | FieldKind::Email) && !value.is_string() {
        return Some(field_error(
            rule,
            row,
            Some(value),
            format!("{} must be a string", rule.field),
        ));
    }

    let number = match rule.kind {
        FieldKind::String => None,
        FieldKind::Email => {
            return (!is_email(value)).then(|| {
                field_error(
                    rule,
                    row,
                    Some(value),
                    format!("{} must be a valid email address", rule.field),
                )
            });
        }
        FieldKind::Int => match as_int(value) {
            Some(n) => Some(n as f64),
            None => {
                return Some(field_error(
                    rule,
                    row,
                    Some(value),
                    format!("{} must be an integer", rule.field),
                ));
            }
        },
        FieldKind::Float => match as_float(value) {
            Some(n) => Some(n),
            None => {
                return Some(field_error(
                    rule,
                    row,
                    Some(value),
                    format!("{} must be a number", rule.field),
                ));
            }
        },
    };

    if let Some(n) = number {
        if let Some(min) = rule.min_value.filter(|min| n < *min) {
            return Some(field_error(
                rule,
                row,
                Some(value),
                format!("{} must be at least {min}", rule.field),
            ));
        }
        if let Some(max) = rule.max_value.filter(|max| n > *max) {
            return Some(field_error(
                rule,
                row,
                Some(value),
                format!("{} must be at most {max}", rule.field),
            ));
        }
    }

    if let Some(allowed) = &rule.allowed_values {
        let text = scalar_text(value);
        if !allowed.iter().any(|a| *a == text) {
            return Some(field_error(
                rule,
                row,
                Some(value),
                format!("{} must be one of: {}", rule.field, allowed.join(", ")),
            ));
        }
    }

    None
}

fn field_error(rule: &FieldRule, row: usize, value: Option<&Value>, message: String) -> FieldError {
    FieldError {
        field: rule.field.clone(),
        message,
        row,
        value: value.cloned(),
    }
}

fn is_email(value: &Value) -> bool {
    value
        .as_str()
        .map(|s| s.contains('@') && s.contains('.'))
        .unwrap_or(false)
}

fn as_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_float(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

/// Text form of a scalar used for enumeration and duplicate comparisons.
pub fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

/// Convert validated string values to typed JSON values.
///
/// `int` and `float` fields become numbers, blank optional fields are
/// dropped, strings are trimmed. Fields without a rule pass through.
pub fn coerce_record(rules: &RuleSet, record: &Record) -> Record {
    let mut out = Record::new();
    for (key, value) in record {
        let rule = rules.rule(key);
        if rule.is_some() && is_blank(Some(value)) {
            continue;
        }
        let coerced = match rule.map(|r| r.kind) {
            Some(FieldKind::Int) => as_int(value).map(Value::from),
            Some(FieldKind::Float) => as_float(value)
                .and_then(Number::from_f64)
                .map(Value::Number),
            Some(FieldKind::String) | Some(FieldKind::Email) => match value {
                Value::String(s) => Some(Value::String(s.trim().to_string())),
                _ => None,
            },
            None => None,
        };
        out.insert(key.clone(), coerced.unwrap_or_else(|| value.clone()));
    }
    out
}
