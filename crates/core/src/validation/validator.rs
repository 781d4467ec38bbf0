//! Batch validator: partitions records into valid and invalid sets.

use std::collections::HashMap;

use super::evaluator::{evaluate_record, is_blank, scalar_text};
use super::rules::{FieldError, InvalidRecord, RuleSet, ValidationResult, ValidationWarning};
use crate::entity::EntityType;
use crate::types::Record;

/// Field name reported when the rule set itself is unusable.
pub const RULES_FIELD: &str = "_rules";

/// Validate a batch against the built-in rules for `entity_type`.
pub fn validate(entity_type: EntityType, records: &[Record]) -> ValidationResult {
    validate_with(&RuleSet::for_entity(entity_type), records)
}

/// Validate a batch against an explicit rule set.
///
/// Row numbers are 1-based positions in `records`. Duplicate values of a
/// unique field only produce warnings, and only on the later occurrences.
/// A misconfigured rule set never panics; it rejects the whole batch with a
/// single generic error. `is_valid` always equals `invalid_records.is_empty()`,
/// so an empty batch stays valid under broken rules while still carrying the
/// generic error.
pub fn validate_with(rules: &RuleSet, records: &[Record]) -> ValidationResult {
    if let Err(reason) = rules.check() {
        tracing::error!(
            entity_type = %rules.entity_type,
            error = %reason,
            "Validation rules are misconfigured",
        );
        return misconfigured(rules, records, &reason);
    }

    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    let mut valid_records = Vec::new();
    let mut invalid_records = Vec::new();

    // (field, value text) -> first row carrying it.
    let mut first_seen: HashMap<(&str, String), usize> = HashMap::new();

    for (index, record) in records.iter().enumerate() {
        let row = index + 1;

        for field in &rules.unique_fields {
            let value = record.get(field.as_str());
            if is_blank(value) {
                continue;
            }
            let Some(value) = value else { continue };
            let key = (field.as_str(), scalar_text(value));
            match first_seen.get(&key) {
                Some(&first_row) => warnings.push(ValidationWarning {
                    field: field.clone(),
                    message: format!(
                        "Duplicate {field} '{}' (first seen in row {first_row})",
                        key.1
                    ),
                    row,
                    duplicate_of_row: first_row,
                    value: value.clone(),
                }),
                None => {
                    first_seen.insert(key, row);
                }
            }
        }

        let record_errors = evaluate_record(&rules.rules, record, row);
        if record_errors.is_empty() {
            valid_records.push(record.clone());
        } else {
            errors.extend(record_errors.iter().cloned());
            invalid_records.push(InvalidRecord {
                row,
                record: record.clone(),
                errors: record_errors,
            });
        }
    }

    tracing::debug!(
        entity_type = %rules.entity_type,
        total = records.len(),
        valid = valid_records.len(),
        invalid = invalid_records.len(),
        warnings = warnings.len(),
        "Validated bulk records",
    );

    ValidationResult {
        is_valid: invalid_records.is_empty(),
        errors,
        warnings,
        valid_records,
        invalid_records,
    }
}

fn misconfigured(rules: &RuleSet, records: &[Record], reason: &str) -> ValidationResult {
    let message = format!(
        "Validation rules for {} are misconfigured: {reason}",
        rules.entity_type
    );
    let generic = |row: usize| FieldError {
        field: RULES_FIELD.to_string(),
        message: message.clone(),
        row,
        value: None,
    };

    let invalid_records: Vec<InvalidRecord> = records
        .iter()
        .enumerate()
        .map(|(index, record)| InvalidRecord {
            row: index + 1,
            record: record.clone(),
            errors: vec![generic(index + 1)],
        })
        .collect();

    ValidationResult {
        is_valid: invalid_records.is_empty(),
        errors: vec![generic(0)],
        warnings: Vec::new(),
        valid_records: Vec::new(),
        invalid_records,
    }
}
