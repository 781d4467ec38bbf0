//! Field rule sets per entity type and the validation result types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::entity::EntityType;
use crate::types::Record;

/// Name of the key field that update and lifecycle operations address.
pub const KEY_FIELD: &str = "id";

/// Upper bound shared by the money and area ranges below.
const MAX_AMOUNT: f64 = 1_000_000.0;

// ---------------------------------------------------------------------------
// Rule types
// ---------------------------------------------------------------------------

/// Value type a field must coerce to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    String,
    Int,
    Float,
    Email,
}

impl FieldKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Int => "int",
            Self::Float => "float",
            Self::Email => "email",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Int | Self::Float)
    }
}

/// Checks applied to a single field of every record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldRule {
    pub field: String,
    pub required: bool,
    pub kind: FieldKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_values: Option<Vec<String>>,
}

impl FieldRule {
    /// A required field of the given kind.
    pub fn required(field: &str, kind: FieldKind) -> Self {
        Self {
            field: field.to_string(),
            required: true,
            kind,
            min_value: None,
            max_value: None,
            allowed_values: None,
        }
    }

    /// An optional field of the given kind.
    pub fn optional(field: &str, kind: FieldKind) -> Self {
        Self {
            required: false,
            ..Self::required(field, kind)
        }
    }

    pub fn min(mut self, min: f64) -> Self {
        self.min_value = Some(min);
        self
    }

    pub fn range(mut self, min: f64, max: f64) -> Self {
        self.min_value = Some(min);
        self.max_value = Some(max);
        self
    }

    pub fn one_of(mut self, values: &[&str]) -> Self {
        self.allowed_values = Some(values.iter().map(|v| v.to_string()).collect());
        self
    }
}

/// How strictly a batch is validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationMode {
    /// Every rule applies (create / import).
    #[default]
    Full,
    /// `id` is required; other rules apply only to fields that are present.
    Partial,
    /// Only `id` is checked (delete / archive / activate / deactivate).
    KeyOnly,
}

/// The complete rule configuration for one entity type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    pub entity_type: EntityType,
    pub rules: Vec<FieldRule>,
    /// Fields whose values must not repeat within one batch.
    pub unique_fields: Vec<String>,
}

impl RuleSet {
    /// Built-in rules for an entity type.
    pub fn for_entity(entity_type: EntityType) -> Self {
        use FieldKind::{Email, Float, Int, String as Text};

        let (rules, unique): (Vec<FieldRule>, &[&str]) = match entity_type {
            EntityType::Properties => (
                vec![
                    FieldRule::required("property_name", Text),
                    FieldRule::required("address", Text),
                    FieldRule::required("city", Text),
                    FieldRule::required("state", Text),
                    FieldRule::required("zip_code", Text),
                    FieldRule::required("property_type", Text).one_of(&[
                        "apartment",
                        "house",
                        "condo",
                        "townhouse",
                        "commercial",
                    ]),
                    FieldRule::optional("units", Int).range(1.0, 10_000.0),
                    FieldRule::optional("rent_amount", Float).range(0.0, MAX_AMOUNT),
                    FieldRule::optional("square_feet", Int).range(0.0, MAX_AMOUNT),
                ],
                &["property_name"],
            ),
            EntityType::Tenants => (
                vec![
                    FieldRule::required("first_name", Text),
                    FieldRule::required("last_name", Text),
                    FieldRule::required("email", Email),
                    FieldRule::optional("phone", Text),
                    FieldRule::optional("property_id", Int).min(1.0),
                    FieldRule::optional("monthly_rent", Float).range(0.0, MAX_AMOUNT),
                    FieldRule::optional("status", Text).one_of(&["active", "inactive", "pending"]),
                ],
                &["email"],
            ),
            EntityType::MaintenanceRequests => (
                vec![
                    FieldRule::required("property_id", Int).min(1.0),
                    FieldRule::required("title", Text),
                    FieldRule::required("description", Text),
                    FieldRule::required("priority", Text)
                        .one_of(&["low", "medium", "high", "urgent"]),
                    FieldRule::optional("status", Text).one_of(&[
                        "open",
                        "in_progress",
                        "completed",
                        "cancelled",
                    ]),
                    FieldRule::optional("estimated_cost", Float).range(0.0, MAX_AMOUNT),
                ],
                &[],
            ),
            EntityType::Users => (
                vec![
                    FieldRule::required("username", Text),
                    FieldRule::required("email", Email),
                    FieldRule::required("role", Text)
                        .one_of(&["admin", "manager", "staff", "tenant"]),
                    FieldRule::optional("first_name", Text),
                    FieldRule::optional("last_name", Text),
                ],
                &["username", "email"],
            ),
        };

        Self {
            entity_type,
            rules,
            unique_fields: unique.iter().map(|f| f.to_string()).collect(),
        }
    }

    /// Derive the rule set used for a validation mode.
    pub fn for_mode(&self, mode: ValidationMode) -> Self {
        let key_rule = FieldRule::required(KEY_FIELD, FieldKind::Int).min(1.0);
        match mode {
            ValidationMode::Full => self.clone(),
            ValidationMode::Partial => {
                let mut rules = vec![key_rule];
                rules.extend(
                    self.rules
                        .iter()
                        .filter(|r| r.field != KEY_FIELD)
                        .cloned()
                        .map(|r| FieldRule {
                            required: false,
                            ..r
                        }),
                );
                let mut unique_fields = vec![KEY_FIELD.to_string()];
                unique_fields.extend(self.unique_fields.iter().cloned());
                Self {
                    entity_type: self.entity_type,
                    rules,
                    unique_fields,
                }
            }
            ValidationMode::KeyOnly => Self {
                entity_type: self.entity_type,
                rules: vec![key_rule],
                unique_fields: vec![KEY_FIELD.to_string()],
            },
        }
    }

    pub fn rule(&self, field: &str) -> Option<&FieldRule> {
        self.rules.iter().find(|r| r.field == field)
    }

    /// Check that the configuration itself is usable.
    pub fn check(&self) -> Result<(), String> {
        for (i, rule) in self.rules.iter().enumerate() {
            if rule.field.trim().is_empty() {
                return Err(format!("rule #{i} has an empty field name"));
            }
            if self.rules[..i].iter().any(|r| r.field == rule.field) {
                return Err(format!("field '{}' has more than one rule", rule.field));
            }
            if (rule.min_value.is_some() || rule.max_value.is_some()) && !rule.kind.is_numeric() {
                return Err(format!(
                    "field '{}' has numeric bounds but kind '{}'",
                    rule.field,
                    rule.kind.as_str()
                ));
            }
            if let (Some(min), Some(max)) = (rule.min_value, rule.max_value) {
                if min > max {
                    return Err(format!(
                        "field '{}' has min_value {min} greater than max_value {max}",
                        rule.field
                    ));
                }
            }
            if matches!(&rule.allowed_values, Some(values) if values.is_empty()) {
                return Err(format!("field '{}' allows no values", rule.field));
            }
        }
        for field in &self.unique_fields {
            if self.rule(field).is_none() {
                return Err(format!("unique field '{field}' has no rule"));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// A single field-level error on one record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
    /// 1-based position of the record in the submitted batch.
    pub row: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

/// Informational finding that does not invalidate the record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub row: usize,
    /// Row of the earlier record carrying the same value.
    pub duplicate_of_row: usize,
    pub value: Value,
}

/// A rejected record together with the errors that rejected it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvalidRecord {
    pub row: usize,
    pub record: Record,
    pub errors: Vec<FieldError>,
}

/// Outcome of validating one batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<FieldError>,
    pub warnings: Vec<ValidationWarning>,
    pub valid_records: Vec<Record>,
    pub invalid_records: Vec<InvalidRecord>,
}
