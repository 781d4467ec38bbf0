//! Bulk record validation.
//!
//! Provides per-entity rule sets, a pure field evaluator, and the batch
//! validator that partitions records into valid and invalid sets, all
//! without database dependencies.

pub mod evaluator;
pub mod rules;
pub mod validator;

pub use rules::{FieldError, RuleSet, ValidationMode, ValidationResult, ValidationWarning};
pub use validator::{validate, validate_with};
