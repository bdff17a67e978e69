//! Entity validation
//!
//! `create` and `insert` run every incoming entity through the service's
//! [`EntityValidator`] before anything reaches storage. Any closure with the
//! right signature is a validator; [`FieldRules`] covers the common case of
//! per-field checks.

pub mod validators;

use crate::core::document::{get_path, type_name};
use crate::core::error::{FieldValidationError, ValidationError};
use indexmap::IndexMap;
use serde_json::Value;
pub use validators::FieldValidator;

/// Pluggable predicate over incoming entities
pub trait EntityValidator: Send + Sync {
    fn validate(&self, entity: &Value) -> Result<(), ValidationError>;
}

impl<F> EntityValidator for F
where
    F: Fn(&Value) -> Result<(), ValidationError> + Send + Sync,
{
    fn validate(&self, entity: &Value) -> Result<(), ValidationError> {
        self(entity)
    }
}

/// Per-field validator lists, checked in declaration order
///
/// # Example
///
/// ```rust,ignore
/// let rules = FieldRules::new()
///     .field("name", vec![validators::required(), validators::string_length(1, 80)])
///     .field("email", vec![validators::email()]);
/// ```
#[derive(Clone, Default)]
pub struct FieldRules {
    rules: IndexMap<String, Vec<FieldValidator>>,
}

impl FieldRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add validators for a (possibly dotted) field path
    pub fn field(mut self, path: impl Into<String>, validators: Vec<FieldValidator>) -> Self {
        self.rules.entry(path.into()).or_default().extend(validators);
        self
    }
}

impl EntityValidator for FieldRules {
    fn validate(&self, entity: &Value) -> Result<(), ValidationError> {
        let Value::Object(doc) = entity else {
            return Err(ValidationError::NotAnObject {
                found: type_name(entity).to_string(),
            });
        };

        let mut errors = Vec::new();
        for (path, validators) in &self.rules {
            let value = get_path(doc, path).unwrap_or(&Value::Null);
            for validator in validators {
                if let Err(message) = validator(path, value) {
                    errors.push(FieldValidationError {
                        field: path.clone(),
                        message,
                    });
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::FieldErrors(errors))
        }
    }
}
