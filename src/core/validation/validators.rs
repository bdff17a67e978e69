//! Reusable field validators
//!
//! Building blocks for [`FieldRules`](super::FieldRules). Each validator
//! receives the field path and its value (`Value::Null` when absent) and
//! returns a human-readable message on failure. Validators other than
//! [`required`] let values of other types through so they can be combined.

use regex::Regex;
use serde_json::Value;
use std::sync::{Arc, OnceLock};

/// A single field check
pub type FieldValidator = Arc<dyn Fn(&str, &Value) -> Result<(), String> + Send + Sync>;

/// Validator: field is required (not null/absent)
pub fn required() -> FieldValidator {
    Arc::new(|field: &str, value: &Value| {
        if value.is_null() {
            Err(format!("'{}' is required", field))
        } else {
            Ok(())
        }
    })
}

/// Validator: number must be strictly positive
pub fn positive() -> FieldValidator {
    Arc::new(|field: &str, value: &Value| match value.as_f64() {
        Some(num) if num <= 0.0 => Err(format!("'{}' must be positive (got {})", field, num)),
        _ => Ok(()),
    })
}

/// Validator: string length (in characters) must be within range
pub fn string_length(min: usize, max: usize) -> FieldValidator {
    Arc::new(move |field: &str, value: &Value| {
        let Some(s) = value.as_str() else {
            return Ok(());
        };
        let len = s.chars().count();
        if len < min {
            Err(format!(
                "'{}' must be at least {} characters (got {})",
                field, min, len
            ))
        } else if len > max {
            Err(format!(
                "'{}' must be at most {} characters (got {})",
                field, max, len
            ))
        } else {
            Ok(())
        }
    })
}

/// Validator: number must not exceed maximum
pub fn max_value(max: f64) -> FieldValidator {
    Arc::new(move |field: &str, value: &Value| match value.as_f64() {
        Some(num) if num > max => Err(format!("'{}' must not exceed {} (got {})", field, max, num)),
        _ => Ok(()),
    })
}

/// Validator: value must be in allowed list
pub fn in_list(allowed: Vec<String>) -> FieldValidator {
    Arc::new(move |field: &str, value: &Value| match value.as_str() {
        Some(s) if !allowed.iter().any(|a| a == s) => Err(format!(
            "'{}' must be one of {:?} (got {})",
            field, allowed, s
        )),
        _ => Ok(()),
    })
}

/// Validator: string must look like an email address
pub fn email() -> FieldValidator {
    static EMAIL_REGEX: OnceLock<Option<Regex>> = OnceLock::new();
    Arc::new(|field: &str, value: &Value| {
        let Some(s) = value.as_str() else {
            return Ok(());
        };
        let regex = EMAIL_REGEX.get_or_init(|| {
            Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").ok()
        });
        match regex {
            Some(regex) if !regex.is_match(s) => {
                Err(format!("'{}' must be a valid email address", field))
            }
            _ => Ok(()),
        }
    })
}
