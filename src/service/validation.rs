//! Request validation from per-column rules.

use crate::case::to_camel_case;
use crate::error::FieldErrors;
use crate::model::{EntityDef, Row};
use regex::Regex;
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;

/// Digits before the decimal point in a NUMERIC(18,2) column.
pub const MONEY_INTEGER_DIGITS: u32 = 16;
/// Digits before the decimal point in a NUMERIC(18,4) column.
pub const QUANTITY_INTEGER_DIGITS: u32 = 14;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    Email,
}

/// Rule attached to a column. Limits count characters, not bytes.
#[derive(Clone, Copy, Debug, Default)]
pub struct ValidationRule {
    pub required: bool,
    pub max_length: Option<usize>,
    /// (regex, message)
    pub pattern: Option<(&'static str, &'static str)>,
    pub format: Option<Format>,
    /// Decimal columns: most digits allowed before the point.
    pub integer_digits: Option<u32>,
}

impl ValidationRule {
    pub const NONE: ValidationRule = ValidationRule {
        required: false,
        max_length: None,
        pattern: None,
        format: None,
        integer_digits: None,
    };
}

pub struct RequestValidator;

impl RequestValidator {
    /// Validate a writable row against the entity's column rules. Errors are keyed by camelCase API field.
    pub fn validate(entity: &EntityDef, row: &Row) -> FieldErrors {
        let mut errors = FieldErrors::new();
        for col in entity.columns.iter().filter(|c| !c.read_only) {
            let field = to_camel_case(col.name);
            validate_value(&mut errors, &field, row.get(col.name), &col.rule);
        }
        errors
    }
}

/// Validate one value against a rule, recording failures under `field`.
pub fn validate_value(errors: &mut FieldErrors, field: &str, value: Option<&Value>, rule: &ValidationRule) {
    let text = match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.as_str()),
        Some(_) => return,
    };
    let Some(s) = text.filter(|s| !s.trim().is_empty()) else {
        if rule.required {
            errors.add(field, format!("{} is required", field));
        }
        return;
    };
    if let Some(max) = rule.max_length {
        if s.chars().count() > max {
            errors.add(field, format!("{} must be at most {} characters", field, max));
        }
    }
    if let Some((pattern, message)) = rule.pattern {
        match Regex::new(pattern) {
            Ok(re) if !re.is_match(s) => errors.add(field, message),
            Ok(_) => {}
            Err(_) => errors.add(field, format!("invalid pattern for {}", field)),
        }
    }
    if let Some(Format::Email) = rule.format {
        if !is_email(s) {
            errors.add(field, format!("{} must be a valid email", field));
        }
    }
    if let Some(max) = rule.integer_digits {
        match Decimal::from_str(s) {
            Ok(d) => integer_digits(errors, field, d, max),
            Err(_) => errors.add(field, format!("{} must be a number", field)),
        }
    }
}

/// Reject a decimal with more than `max` digits before the point.
pub fn integer_digits(errors: &mut FieldErrors, field: &str, value: Decimal, max: u32) {
    if value.abs().trunc() >= Decimal::from(10i64.pow(max)) {
        errors.add(
            field,
            format!("{} must have at most {} digits before the decimal point", field, max),
        );
    }
}

/// Check an optional free-text value against a maximum length.
pub fn max_length(errors: &mut FieldErrors, field: &str, value: Option<&str>, max: usize) {
    if let Some(s) = value {
        if s.chars().count() > max {
            errors.add(field, format!("{} must be at most {} characters", field, max));
        }
    }
}

fn is_email(s: &str) -> bool {
    let Some((local, domain)) = s.split_once('@') else {
        return false;
    };
    !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.') && !s.contains(' ')
}

/// Trim a required string in place.
pub fn trim(value: &mut String) {
    let trimmed = value.trim();
    if trimmed.len() != value.len() {
        *value = trimmed.to_string();
    }
}

/// Trim an optional string in place; blank becomes `None`.
pub fn trim_opt(value: &mut Option<String>) {
    if let Some(s) = value.as_mut() {
        trim(s);
        if s.is_empty() {
            *value = None;
        }
    }
}
