//! Field constraint engine.
//!
//! [`check`] turns one resolved raw string into a typed [`FieldValue`] and
//! applies the field's constraints. It never stops at the first violated
//! constraint: every failure becomes its own [`ValidationIssue`].

use std::fmt;

use indexmap::IndexMap;
use regex::Regex;
use serde::Serialize;

use crate::issue::{RuleId, ValidationIssue};
use crate::schema::{FieldKind, FieldSpec, Presence};
use crate::secret::Secret;

/// A typed, coerced field value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Integer value.
    Integer(i64),
    /// Decimal value.
    Decimal(f64),
    /// Boolean value.
    Flag(bool),
    /// String value.
    Text(String),
    /// Secret value; serializes as the mask.
    Secret(Secret),
    /// Optional field with no value.
    Unset,
}

impl FieldValue {
    /// Numeric view used by bound checks.
    fn as_number(&self) -> Option<f64> {
        match self {
            Self::Integer(v) => Some(*v as f64),
            Self::Decimal(v) => Some(*v),
            _ => None,
        }
    }

    /// Whether this is [`FieldValue::Unset`].
    pub fn is_unset(&self) -> bool {
        matches!(self, Self::Unset)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(v) => write!(f, "{v}"),
            Self::Decimal(v) => write!(f, "{v}"),
            Self::Flag(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
            Self::Secret(v) => write!(f, "{v}"),
            Self::Unset => f.write_str("<unset>"),
        }
    }
}

/// Typed values of the fields that passed field checking, in schema order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FieldValues {
    values: IndexMap<&'static str, FieldValue>,
}

impl FieldValues {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a field value.
    pub fn insert(&mut self, name: &'static str, value: FieldValue) {
        self.values.insert(name, value);
    }

    /// Value of a field, by case-insensitive name.
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.values.get(name).or_else(|| {
            self.values
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v)
        })
    }

    /// Integer value of a field.
    pub fn integer(&self, name: &str) -> Option<i64> {
        match self.get(name)? {
            FieldValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// Decimal value of a field.
    pub fn decimal(&self, name: &str) -> Option<f64> {
        match self.get(name)? {
            FieldValue::Decimal(v) => Some(*v),
            _ => None,
        }
    }

    /// Boolean value of a field.
    pub fn flag(&self, name: &str) -> Option<bool> {
        match self.get(name)? {
            FieldValue::Flag(v) => Some(*v),
            _ => None,
        }
    }

    /// String value of a field.
    pub fn text(&self, name: &str) -> Option<&str> {
        match self.get(name)? {
            FieldValue::Text(v) => Some(v),
            _ => None,
        }
    }

    /// Secret value of a field; `None` when unset.
    pub fn secret(&self, name: &str) -> Option<&Secret> {
        match self.get(name)? {
            FieldValue::Secret(v) => Some(v),
            _ => None,
        }
    }

    /// Whether the field holds a value (possibly [`FieldValue::Unset`]).
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Iterate in schema order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &FieldValue)> {
        self.values.iter().map(|(k, v)| (*k, v))
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether there are no fields.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Check one field.
///
/// `raw` is the resolved value, or `None` when no source supplied one.
/// Returns the typed value when every constraint holds, otherwise every
/// issue found for this field.
pub fn check(
    spec: &FieldSpec,
    pattern: Option<&Regex>,
    raw: Option<&str>,
) -> Result<FieldValue, Vec<ValidationIssue>> {
    let raw = match (raw, spec.presence) {
        (Some(raw), _) => raw,
        (None, Presence::Default(default)) => default,
        (None, Presence::Optional) => return Ok(FieldValue::Unset),
        (None, Presence::Required) => {
            return Err(vec![ValidationIssue::new(
                spec.name,
                RuleId::Required,
                "required field missing: no source provides a value and there is no default",
            )]);
        }
    };

    // An empty optional value means "not configured".
    if raw.is_empty() && spec.presence == Presence::Optional {
        return Ok(FieldValue::Unset);
    }

    let value = coerce(spec, raw).map_err(|issue| vec![issue])?;
    let issues = constraint_issues(spec, pattern, &value);

    if issues.is_empty() {
        Ok(value)
    } else {
        Err(issues)
    }
}

fn coerce(spec: &FieldSpec, raw: &str) -> Result<FieldValue, ValidationIssue> {
    let invalid = |expected: &str| {
        ValidationIssue::new(
            spec.name,
            RuleId::InvalidType,
            format!("expected {expected}, got '{raw}'"),
        )
    };

    match spec.kind {
        FieldKind::Integer => raw
            .trim()
            .parse::<i64>()
            .map(FieldValue::Integer)
            .map_err(|_| invalid("an integer")),
        FieldKind::Decimal => match raw.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(FieldValue::Decimal(v)),
            _ => Err(invalid("a finite decimal number")),
        },
        FieldKind::Boolean => parse_bool(raw.trim())
            .map(FieldValue::Flag)
            .ok_or_else(|| invalid("a boolean (true/false, 1/0, yes/no, on/off)")),
        FieldKind::Text => Ok(FieldValue::Text(raw.to_string())),
        FieldKind::Secret => Ok(FieldValue::Secret(Secret::new(raw))),
    }
}

fn constraint_issues(
    spec: &FieldSpec,
    pattern: Option<&Regex>,
    value: &FieldValue,
) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    if let Some(number) = value.as_number() {
        if let Some(min) = spec.min {
            if number < min {
                issues.push(ValidationIssue::new(
                    spec.name,
                    RuleId::LowerBound,
                    format!("value {value} is below the minimum of {min}"),
                ));
            }
        }
        if let Some(max) = spec.max {
            if number > max {
                issues.push(ValidationIssue::new(
                    spec.name,
                    RuleId::UpperBound,
                    format!("value {value} is above the maximum of {max}"),
                ));
            }
        }
    }

    // Secret checks describe lengths and formats only, never contents.
    let (text, is_secret) = match value {
        FieldValue::Text(s) => (s.as_str(), false),
        FieldValue::Secret(s) => (s.reveal(), true),
        _ => return issues,
    };

    if let Some(min_length) = spec.min_length {
        let length = text.chars().count();
        if length < min_length {
            issues.push(ValidationIssue::new(
                spec.name,
                RuleId::MinLength,
                format!("length {length} is shorter than the minimum of {min_length}"),
            ));
        }
    }

    if let (Some(regex), Some(source)) = (pattern, spec.pattern) {
        if !regex.is_match(text) {
            let message = if is_secret {
                format!("value does not match the required format `{source}`")
            } else {
                format!("value '{text}' does not match the required format `{source}`")
            };
            issues.push(ValidationIssue::new(spec.name, RuleId::Pattern, message));
        }
    }

    if let Some(allowed) = spec.one_of {
        if !allowed.contains(&text) {
            let shown = if is_secret { value.to_string() } else { text.to_string() };
            issues.push(ValidationIssue::new(
                spec.name,
                RuleId::Enumeration,
                format!("'{shown}' is not one of: {}", allowed.join(", ")),
            ));
        }
    }

    issues
}

/// Parse a boolean from a string.
pub(crate) fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
