//! Structured and human-readable validation reports.
//!
//! The JSON shape is
//! `{"status": "valid"|"invalid", "fields"?: {...}, "issues"?: [...]}`.
//! Secret fields are always rendered as the mask.

use std::fmt::{self, Write as _};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::assembler::ValidationOutcome;
use crate::field::FieldValue;
use crate::issue::ValidationIssue;
use crate::secret::MASK;

/// Overall validity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Every check passed.
    Valid,
    /// At least one issue.
    Invalid,
}

impl Status {
    /// Lowercase name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Valid => "valid",
            Self::Invalid => "invalid",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rendered [`ValidationOutcome`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    /// Overall validity.
    pub status: Status,
    /// Field projection, present when valid.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<IndexMap<String, Value>>,
    /// Ordered issues, present when invalid.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issues: Option<Vec<ValidationIssue>>,
}

impl ValidationReport {
    /// Render an outcome.
    pub fn from_outcome(outcome: &ValidationOutcome) -> Self {
        match outcome {
            ValidationOutcome::Valid(settings) => Self {
                status: Status::Valid,
                fields: Some(
                    settings
                        .iter()
                        .map(|(name, value)| (name.to_string(), render_value(value)))
                        .collect(),
                ),
                issues: None,
            },
            ValidationOutcome::Invalid(issues) => Self {
                status: Status::Invalid,
                fields: None,
                issues: Some(issues.clone()),
            },
        }
    }

    /// Whether the report is for a valid outcome.
    pub fn is_valid(&self) -> bool {
        self.status == Status::Valid
    }

    /// Pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Plain-text rendering, one line per field or issue.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        match (&self.fields, &self.issues) {
            (_, Some(issues)) => {
                let _ = writeln!(out, "status: {} ({} issues)", self.status, issues.len());
                for issue in issues {
                    let _ = writeln!(out, "- {issue}");
                }
            }
            (Some(fields), None) => {
                let _ = writeln!(out, "status: {}", self.status);
                for (name, value) in fields {
                    let _ = writeln!(out, "  {name} = {}", display_value(value));
                }
            }
            (None, None) => {
                let _ = writeln!(out, "status: {}", self.status);
            }
        }
        out
    }
}

impl From<&ValidationOutcome> for ValidationReport {
    fn from(outcome: &ValidationOutcome) -> Self {
        Self::from_outcome(outcome)
    }
}

/// Report for one named scenario.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioReport {
    /// Scenario name.
    pub scenario: String,
    /// Declared expectation, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expect: Option<Status>,
    /// The rendered outcome.
    #[serde(flatten)]
    pub report: ValidationReport,
}

impl ScenarioReport {
    /// Whether the outcome matches the declared expectation.
    ///
    /// Scenarios without an expectation always match.
    pub fn matches_expectation(&self) -> bool {
        self.expect.map_or(true, |expect| expect == self.report.status)
    }

    /// Plain-text rendering with a scenario header.
    pub fn render_text(&self) -> String {
        let mut out = format!("--- {} ---\n", self.scenario);
        out.push_str(&self.report.render_text());
        if let Some(expect) = self.expect {
            let verdict = if self.matches_expectation() { "ok" } else { "MISMATCH" };
            let _ = writeln!(out, "expected: {expect} [{verdict}]");
        }
        out
    }
}

fn render_value(value: &FieldValue) -> Value {
    match value {
        FieldValue::Integer(v) => Value::from(*v),
        FieldValue::Decimal(v) => serde_json::Number::from_f64(*v).map_or(Value::Null, Value::Number),
        FieldValue::Flag(v) => Value::Bool(*v),
        FieldValue::Text(v) => Value::String(v.clone()),
        FieldValue::Secret(_) => Value::String(MASK.to_string()),
        FieldValue::Unset => Value::Null,
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "<unset>".to_string(),
        other => other.to_string(),
    }
}
