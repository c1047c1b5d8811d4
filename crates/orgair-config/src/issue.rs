//! Validation issue records.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Field marker used by cross-field issues.
pub const CROSS_FIELD: &str = "cross-field";

/// Field marker used by policy issues.
pub const POLICY: &str = "policy";

/// Identifier of the rule an issue violates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleId {
    /// Required field has no value and no default.
    Required,
    /// Raw value could not be coerced to the declared type.
    InvalidType,
    /// Numeric value below its inclusive lower bound.
    LowerBound,
    /// Numeric value above its inclusive upper bound.
    UpperBound,
    /// String shorter than its minimum length.
    MinLength,
    /// String does not match its pattern.
    Pattern,
    /// String is not one of the enumerated values.
    Enumeration,
    /// Weight group does not sum to its target.
    WeightSum,
    /// Debug mode enabled in production.
    ProductionDebugDisabled,
    /// Secret too short in production.
    ProductionSecretLength,
    /// No LLM credential configured in production.
    ProductionLlmCredential,
}

impl RuleId {
    /// Stable string form, as serialized.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Required => "required",
            Self::InvalidType => "invalid_type",
            Self::LowerBound => "lower_bound",
            Self::UpperBound => "upper_bound",
            Self::MinLength => "min_length",
            Self::Pattern => "pattern",
            Self::Enumeration => "enumeration",
            Self::WeightSum => "weight_sum",
            Self::ProductionDebugDisabled => "production_debug_disabled",
            Self::ProductionSecretLength => "production_secret_length",
            Self::ProductionLlmCredential => "production_llm_credential",
        }
    }

    /// Error category the rule belongs to.
    pub const fn category(self) -> IssueCategory {
        match self {
            Self::Required => IssueCategory::RequiredMissing,
            Self::InvalidType | Self::Pattern | Self::Enumeration => IssueCategory::TypeFormat,
            Self::LowerBound | Self::UpperBound | Self::MinLength => IssueCategory::Bound,
            Self::WeightSum => IssueCategory::CrossField,
            Self::ProductionDebugDisabled
            | Self::ProductionSecretLength
            | Self::ProductionLlmCredential => IssueCategory::Policy,
        }
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse classification of validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IssueCategory {
    /// A required field is missing from every source.
    RequiredMissing,
    /// A value has the wrong type or format.
    TypeFormat,
    /// A value is outside its numeric or length bounds.
    Bound,
    /// A multi-field invariant failed.
    CrossField,
    /// An environment-conditional rule failed.
    Policy,
}

/// A single, attributable validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Field name, or [`CROSS_FIELD`] / [`POLICY`].
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
    /// Violated rule.
    pub rule: RuleId,
}

impl ValidationIssue {
    /// Create an issue.
    pub fn new(field: impl Into<String>, rule: RuleId, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            rule,
        }
    }

    /// Category of the violated rule.
    pub fn category(&self) -> IssueCategory {
        self.rule.category()
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]: {}", self.field, self.rule, self.message)
    }
}
