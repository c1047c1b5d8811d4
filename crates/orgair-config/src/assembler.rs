//! Settings assembly.
//!
//! The [`Assembler`] is the single entry point that turns configuration
//! sources into a [`ValidationOutcome`]. One run walks the stages in
//! [`Stage`] order, collects every issue along the way and only then
//! decides between a [`Settings`] value and the full issue list:
//!
//! ```text
//! Resolving ─▶ FieldChecking ─▶ CrossFieldChecking ─▶ PolicyChecking ─┬─▶ Valid
//!                                                                     └─▶ Invalid
//! ```
//!
//! # Example
//!
//! ```
//! use orgair_config::{Assembler, MapSource, Precedence, SourceStack};
//!
//! let assembler = Assembler::platform().unwrap();
//! let sources = SourceStack::new().with_source(
//!     Precedence::Override,
//!     MapSource::from_pairs("inline", [("RATE_LIMIT_PER_MINUTE", "5000")]),
//! );
//!
//! let outcome = assembler.assemble(&sources);
//! assert!(!outcome.is_valid());
//! assert!(outcome.issues().iter().any(|i| i.field == "RATE_LIMIT_PER_MINUTE"));
//! ```

use std::fmt;

use tracing::{debug, info, warn};

use crate::cross_field;
use crate::error::SchemaError;
use crate::field::{self, FieldValues};
use crate::issue::ValidationIssue;
use crate::policy;
use crate::schema::Schema;
use crate::settings::Settings;
use crate::source::{ResolvedValues, SourceStack};

/// Stage of one assembly run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    /// Merging sources into raw values.
    Resolving,
    /// Coercing and checking individual fields.
    FieldChecking,
    /// Checking multi-field invariants.
    CrossFieldChecking,
    /// Checking environment-conditional rules.
    PolicyChecking,
    /// Every check passed.
    Valid,
    /// At least one issue was found.
    Invalid,
}

impl Stage {
    /// Whether the run has finished.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Valid | Self::Invalid)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Resolving => "resolving",
            Self::FieldChecking => "field_checking",
            Self::CrossFieldChecking => "cross_field_checking",
            Self::PolicyChecking => "policy_checking",
            Self::Valid => "valid",
            Self::Invalid => "invalid",
        };
        f.write_str(name)
    }
}

/// Result of one assembly run. Exactly one variant is populated.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationOutcome {
    /// Fully validated settings.
    Valid(Settings),
    /// Every issue found, ordered: field issues in schema order, then
    /// cross-field issues, then policy issues.
    Invalid(Vec<ValidationIssue>),
}

impl ValidationOutcome {
    /// Whether the outcome is valid.
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }

    /// The settings, when valid.
    pub fn settings(&self) -> Option<&Settings> {
        match self {
            Self::Valid(settings) => Some(settings),
            Self::Invalid(_) => None,
        }
    }

    /// The issues; empty when valid.
    pub fn issues(&self) -> &[ValidationIssue] {
        match self {
            Self::Valid(_) => &[],
            Self::Invalid(issues) => issues,
        }
    }

    /// Convert into a `Result`.
    pub fn into_result(self) -> Result<Settings, Vec<ValidationIssue>> {
        match self {
            Self::Valid(settings) => Ok(settings),
            Self::Invalid(issues) => Err(issues),
        }
    }
}

/// Progress of a single run.
struct Run {
    stage: Stage,
    issues: Vec<ValidationIssue>,
}

impl Run {
    fn new() -> Self {
        Self {
            stage: Stage::Resolving,
            issues: Vec::new(),
        }
    }

    fn advance(&mut self, next: Stage) {
        debug_assert!(next > self.stage, "stages only move forward");
        debug!(from = %self.stage, to = %next, issues = self.issues.len(), "assembly stage");
        self.stage = next;
    }

    fn finish(mut self, values: FieldValues) -> ValidationOutcome {
        if self.issues.is_empty() {
            self.advance(Stage::Valid);
            info!(fields = values.len(), "configuration valid");
            ValidationOutcome::Valid(Settings::new(values))
        } else {
            self.advance(Stage::Invalid);
            warn!(issues = self.issues.len(), "configuration invalid");
            ValidationOutcome::Invalid(self.issues)
        }
    }
}

/// Builds validated settings from sources against a schema.
#[derive(Debug, Clone)]
pub struct Assembler {
    schema: Schema,
}

impl Assembler {
    /// Create an assembler for a schema.
    pub fn new(schema: Schema) -> Self {
        Self { schema }
    }

    /// Create an assembler for the platform schema.
    ///
    /// # Errors
    ///
    /// Returns an error if the built-in schema is malformed.
    pub fn platform() -> Result<Self, SchemaError> {
        Schema::platform().map(Self::new)
    }

    /// The schema in use.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Resolve the sources and validate the result.
    pub fn assemble(&self, sources: &SourceStack) -> ValidationOutcome {
        debug!(sources = ?sources.names(), "resolving configuration");
        let resolved = sources.resolve(&self.schema);
        self.assemble_resolved(&resolved)
    }

    /// Validate an already resolved mapping.
    pub fn assemble_resolved(&self, resolved: &ResolvedValues) -> ValidationOutcome {
        let mut run = Run::new();
        let mut values = FieldValues::new();

        run.advance(Stage::FieldChecking);
        for (spec, pattern) in self.schema.checked_fields() {
            let supplied = resolved.get(spec.name);
            match field::check(spec, pattern, supplied.map(|r| r.raw.as_str())) {
                Ok(value) => values.insert(spec.name, value),
                Err(issues) => {
                    debug!(
                        field = spec.name,
                        source = supplied.map_or("default", |r| r.source.as_str()),
                        issues = issues.len(),
                        "field failed validation"
                    );
                    run.issues.extend(issues);
                }
            }
        }

        run.advance(Stage::CrossFieldChecking);
        run.issues
            .extend(cross_field::check_all(self.schema.weight_groups(), &values));

        run.advance(Stage::PolicyChecking);
        run.issues
            .extend(policy::check_all(self.schema.policies(), &values));

        run.finish(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issue::{IssueCategory, RuleId, CROSS_FIELD};
    use crate::source::{MapSource, Precedence};

    fn baseline() -> MapSource {
        MapSource::from_pairs(
            "baseline",
            [
                ("SECRET_KEY", "dev_key_for_testing_12345678901234567890"),
                ("SNOWFLAKE_ACCOUNT", "test_account"),
                ("SNOWFLAKE_USER", "test_user"),
                ("SNOWFLAKE_PASSWORD", "test_snowflake_password"),
                ("SNOWFLAKE_WAREHOUSE", "test_warehouse"),
                ("AWS_ACCESS_KEY_ID", "test_aws_key_id"),
                ("AWS_SECRET_ACCESS_KEY", "test_aws_secret_key"),
                ("S3_BUCKET", "test_s3_bucket"),
            ],
        )
    }

    fn assemble(overrides: &[(&str, &str)]) -> ValidationOutcome {
        let sources = SourceStack::new()
            .with_overrides(MapSource::from_pairs("overrides", overrides.iter().copied()))
            .with_source(Precedence::File, baseline());
        Assembler::platform().unwrap().assemble(&sources)
    }

    #[test]
    fn test_defaults_with_required_fields_are_valid() {
        let outcome = assemble(&[]);
        let settings = outcome.settings().expect("valid");
        assert_eq!(settings.integer("RATE_LIMIT_PER_MINUTE"), Some(60));
        assert_eq!(settings.text("APP_ENV"), Some("development"));
        assert!(!settings.debug());
    }

    #[test]
    fn test_missing_required_fields_all_reported() {
        let sources = SourceStack::new();
        let outcome = Assembler::platform().unwrap().assemble(&sources);

        let required: Vec<_> = outcome
            .issues()
            .iter()
            .filter(|i| i.category() == IssueCategory::RequiredMissing)
            .map(|i| i.field.as_str())
            .collect();
        assert_eq!(
            required,
            vec![
                "SECRET_KEY",
                "SNOWFLAKE_ACCOUNT",
                "SNOWFLAKE_USER",
                "SNOWFLAKE_PASSWORD",
                "SNOWFLAKE_WAREHOUSE",
                "AWS_ACCESS_KEY_ID",
                "AWS_SECRET_ACCESS_KEY",
                "S3_BUCKET",
            ]
        );
    }

    #[test]
    fn test_issue_order_fields_then_cross_field_then_policy() {
        let outcome = assemble(&[
            ("APP_ENV", "production"),
            ("DEBUG", "true"),
            ("OPENAI_API_KEY", "sk-valid"),
            ("W_DATA_INFRA", "0.28"),
            ("RATE_LIMIT_PER_MINUTE", "0"),
        ]);

        let rules: Vec<_> = outcome.issues().iter().map(|i| i.rule).collect();
        assert_eq!(
            rules,
            vec![
                RuleId::LowerBound,
                RuleId::WeightSum,
                RuleId::ProductionDebugDisabled,
            ]
        );
    }

    #[test]
    fn test_invalid_weight_member_suppresses_sum() {
        let outcome = assemble(&[("W_TALENT", "heavy")]);

        assert_eq!(outcome.issues().len(), 1);
        assert_eq!(outcome.issues()[0].field, "W_TALENT");
        assert_eq!(outcome.issues()[0].rule, RuleId::InvalidType);
        assert!(outcome.issues().iter().all(|i| i.field != CROSS_FIELD));
    }

    #[test]
    fn test_failed_field_does_not_fall_back_to_default() {
        let outcome = assemble(&[("LOG_LEVEL", "VERBOSE")]);
        assert!(!outcome.is_valid());
        assert_eq!(outcome.issues()[0].rule, RuleId::Enumeration);
    }

    #[test]
    fn test_assemble_resolved_is_idempotent() {
        let sources = SourceStack::new()
            .with_overrides(MapSource::from_pairs("overrides", [("DEBUG", "yes")]))
            .with_source(Precedence::File, baseline());
        let assembler = Assembler::platform().unwrap();
        let resolved = sources.resolve(assembler.schema());

        let first = assembler.assemble_resolved(&resolved);
        let second = assembler.assemble_resolved(&resolved);
        assert_eq!(first, second);
    }

    #[test]
    fn test_stage_order() {
        assert!(Stage::Resolving < Stage::FieldChecking);
        assert!(Stage::PolicyChecking < Stage::Valid);
        assert!(Stage::Invalid.is_terminal());
        assert!(!Stage::CrossFieldChecking.is_terminal());
        assert_eq!(Stage::CrossFieldChecking.to_string(), "cross_field_checking");
    }
}
