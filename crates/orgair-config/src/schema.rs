//! Configuration schema.
//!
//! A [`Schema`] is a static table of [`FieldSpec`] records plus the
//! multi-field rules evaluated after field checking: [`WeightGroup`]s and
//! [`ConditionalPolicy`]s. Every rule is data; one generic routine in
//! [`field`](crate::field) checks all fields.
//!
//! [`Schema::new`] rejects malformed schemas with a [`SchemaError`]. That is
//! a programming error and should abort start-up.

use std::collections::HashSet;

use regex::Regex;

use crate::error::SchemaError;
use crate::field;
use crate::issue::RuleId;

/// Semantic type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Signed integer.
    Integer,
    /// IEEE double.
    Decimal,
    /// Boolean flag.
    Boolean,
    /// Plain string (possibly enumerated).
    Text,
    /// Sensitive string, wrapped in [`Secret`](crate::Secret).
    Secret,
}

impl FieldKind {
    /// Lowercase name used in messages.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::Decimal => "decimal",
            Self::Boolean => "boolean",
            Self::Text => "text",
            Self::Secret => "secret",
        }
    }
}

/// What happens when no source supplies a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    /// The field must be supplied.
    Required,
    /// The field may be absent; it is then unset.
    Optional,
    /// The field falls back to this raw value.
    Default(&'static str),
}

/// Static metadata for one configuration field.
///
/// Constraints are checked in a fixed order: lower bound, upper bound,
/// minimum length, pattern, enumeration. Bounds are inclusive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldSpec {
    /// Canonical (upper-case) field name.
    pub name: &'static str,
    /// Semantic type.
    pub kind: FieldKind,
    /// Required, optional or defaulted.
    pub presence: Presence,
    /// Inclusive numeric lower bound.
    pub min: Option<f64>,
    /// Inclusive numeric upper bound.
    pub max: Option<f64>,
    /// Minimum string length in characters.
    pub min_length: Option<usize>,
    /// Regular expression the string must match.
    pub pattern: Option<&'static str>,
    /// Allowed string values.
    pub one_of: Option<&'static [&'static str]>,
}

impl FieldSpec {
    /// Create an optional field with no constraints.
    pub const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            presence: Presence::Optional,
            min: None,
            max: None,
            min_length: None,
            pattern: None,
            one_of: None,
        }
    }

    /// Integer field.
    pub const fn integer(name: &'static str) -> Self {
        Self::new(name, FieldKind::Integer)
    }

    /// Decimal field.
    pub const fn decimal(name: &'static str) -> Self {
        Self::new(name, FieldKind::Decimal)
    }

    /// Boolean field.
    pub const fn boolean(name: &'static str) -> Self {
        Self::new(name, FieldKind::Boolean)
    }

    /// Text field.
    pub const fn text(name: &'static str) -> Self {
        Self::new(name, FieldKind::Text)
    }

    /// Secret field.
    pub const fn secret(name: &'static str) -> Self {
        Self::new(name, FieldKind::Secret)
    }

    /// Mark the field as required.
    pub const fn required(mut self) -> Self {
        self.presence = Presence::Required;
        self
    }

    /// Give the field a compiled-in default.
    pub const fn default_value(mut self, raw: &'static str) -> Self {
        self.presence = Presence::Default(raw);
        self
    }

    /// Inclusive lower bound.
    pub const fn min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    /// Inclusive upper bound.
    pub const fn max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }

    /// Inclusive range.
    pub const fn range(self, min: f64, max: f64) -> Self {
        self.min(min).max(max)
    }

    /// Minimum length in characters.
    pub const fn min_length(mut self, len: usize) -> Self {
        self.min_length = Some(len);
        self
    }

    /// Regular expression the value must match.
    pub const fn pattern(mut self, pattern: &'static str) -> Self {
        self.pattern = Some(pattern);
        self
    }

    /// Enumerated allowed values.
    pub const fn one_of(mut self, values: &'static [&'static str]) -> Self {
        self.one_of = Some(values);
        self
    }

    /// Whether the field is required.
    pub const fn is_required(&self) -> bool {
        matches!(self.presence, Presence::Required)
    }
}

/// A group of decimal fields that must sum to a target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightGroup {
    /// Group name used in messages.
    pub name: &'static str,
    /// Member field names.
    pub fields: &'static [&'static str],
    /// Required sum.
    pub target: f64,
    /// Allowed absolute deviation from the target.
    pub tolerance: f64,
}

/// One rule of a [`ConditionalPolicy`].
///
/// Each rule carries the [`RuleId`] its issues are reported under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyRule {
    /// The boolean field must be false.
    FlagDisabled {
        /// Boolean field name.
        field: &'static str,
        /// Reported rule id.
        rule: RuleId,
    },
    /// The secret's revealed length must be at least `min` characters.
    SecretMinLength {
        /// Secret field name.
        field: &'static str,
        /// Minimum length.
        min: usize,
        /// Reported rule id.
        rule: RuleId,
    },
    /// At least one of the secret fields must be non-empty.
    AnyCredential {
        /// Alternative credential slots.
        fields: &'static [&'static str],
        /// Reported rule id.
        rule: RuleId,
    },
}

impl PolicyRule {
    /// Fields the rule reads, with the kind each must have.
    pub fn fields(&self) -> Vec<(&'static str, FieldKind)> {
        match *self {
            Self::FlagDisabled { field, .. } => vec![(field, FieldKind::Boolean)],
            Self::SecretMinLength { field, .. } => vec![(field, FieldKind::Secret)],
            Self::AnyCredential { fields, .. } => {
                fields.iter().map(|f| (*f, FieldKind::Secret)).collect()
            }
        }
    }

    /// The rule id issues are reported under.
    pub const fn rule_id(&self) -> RuleId {
        match *self {
            Self::FlagDisabled { rule, .. }
            | Self::SecretMinLength { rule, .. }
            | Self::AnyCredential { rule, .. } => rule,
        }
    }
}

/// Rules active only when a discriminant field has a given value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConditionalPolicy {
    /// Discriminant field name.
    pub discriminant: &'static str,
    /// Value that activates the rules.
    pub active_when: &'static str,
    /// Rules evaluated independently when active.
    pub rules: &'static [PolicyRule],
}

// ---------------------------------------------------------------------------
// Platform schema
// ---------------------------------------------------------------------------

/// Deployment environment discriminant.
pub const APP_ENV: &str = "APP_ENV";
/// Debug flag.
pub const DEBUG: &str = "DEBUG";
/// Application secret key.
pub const SECRET_KEY: &str = "SECRET_KEY";
/// OpenAI credential slot.
pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";
/// Anthropic credential slot.
pub const ANTHROPIC_API_KEY: &str = "ANTHROPIC_API_KEY";
/// Log level.
pub const LOG_LEVEL: &str = "LOG_LEVEL";
/// Log format.
pub const LOG_FORMAT: &str = "LOG_FORMAT";
/// API rate limit.
pub const RATE_LIMIT_PER_MINUTE: &str = "RATE_LIMIT_PER_MINUTE";

/// The seven scoring dimension weights.
pub const DIMENSION_WEIGHTS: &[&str] = &[
    "W_DATA_INFRA",
    "W_AI_GOVERNANCE",
    "W_TECH_STACK",
    "W_TALENT",
    "W_LEADERSHIP",
    "W_USE_CASES",
    "W_CULTURE",
];

/// Allowed deployment environments.
pub const ENVIRONMENTS: &[&str] = &["development", "staging", "production"];

/// Tolerance on the dimension weight sum.
pub const WEIGHT_TOLERANCE: f64 = 0.001;

/// Minimum production secret key length.
pub const PRODUCTION_SECRET_MIN_LENGTH: usize = 32;

/// Field table of the platform settings.
pub const PLATFORM_FIELDS: &[FieldSpec] = &[
    // Application
    FieldSpec::text("APP_NAME").default_value("PE Org-AI-R Platform").min_length(1),
    FieldSpec::text("APP_VERSION").default_value("4.0.0"),
    FieldSpec::text(APP_ENV).default_value("development").one_of(ENVIRONMENTS),
    FieldSpec::boolean(DEBUG).default_value("false"),
    FieldSpec::text(LOG_LEVEL)
        .default_value("INFO")
        .one_of(&["DEBUG", "INFO", "WARNING", "ERROR"]),
    FieldSpec::text(LOG_FORMAT).default_value("json").one_of(&["json", "console"]),
    FieldSpec::secret(SECRET_KEY).required(),
    // API
    FieldSpec::text("API_V1_PREFIX").default_value("/api/v1"),
    FieldSpec::text("API_V2_PREFIX").default_value("/api/v2"),
    FieldSpec::integer(RATE_LIMIT_PER_MINUTE).default_value("60").range(1.0, 1000.0),
    FieldSpec::text("PARAM_VERSION").default_value("v2.0").one_of(&["v1.0", "v2.0"]),
    // LLM providers
    FieldSpec::secret(OPENAI_API_KEY).pattern("^sk-"),
    FieldSpec::secret(ANTHROPIC_API_KEY),
    FieldSpec::text("DEFAULT_LLM_MODEL").default_value("gpt-4o-2024-08-06").min_length(1),
    FieldSpec::text("FALLBACK_LLM_MODEL").default_value("claude-sonnet-4-20250514").min_length(1),
    // Cost management
    FieldSpec::decimal("DAILY_COST_BUDGET_USD").default_value("500.0").min(0.0),
    FieldSpec::decimal("COST_ALERT_THRESHOLD_PCT").default_value("0.8").range(0.0, 1.0),
    // Human-in-the-loop thresholds
    FieldSpec::decimal("HITL_SCORE_CHANGE_THRESHOLD").default_value("15.0").range(5.0, 30.0),
    FieldSpec::decimal("HITL_EBITDA_PROJECTION_THRESHOLD").default_value("10.0").range(5.0, 25.0),
    // Warehouse
    FieldSpec::text("SNOWFLAKE_ACCOUNT").required().min_length(1),
    FieldSpec::text("SNOWFLAKE_USER").required().min_length(1),
    FieldSpec::secret("SNOWFLAKE_PASSWORD").required(),
    FieldSpec::text("SNOWFLAKE_DATABASE").default_value("PE_ORGAIR"),
    FieldSpec::text("SNOWFLAKE_SCHEMA").default_value("PUBLIC"),
    FieldSpec::text("SNOWFLAKE_WAREHOUSE").required().min_length(1),
    FieldSpec::text("SNOWFLAKE_ROLE").default_value("PE_ORGAIR_ROLE"),
    // Object storage
    FieldSpec::secret("AWS_ACCESS_KEY_ID").required(),
    FieldSpec::secret("AWS_SECRET_ACCESS_KEY").required(),
    FieldSpec::text("AWS_REGION").default_value("us-east-1"),
    FieldSpec::text("S3_BUCKET").required().min_length(1),
    // Cache
    FieldSpec::text("REDIS_URL").default_value("redis://localhost:6379/0"),
    FieldSpec::integer("CACHE_TTL_SECTORS").default_value("86400").min(0.0),
    FieldSpec::integer("CACHE_TTL_SCORES").default_value("3600").min(0.0),
    // Scoring parameters
    FieldSpec::decimal("ALPHA_VR_WEIGHT").default_value("0.60").range(0.55, 0.70),
    FieldSpec::decimal("BETA_SYNERGY_WEIGHT").default_value("0.12").range(0.08, 0.20),
    FieldSpec::decimal("LAMBDA_PENALTY").default_value("0.25").range(0.0, 0.50),
    FieldSpec::decimal("DELTA_POSITION").default_value("0.15").range(0.10, 0.20),
    // Dimension weights
    FieldSpec::decimal("W_DATA_INFRA").default_value("0.18").range(0.0, 1.0),
    FieldSpec::decimal("W_AI_GOVERNANCE").default_value("0.15").range(0.0, 1.0),
    FieldSpec::decimal("W_TECH_STACK").default_value("0.15").range(0.0, 1.0),
    FieldSpec::decimal("W_TALENT").default_value("0.17").range(0.0, 1.0),
    FieldSpec::decimal("W_LEADERSHIP").default_value("0.13").range(0.0, 1.0),
    FieldSpec::decimal("W_USE_CASES").default_value("0.12").range(0.0, 1.0),
    FieldSpec::decimal("W_CULTURE").default_value("0.10").range(0.0, 1.0),
    // Task queue
    FieldSpec::text("CELERY_BROKER_URL").default_value("redis://localhost:6379/1"),
    FieldSpec::text("CELERY_RESULT_BACKEND").default_value("redis://localhost:6379/2"),
    // Observability
    FieldSpec::text("OTEL_EXPORTER_OTLP_ENDPOINT"),
    FieldSpec::text("OTEL_SERVICE_NAME").default_value("pe-orgair"),
];

/// The dimension weight group.
pub const DIMENSION_WEIGHT_GROUP: WeightGroup = WeightGroup {
    name: "dimension_weights",
    fields: DIMENSION_WEIGHTS,
    target: 1.0,
    tolerance: WEIGHT_TOLERANCE,
};

/// Stricter rules for production deployments.
pub const PRODUCTION_POLICY: ConditionalPolicy = ConditionalPolicy {
    discriminant: APP_ENV,
    active_when: "production",
    rules: &[
        PolicyRule::FlagDisabled {
            field: DEBUG,
            rule: RuleId::ProductionDebugDisabled,
        },
        PolicyRule::SecretMinLength {
            field: SECRET_KEY,
            min: PRODUCTION_SECRET_MIN_LENGTH,
            rule: RuleId::ProductionSecretLength,
        },
        PolicyRule::AnyCredential {
            fields: &[OPENAI_API_KEY, ANTHROPIC_API_KEY],
            rule: RuleId::ProductionLlmCredential,
        },
    ],
};

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

/// A validated schema: field table, weight groups and conditional policies.
#[derive(Debug, Clone)]
pub struct Schema {
    fields: Vec<FieldSpec>,
    patterns: Vec<Option<Regex>>,
    weight_groups: Vec<WeightGroup>,
    policies: Vec<ConditionalPolicy>,
}

impl Schema {
    /// Create a schema builder.
    #[must_use]
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    /// The platform settings schema.
    ///
    /// # Example
    ///
    /// ```
    /// use orgair_config::Schema;
    ///
    /// let schema = Schema::platform().unwrap();
    /// assert!(schema.field("app_env").is_some());
    /// ```
    pub fn platform() -> Result<Self, SchemaError> {
        Self::builder()
            .fields(PLATFORM_FIELDS.iter().copied())
            .weight_group(DIMENSION_WEIGHT_GROUP)
            .policy(PRODUCTION_POLICY)
            .build()
    }

    /// Validate and assemble a schema.
    pub fn new(
        fields: Vec<FieldSpec>,
        weight_groups: Vec<WeightGroup>,
        policies: Vec<ConditionalPolicy>,
    ) -> Result<Self, SchemaError> {
        let mut seen = HashSet::new();
        let mut patterns = Vec::with_capacity(fields.len());

        for spec in &fields {
            if !seen.insert(spec.name.to_ascii_uppercase()) {
                return Err(SchemaError::DuplicateField {
                    name: spec.name.to_string(),
                });
            }

            let compiled = spec
                .pattern
                .map(Regex::new)
                .transpose()
                .map_err(|e| SchemaError::InvalidPattern {
                    field: spec.name.to_string(),
                    reason: e.to_string(),
                })?;

            if let Presence::Default(raw) = spec.presence {
                if let Err(issues) = field::check(spec, compiled.as_ref(), Some(raw)) {
                    let reason = issues
                        .iter()
                        .map(|i| i.message.as_str())
                        .collect::<Vec<_>>()
                        .join("; ");
                    return Err(SchemaError::InvalidDefault {
                        field: spec.name.to_string(),
                        reason,
                    });
                }
            }

            patterns.push(compiled);
        }

        let schema = Self {
            fields,
            patterns,
            weight_groups,
            policies,
        };

        for group in &schema.weight_groups {
            let rule = format!("weight group {}", group.name);
            for name in group.fields {
                schema.expect_kind(&rule, name, FieldKind::Decimal)?;
            }
        }

        for policy in &schema.policies {
            let rule = format!("policy on {}={}", policy.discriminant, policy.active_when);
            schema.expect_kind(&rule, policy.discriminant, FieldKind::Text)?;
            for policy_rule in policy.rules {
                for (name, kind) in policy_rule.fields() {
                    schema.expect_kind(&rule, name, kind)?;
                }
            }
        }

        Ok(schema)
    }

    fn expect_kind(&self, rule: &str, name: &str, kind: FieldKind) -> Result<(), SchemaError> {
        let spec = self.field(name).ok_or_else(|| SchemaError::UnknownField {
            rule: rule.to_string(),
            field: name.to_string(),
        })?;
        if spec.kind != kind {
            return Err(SchemaError::WrongKind {
                rule: rule.to_string(),
                field: name.to_string(),
                expected: kind.as_str().to_string(),
            });
        }
        Ok(())
    }

    /// All field specs, in declaration order.
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Field names, in declaration order.
    pub fn field_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|f| f.name)
    }

    /// Look up a field by case-insensitive name.
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(name))
    }

    /// Field specs paired with their compiled patterns.
    pub(crate) fn checked_fields(&self) -> impl Iterator<Item = (&FieldSpec, Option<&Regex>)> {
        self.fields
            .iter()
            .zip(self.patterns.iter().map(Option::as_ref))
    }

    /// Weight groups.
    pub fn weight_groups(&self) -> &[WeightGroup] {
        &self.weight_groups
    }

    /// Conditional policies.
    pub fn policies(&self) -> &[ConditionalPolicy] {
        &self.policies
    }
}

/// Builder for [`Schema`].
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    fields: Vec<FieldSpec>,
    weight_groups: Vec<WeightGroup>,
    policies: Vec<ConditionalPolicy>,
}

impl SchemaBuilder {
    /// Add one field.
    #[must_use]
    pub fn field(mut self, spec: FieldSpec) -> Self {
        self.fields.push(spec);
        self
    }

    /// Add several fields.
    #[must_use]
    pub fn fields(mut self, specs: impl IntoIterator<Item = FieldSpec>) -> Self {
        self.fields.extend(specs);
        self
    }

    /// Add a weight group.
    #[must_use]
    pub fn weight_group(mut self, group: WeightGroup) -> Self {
        self.weight_groups.push(group);
        self
    }

    /// Add a conditional policy.
    #[must_use]
    pub fn policy(mut self, policy: ConditionalPolicy) -> Self {
        self.policies.push(policy);
        self
    }

    /// Validate and build the schema.
    pub fn build(self) -> Result<Schema, SchemaError> {
        Schema::new(self.fields, self.weight_groups, self.policies)
    }
}
