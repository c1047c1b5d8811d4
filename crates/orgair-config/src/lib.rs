//! Schema-driven configuration validation for the PE Org-AI-R platform.
//!
//! This crate loads application settings from layered key/value sources and
//! validates them against a static schema:
//! - Per-field type coercion and constraints (bounds, lengths, patterns,
//!   enumerations)
//! - Cross-field invariants (the dimension weights sum to 1.0)
//! - Environment-conditional policy (stricter rules in production)
//! - Secret values that never render in text, `Debug` or serialized output
//!
//! Validation never stops at the first problem. An [`Assembler`] run yields
//! either [`ValidationOutcome::Valid`] with immutable [`Settings`], or
//! [`ValidationOutcome::Invalid`] with every [`ValidationIssue`] found.
//!
//! # Example
//!
//! ```no_run
//! use orgair_config::{Assembler, SourceStack, ValidationReport};
//!
//! # fn main() -> Result<(), orgair_config::ConfigError> {
//! let assembler = Assembler::platform()?;
//! let sources = SourceStack::new()
//!     .with_env()
//!     .with_optional_env_file(".env")?;
//!
//! let outcome = assembler.assemble(&sources);
//! print!("{}", ValidationReport::from(&outcome).render_text());
//! # Ok(())
//! # }
//! ```
//!
//! # Source Precedence
//!
//! Explicit overrides win over the process environment, which wins over
//! key/value files. Fields no source supplies fall back to schema defaults.
//!
//! # Scenarios
//!
//! [`ScenarioRunner`] replays named override sets against the assembler
//! without leaving any trace in the process environment. See
//! [`ScenarioCatalog::builtin`] for the shipped set.

#![warn(missing_docs)]

mod assembler;
mod cache;
pub mod cross_field;
mod error;
mod field;
mod issue;
pub mod policy;
mod report;
mod scenario;
pub mod schema;
mod secret;
mod settings;
mod source;

pub use assembler::{Assembler, Stage, ValidationOutcome};
pub use cache::SettingsCache;
pub use error::{ConfigError, SchemaError};
pub use field::{check as check_field, FieldValue, FieldValues};
pub use issue::{IssueCategory, RuleId, ValidationIssue, CROSS_FIELD, POLICY};
pub use report::{ScenarioReport, Status, ValidationReport};
pub use scenario::{development_baseline, Scenario, ScenarioCatalog, ScenarioRunner, ScopedEnv};
pub use schema::{
    ConditionalPolicy, FieldKind, FieldSpec, PolicyRule, Presence, Schema, SchemaBuilder,
    WeightGroup,
};
pub use secret::{Secret, MASK};
pub use settings::{Environment, Settings};
pub use source::{
    EnvFileSource, EnvironmentSource, MapSource, Precedence, Resolved, ResolvedValues,
    SourceStack, ValueSource,
};
