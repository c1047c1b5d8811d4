//! Scenario simulation.
//!
//! A [`Scenario`] is a named set of raw overrides. [`ScenarioRunner`] applies
//! one to the process environment through a [`ScopedEnv`] guard, runs the
//! assembler exactly once, and restores the environment when the guard
//! drops, including on panic. Runs are serialized through a process-wide
//! lock, so scenarios never observe each other's overrides.
//!
//! Catalog files are TOML or JSON:
//!
//! ```toml
//! [scenarios.production-debug]
//! description = "debug left on in production"
//! expect = "invalid"
//!
//! [scenarios.production-debug.values]
//! APP_ENV = "production"
//! DEBUG = true
//! ```

use std::collections::HashSet;
use std::env;
use std::ffi::OsString;
use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

use indexmap::IndexMap;
use parking_lot::{const_mutex, Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::assembler::Assembler;
use crate::error::ConfigError;
use crate::report::{ScenarioReport, Status, ValidationReport};
use crate::schema::Schema;
use crate::source::{EnvironmentSource, MapSource, Precedence, SourceStack};

static ENV_LOCK: Mutex<()> = const_mutex(());

/// Default weights, in `DIMENSION_WEIGHTS` order.
const DEFAULT_WEIGHTS: [(&str, &str); 7] = [
    ("W_DATA_INFRA", "0.18"),
    ("W_AI_GOVERNANCE", "0.15"),
    ("W_TECH_STACK", "0.15"),
    ("W_TALENT", "0.17"),
    ("W_LEADERSHIP", "0.13"),
    ("W_USE_CASES", "0.12"),
    ("W_CULTURE", "0.10"),
];

/// Values the simulator supplies when a scenario does not.
///
/// Covers the required warehouse and storage credentials plus a
/// development secret key.
pub fn development_baseline() -> MapSource {
    MapSource::from_pairs(
        "baseline",
        [
            ("SECRET_KEY", "default_secret_for_dev_env_testing_0123456789"),
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

/// A named, immutable set of raw overrides.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct Scenario {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    expect: Option<Status>,
    values: IndexMap<String, String>,
}

impl Scenario {
    /// Create a scenario.
    ///
    /// Keys are uppercased.
    ///
    /// # Errors
    ///
    /// Returns an error if a key is empty or contains `=` or NUL, or a value
    /// contains NUL; such pairs cannot be placed in the environment.
    pub fn new<K, V>(
        name: impl Into<String>,
        values: impl IntoIterator<Item = (K, V)>,
    ) -> Result<Self, ConfigError>
    where
        K: AsRef<str>,
        V: Into<String>,
    {
        let name = name.into();
        let mut checked = IndexMap::new();
        for (key, value) in values {
            let key = key.as_ref().to_ascii_uppercase();
            let value = value.into();
            if let Err(reason) = settable(&key, &value) {
                return Err(ConfigError::invalid_scenario(name, format!("{key}: {reason}")));
            }
            checked.insert(key, value);
        }

        Ok(Self {
            name,
            description: None,
            expect: None,
            values: checked,
        })
    }

    /// Attach a description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Declare the expected status.
    #[must_use]
    pub fn expecting(mut self, status: Status) -> Self {
        self.expect = Some(status);
        self
    }

    /// Scenario name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Description, if any.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Expected status, if declared.
    pub fn expect(&self) -> Option<Status> {
        self.expect
    }

    /// Overrides in declaration order.
    pub fn values(&self) -> &IndexMap<String, String> {
        &self.values
    }
}

impl fmt::Debug for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scenario")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("expect", &self.expect)
            .field("keys", &self.values.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Whether `key=value` can be placed in the process environment.
fn settable(key: &str, value: &str) -> Result<(), &'static str> {
    if key.is_empty() {
        Err("empty variable name")
    } else if key.contains('=') {
        Err("variable name contains '='")
    } else if key.contains('\0') {
        Err("variable name contains a NUL byte")
    } else if value.contains('\0') {
        Err("value contains a NUL byte")
    } else {
        Ok(())
    }
}

/// A scalar as written in a catalog file.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawScalar {
    Text(String),
    Integer(i64),
    Decimal(f64),
    Flag(bool),
}

impl RawScalar {
    fn into_raw(self) -> String {
        match self {
            Self::Text(s) => s,
            Self::Integer(v) => v.to_string(),
            Self::Decimal(v) => v.to_string(),
            Self::Flag(v) => v.to_string(),
        }
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ScenarioEntry {
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    expect: Option<Status>,
    #[serde(default)]
    values: IndexMap<String, RawScalar>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct CatalogFile {
    #[serde(default)]
    scenarios: IndexMap<String, ScenarioEntry>,
}

/// An ordered collection of scenarios.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScenarioCatalog {
    scenarios: Vec<Scenario>,
}

impl ScenarioCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in scenarios.
    ///
    /// # Errors
    ///
    /// Never fails for the built-in definitions; the `Result` comes from
    /// [`Scenario::new`].
    pub fn builtin() -> Result<Self, ConfigError> {
        let strong_secret = "prod_secure_key_12345678901234567890123456789012";
        let dev_secret = "dev_key_for_testing_12345678901234567890";

        let with_weights = |pairs: &[(&'static str, &'static str)]| {
            let mut values: Vec<(&str, &str)> = pairs.to_vec();
            values.extend(DEFAULT_WEIGHTS);
            values
        };

        let scenarios = vec![
            Scenario::new(
                "valid-development",
                with_weights(&[
                    ("APP_ENV", "development"),
                    ("DEBUG", "True"),
                    ("SECRET_KEY", dev_secret),
                    ("OPENAI_API_KEY", "sk-dev_test_key_xxxx"),
                    ("RATE_LIMIT_PER_MINUTE", "100"),
                    ("DAILY_COST_BUDGET_USD", "750.0"),
                    ("COST_ALERT_THRESHOLD_PCT", "0.85"),
                    ("HITL_SCORE_CHANGE_THRESHOLD", "18.0"),
                    ("HITL_EBITDA_PROJECTION_THRESHOLD", "12.5"),
                ]),
            )?
            .with_description("development defaults with debug on and an OpenAI key")
            .expecting(Status::Valid),
            Scenario::new(
                "valid-production",
                with_weights(&[
                    ("APP_ENV", "production"),
                    ("DEBUG", "False"),
                    ("SECRET_KEY", strong_secret),
                    ("ANTHROPIC_API_KEY", "sk-ant-REDACTED"),
                    ("RATE_LIMIT_PER_MINUTE", "500"),
                    ("DAILY_COST_BUDGET_USD", "10000.0"),
                    ("COST_ALERT_THRESHOLD_PCT", "0.9"),
                    ("HITL_SCORE_CHANGE_THRESHOLD", "25.0"),
                    ("HITL_EBITDA_PROJECTION_THRESHOLD", "20.0"),
                ]),
            )?
            .with_description("hardened production settings with an Anthropic key")
            .expecting(Status::Valid),
            Scenario::new(
                "production-debug-enabled",
                with_weights(&[
                    ("APP_ENV", "production"),
                    ("DEBUG", "True"),
                    ("SECRET_KEY", strong_secret),
                    ("OPENAI_API_KEY", "sk-xxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxx"),
                    ("RATE_LIMIT_PER_MINUTE", "60"),
                ]),
            )?
            .with_description("debug mode left on in production")
            .expecting(Status::Invalid),
            Scenario::new(
                "weights-not-normalized",
                [
                    ("APP_ENV", "development"),
                    ("DEBUG", "False"),
                    ("SECRET_KEY", dev_secret),
                    ("W_DATA_INFRA", "0.20"),
                    ("W_AI_GOVERNANCE", "0.15"),
                    ("W_TECH_STACK", "0.15"),
                    ("W_TALENT", "0.17"),
                    ("W_LEADERSHIP", "0.13"),
                    ("W_USE_CASES", "0.12"),
                    ("W_CULTURE", "0.10"),
                    ("RATE_LIMIT_PER_MINUTE", "60"),
                ],
            )?
            .with_description("dimension weights summing to 1.02")
            .expecting(Status::Invalid),
            Scenario::new(
                "rate-limit-out-of-range",
                with_weights(&[
                    ("APP_ENV", "development"),
                    ("DEBUG", "False"),
                    ("SECRET_KEY", dev_secret),
                    ("RATE_LIMIT_PER_MINUTE", "1200"),
                ]),
            )?
            .with_description("API rate limit above its maximum of 1000")
            .expecting(Status::Invalid),
            Scenario::new(
                "development-debug-no-credentials",
                [
                    ("APP_ENV", "development"),
                    ("DEBUG", "true"),
                    ("OPENAI_API_KEY", ""),
                    ("ANTHROPIC_API_KEY", ""),
                ],
            )?
            .with_description("development tolerates debug and missing LLM keys")
            .expecting(Status::Valid),
            Scenario::new(
                "production-debug-on",
                [
                    ("APP_ENV", "production"),
                    ("DEBUG", "true"),
                    ("SECRET_KEY", strong_secret),
                    ("OPENAI_API_KEY", "sk-live-0123456789"),
                ],
            )?
            .with_description("only the debug rule is violated")
            .expecting(Status::Invalid),
            Scenario::new(
                "production-short-secret",
                [
                    ("APP_ENV", "production"),
                    ("DEBUG", "false"),
                    ("SECRET_KEY", "0123456789"),
                    ("OPENAI_API_KEY", "sk-live-0123456789"),
                ],
            )?
            .with_description("only the secret length rule is violated")
            .expecting(Status::Invalid),
            Scenario::new(
                "production-no-credentials",
                [
                    ("APP_ENV", "production"),
                    ("DEBUG", "false"),
                    ("SECRET_KEY", "0123456789012345678901234567890123456789"),
                    ("OPENAI_API_KEY", ""),
                    ("ANTHROPIC_API_KEY", ""),
                ],
            )?
            .with_description("only the LLM credential rule is violated")
            .expecting(Status::Invalid),
            Scenario::new(
                "weights-sum-1.05",
                [
                    ("W_DATA_INFRA", "0.23"),
                    ("W_AI_GOVERNANCE", "0.15"),
                    ("W_TECH_STACK", "0.15"),
                    ("W_TALENT", "0.17"),
                    ("W_LEADERSHIP", "0.13"),
                    ("W_USE_CASES", "0.12"),
                    ("W_CULTURE", "0.10"),
                ],
            )?
            .with_description("one aggregate weight-sum issue")
            .expecting(Status::Invalid),
            Scenario::new("rate-limit-1001", [("RATE_LIMIT_PER_MINUTE", "1001")])?
                .with_description("rate limit one above its upper bound")
                .expecting(Status::Invalid),
        ];

        Ok(Self { scenarios })
    }

    /// Load a catalog from a `.toml` or `.json` file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, has another extension,
    /// or does not parse.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);

        let content = fs::read_to_string(path).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                ConfigError::file_not_found(path)
            } else {
                ConfigError::read_error(path, e)
            }
        })?;

        match extension.as_deref() {
            Some("toml") => Self::from_toml_str(&content),
            Some("json") => Self::from_json_str(&content),
            _ => Err(ConfigError::UnsupportedFormat {
                path: path.to_path_buf(),
            }),
        }
    }

    /// Parse a TOML catalog.
    ///
    /// # Errors
    ///
    /// Returns an error on malformed TOML or an invalid scenario.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let file: CatalogFile = toml::from_str(content)?;
        Self::from_entries(file)
    }

    /// Parse a JSON catalog.
    ///
    /// # Errors
    ///
    /// Returns an error on malformed JSON or an invalid scenario.
    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        let file: CatalogFile = serde_json::from_str(content)?;
        Self::from_entries(file)
    }

    fn from_entries(file: CatalogFile) -> Result<Self, ConfigError> {
        let mut catalog = Self::new();
        for (name, entry) in file.scenarios {
            let values = entry.values.into_iter().map(|(k, v)| (k, v.into_raw()));
            let mut scenario = Scenario::new(name, values)?;
            scenario.description = entry.description;
            scenario.expect = entry.expect;
            catalog.push(scenario);
        }
        Ok(catalog)
    }

    /// Append a scenario.
    pub fn push(&mut self, scenario: Scenario) {
        self.scenarios.push(scenario);
    }

    /// Look up a scenario by name.
    pub fn get(&self, name: &str) -> Option<&Scenario> {
        self.scenarios.iter().find(|s| s.name == name)
    }

    /// Scenarios in order.
    pub fn iter(&self) -> std::slice::Iter<'_, Scenario> {
        self.scenarios.iter()
    }

    /// Number of scenarios.
    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }
}

impl<'a> IntoIterator for &'a ScenarioCatalog {
    type Item = &'a Scenario;
    type IntoIter = std::slice::Iter<'a, Scenario>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Temporary environment overrides, reverted on drop.
///
/// While the guard lives, every variable whose name matches a schema field
/// or an override key (case-insensitively) is removed and the overrides are
/// set. Dropping the guard removes the overrides and puts the removed
/// variables back. The guard holds a process-wide lock for its lifetime.
pub struct ScopedEnv {
    saved: Vec<(OsString, OsString)>,
    applied: Vec<String>,
    _lock: MutexGuard<'static, ()>,
}

impl ScopedEnv {
    /// Clear schema variables and apply `overrides`.
    ///
    /// # Errors
    ///
    /// Returns an error, leaving the environment untouched, if any key is
    /// empty or contains `=` or NUL, or any value contains NUL.
    pub fn apply(schema: &Schema, overrides: &IndexMap<String, String>) -> Result<Self, ConfigError> {
        for (key, value) in overrides {
            settable(key, value).map_err(|reason| ConfigError::invalid_variable(key, reason))?;
        }
        Ok(Self::install(schema, overrides))
    }

    /// Apply overrides already known to be settable.
    fn install(schema: &Schema, overrides: &IndexMap<String, String>) -> Self {
        let names: HashSet<String> = schema
            .field_names()
            .map(str::to_ascii_uppercase)
            .chain(overrides.keys().map(|k| k.to_ascii_uppercase()))
            .collect();

        // Every mutation is recorded on the guard before the next one, so an
        // unwind at any point still reverts what was done.
        let mut guard = Self {
            saved: Vec::new(),
            applied: Vec::with_capacity(overrides.len()),
            _lock: ENV_LOCK.lock(),
        };

        let present: Vec<(OsString, OsString)> = env::vars_os()
            .filter(|(key, _)| {
                key.to_str()
                    .is_some_and(|k| names.contains(&k.to_ascii_uppercase()))
            })
            .collect();

        for (key, value) in present {
            env::remove_var(&key);
            guard.saved.push((key, value));
        }

        for (key, value) in overrides {
            env::set_var(key, value);
            guard.applied.push(key.clone());
        }

        debug!(
            cleared = guard.saved.len(),
            applied = guard.applied.len(),
            "scoped environment applied"
        );
        guard
    }
}

impl fmt::Debug for ScopedEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedEnv")
            .field("saved", &self.saved.iter().map(|(k, _)| k).collect::<Vec<_>>())
            .field("applied", &self.applied)
            .finish_non_exhaustive()
    }
}

impl Drop for ScopedEnv {
    fn drop(&mut self) {
        for key in &self.applied {
            env::remove_var(key);
        }
        for (key, value) in &self.saved {
            env::set_var(key, value);
        }
        debug!(restored = self.saved.len(), "scoped environment reverted");
    }
}

/// Runs scenarios through an [`Assembler`].
#[derive(Debug)]
pub struct ScenarioRunner {
    assembler: Assembler,
    baseline: MapSource,
}

impl ScenarioRunner {
    /// Create a runner with the development baseline.
    pub fn new(assembler: Assembler) -> Self {
        Self::with_baseline(assembler, development_baseline())
    }

    /// Create a runner with a custom baseline.
    pub fn with_baseline(assembler: Assembler, baseline: MapSource) -> Self {
        Self {
            assembler,
            baseline,
        }
    }

    /// The assembler in use.
    pub fn assembler(&self) -> &Assembler {
        &self.assembler
    }

    /// Run one scenario.
    pub fn run(&self, scenario: &Scenario) -> ScenarioReport {
        info!(scenario = scenario.name(), overrides = scenario.values().len(), "running scenario");

        let outcome = {
            let _env = ScopedEnv::install(self.assembler.schema(), scenario.values());
            let sources = SourceStack::new()
                .with_source(Precedence::Environment, EnvironmentSource::new())
                .with_source(Precedence::File, self.baseline.clone());
            self.assembler.assemble(&sources)
        };

        let report = ScenarioReport {
            scenario: scenario.name().to_string(),
            expect: scenario.expect(),
            report: ValidationReport::from_outcome(&outcome),
        };

        if !report.matches_expectation() {
            warn!(
                scenario = scenario.name(),
                status = %report.report.status,
                "scenario outcome does not match expectation"
            );
        }
        report
    }

    /// Run every scenario of a catalog, in order.
    pub fn run_all(&self, catalog: &ScenarioCatalog) -> Vec<ScenarioReport> {
        catalog.iter().map(|scenario| self.run(scenario)).collect()
    }
}
