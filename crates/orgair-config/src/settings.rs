//! Validated, immutable settings.
//!
//! A [`Settings`] value only exists once every field, cross-field and
//! policy check has passed; the assembler is its sole constructor.

use std::fmt;
use std::str::FromStr;

use orgair_telemetry::{level_directive, LogConfig};
use serde::Serialize;

use crate::field::{FieldValue, FieldValues};
use crate::schema::{APP_ENV, DEBUG, DIMENSION_WEIGHTS, LOG_FORMAT, LOG_LEVEL};
use crate::secret::Secret;

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Local development.
    Development,
    /// Pre-production.
    Staging,
    /// Production; activates the stricter policy rules.
    Production,
}

impl Environment {
    /// The tag as written in configuration.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Staging => "staging",
            Self::Production => "production",
        }
    }

    /// Whether this is production.
    pub const fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "development" => Ok(Self::Development),
            "staging" => Ok(Self::Staging),
            "production" => Ok(Self::Production),
            other => Err(format!("unknown environment '{other}'")),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable set of validated configuration values.
///
/// Serializing a `Settings` renders secret fields as the mask.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Settings {
    values: FieldValues,
}

impl Settings {
    pub(crate) fn new(values: FieldValues) -> Self {
        Self { values }
    }

    /// Typed value of a field.
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.values.get(name)
    }

    /// Integer field.
    pub fn integer(&self, name: &str) -> Option<i64> {
        self.values.integer(name)
    }

    /// Decimal field.
    pub fn decimal(&self, name: &str) -> Option<f64> {
        self.values.decimal(name)
    }

    /// Boolean field.
    pub fn flag(&self, name: &str) -> Option<bool> {
        self.values.flag(name)
    }

    /// String field.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.values.text(name)
    }

    /// Secret field; `None` when the field is unset.
    pub fn secret(&self, name: &str) -> Option<&Secret> {
        self.values.secret(name)
    }

    /// All fields in schema order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &FieldValue)> {
        self.values.iter()
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether there are no fields.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Deployment environment, when the schema declares one.
    pub fn environment(&self) -> Option<Environment> {
        self.text(APP_ENV).and_then(|tag| tag.parse().ok())
    }

    /// Whether debug mode is on.
    pub fn debug(&self) -> bool {
        self.flag(DEBUG).unwrap_or(false)
    }

    /// The seven dimension weights, in declaration order.
    pub fn dimension_weights(&self) -> Vec<(&'static str, f64)> {
        DIMENSION_WEIGHTS
            .iter()
            .filter_map(|name| self.decimal(name).map(|w| (*name, w)))
            .collect()
    }

    /// Logging configuration derived from `LOG_LEVEL` and `LOG_FORMAT`.
    pub fn log_config(&self) -> LogConfig {
        let mut config = if self.environment().is_some_and(Environment::is_production) {
            LogConfig::production()
        } else {
            LogConfig::development()
        };

        if let Some(level) = self.text(LOG_LEVEL).and_then(level_directive) {
            config = config.with_level(level);
        }
        if let Some(format) = self.text(LOG_FORMAT) {
            config = config.with_json(format == "json");
        }
        if let Some(name) = self.text("OTEL_SERVICE_NAME") {
            config = config.with_service_name(name);
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SECRET_KEY;

    fn settings(env: &str, level: &str, format: &str) -> Settings {
        let mut values = FieldValues::new();
        values.insert(APP_ENV, FieldValue::Text(env.to_string()));
        values.insert(DEBUG, FieldValue::Flag(true));
        values.insert(LOG_LEVEL, FieldValue::Text(level.to_string()));
        values.insert(LOG_FORMAT, FieldValue::Text(format.to_string()));
        values.insert(SECRET_KEY, FieldValue::Secret(Secret::new("top-secret-value")));
        values.insert("W_DATA_INFRA", FieldValue::Decimal(0.18));
        values.insert("W_CULTURE", FieldValue::Decimal(0.10));
        Settings::new(values)
    }

    #[test]
    fn test_environment_parsing() {
        assert_eq!("production".parse::<Environment>(), Ok(Environment::Production));
        assert!("Production".parse::<Environment>().is_err());
        assert_eq!(Environment::Staging.to_string(), "staging");
    }

    #[test]
    fn test_domain_accessors() {
        let settings = settings("staging", "INFO", "json");
        assert_eq!(settings.environment(), Some(Environment::Staging));
        assert!(settings.debug());
        assert_eq!(
            settings.dimension_weights(),
            vec![("W_DATA_INFRA", 0.18), ("W_CULTURE", 0.10)]
        );
        assert_eq!(settings.secret(SECRET_KEY).map(Secret::len), Some(16));
    }

    #[test]
    fn test_log_config_mapping() {
        let config = settings("development", "WARNING", "console").log_config();
        assert_eq!(config.level, "warn");
        assert!(!config.json_format);

        let config = settings("production", "ERROR", "json").log_config();
        assert_eq!(config.level, "error");
        assert!(config.json_format);
    }

    #[test]
    fn test_serialization_masks_secrets() {
        let json = serde_json::to_string(&settings("development", "DEBUG", "json")).unwrap();
        assert!(!json.contains("top-secret-value"));
        assert!(json.contains(crate::MASK));
    }
}
