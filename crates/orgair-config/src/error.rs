//! Configuration error types.
//!
//! These errors describe failures to *load* configuration input (files,
//! scenario catalogs) and malformed schemas. Problems with the configuration
//! values themselves are never errors: they are reported as
//! [`ValidationIssue`](crate::ValidationIssue)s inside an invalid
//! [`ValidationOutcome`](crate::ValidationOutcome).

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading configuration sources.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file not found.
    #[error("configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// Failed to read configuration file.
    #[error("failed to read configuration file: {path}")]
    ReadError {
        /// Path to the file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A key/value environment file could not be parsed.
    #[error("failed to parse environment file {path}: {reason}")]
    EnvFileError {
        /// Path to the file.
        path: PathBuf,
        /// Explanation of the parsing error.
        reason: String,
    },

    /// TOML parsing error.
    #[error("failed to parse TOML configuration: {0}")]
    TomlError(#[from] toml::de::Error),

    /// JSON parsing error.
    #[error("failed to parse JSON configuration: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Unsupported file format for a scenario catalog.
    #[error("unsupported configuration file format: {path}")]
    UnsupportedFormat {
        /// Path to the file.
        path: PathBuf,
    },

    /// A scenario definition cannot be applied.
    #[error("invalid scenario '{name}': {reason}")]
    InvalidScenario {
        /// Scenario name.
        name: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A key/value pair cannot be placed in the process environment.
    #[error("cannot set environment variable '{key}': {reason}")]
    InvalidVariable {
        /// Variable name as given.
        key: String,
        /// What is wrong with it.
        reason: String,
    },

    /// The schema itself is malformed.
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

impl ConfigError {
    /// Create a new file not found error.
    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    /// Create a new read error.
    pub fn read_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ReadError {
            path: path.into(),
            source,
        }
    }

    /// Create a new environment file parse error.
    pub fn env_file_error(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::EnvFileError {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a new invalid scenario error.
    pub fn invalid_scenario(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidScenario {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create a new invalid environment variable error.
    pub fn invalid_variable(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidVariable {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

/// A programming error in a schema definition.
///
/// A malformed schema aborts initialisation; it is never reported through a
/// validation outcome.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// Two field specs share a (case-insensitive) name.
    #[error("duplicate field name in schema: {name}")]
    DuplicateField {
        /// The repeated name.
        name: String,
    },

    /// A rule references a field the schema does not declare.
    #[error("{rule} references unknown field {field}")]
    UnknownField {
        /// The rule holding the reference.
        rule: String,
        /// The missing field name.
        field: String,
    },

    /// A rule references a field of the wrong kind.
    #[error("{rule} requires {field} to be a {expected} field")]
    WrongKind {
        /// The rule holding the reference.
        rule: String,
        /// The offending field name.
        field: String,
        /// The kind the rule expects.
        expected: String,
    },

    /// A field's pattern does not compile.
    #[error("invalid pattern for {field}: {reason}")]
    InvalidPattern {
        /// The field carrying the pattern.
        field: String,
        /// Compilation error.
        reason: String,
    },

    /// A field's compiled-in default violates its own constraints.
    #[error("default value for {field} is invalid: {reason}")]
    InvalidDefault {
        /// The field carrying the default.
        field: String,
        /// Why the default was rejected.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_not_found_error() {
        let err = ConfigError::file_not_found("/path/to/.env");
        assert!(err.to_string().contains("/path/to/.env"));
    }

    #[test]
    fn test_env_file_error() {
        let err = ConfigError::env_file_error(".env", "line 3: unterminated quote");
        assert!(err.to_string().contains(".env"));
        assert!(err.to_string().contains("unterminated quote"));
    }

    #[test]
    fn test_invalid_scenario_error() {
        let err = ConfigError::invalid_scenario("broken", "empty variable name");
        assert_eq!(err.to_string(), "invalid scenario 'broken': empty variable name");
    }

    #[test]
    fn test_invalid_variable_error() {
        let err = ConfigError::invalid_variable("A=B", "name contains '='");
        assert_eq!(
            err.to_string(),
            "cannot set environment variable 'A=B': name contains '='"
        );
    }

    #[test]
    fn test_schema_error_is_transparent() {
        let err: ConfigError = SchemaError::DuplicateField {
            name: "DEBUG".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "duplicate field name in schema: DEBUG");
    }

    #[test]
    fn test_wrong_kind_error() {
        let err = SchemaError::WrongKind {
            rule: "weight group dimension_weights".to_string(),
            field: "APP_NAME".to_string(),
            expected: "decimal".to_string(),
        };
        assert!(err.to_string().contains("APP_NAME"));
        assert!(err.to_string().contains("decimal"));
    }
}
