//! Startup configuration check for the PE Org-AI-R platform.
//!
//! `orgair-check` validates the ambient configuration (process environment
//! plus an optional `.env` file) and exits non-zero when it is invalid, so
//! deployments can gate on it. It also replays scenario catalogs against the
//! validator.
//!
//! # Example Usage
//!
//! ```bash
//! # Validate the current environment and ./.env
//! $ orgair-check validate
//!
//! # Validate a specific file, JSON report
//! $ orgair-check validate --env-file deploy/production.env --json
//!
//! # Run the built-in scenarios
//! $ orgair-check scenarios
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod cli;
pub mod commands;

pub use cli::{CliError, Command, ScenarioArgs, ValidateArgs};
pub use commands::{run_scenarios, run_validate};

/// Tool version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Exit code for a valid configuration.
pub const EXIT_VALID: i32 = 0;

/// Exit code for an invalid configuration or a scenario mismatch.
pub const EXIT_INVALID: i32 = 1;

/// Exit code for usage and load errors.
pub const EXIT_ERROR: i32 = 2;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_exit_codes_distinct() {
        assert_ne!(EXIT_VALID, EXIT_INVALID);
        assert_ne!(EXIT_INVALID, EXIT_ERROR);
    }
}
