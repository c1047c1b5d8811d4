//! Logging setup for the PE Org-AI-R configuration tooling.
//!
//! Library crates only emit events through `tracing` macros; binaries call
//! [`init_logging`] once at startup to install a subscriber. Output goes to
//! stderr so that reports printed on stdout stay machine-readable.
//!
//! # Example
//!
//! ```rust,ignore
//! use orgair_telemetry::{init_logging, LogConfig};
//!
//! init_logging(&LogConfig::development())?;
//! tracing::info!(scenario = "valid-development", "running scenario");
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod logging;

pub use error::TelemetryError;
pub use logging::{create_env_filter, init_logging, level_directive, LogConfig};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
