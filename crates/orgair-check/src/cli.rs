//! Command-line parsing.

use std::path::PathBuf;

use thiserror::Error;

/// Argument errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CliError {
    /// An argument the command does not know.
    #[error("Unknown argument: {0}")]
    UnknownArgument(String),

    /// An option given without its value.
    #[error("Missing value for {0}")]
    MissingValue(String),
}

/// Options of `validate`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidateArgs {
    /// Key/value file to read instead of `./.env`.
    pub env_file: Option<PathBuf>,
    /// Environment variable name prefix.
    pub prefix: Option<String>,
    /// Emit the JSON report.
    pub json: bool,
}

/// Options of `scenarios`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScenarioArgs {
    /// Catalog file; the built-in catalog when absent.
    pub file: Option<PathBuf>,
    /// Run only this scenario.
    pub name: Option<String>,
    /// Emit JSON reports.
    pub json: bool,
}

/// A parsed invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Validate the ambient configuration.
    Validate(ValidateArgs),
    /// Run a scenario catalog.
    Scenarios(ScenarioArgs),
    /// Print usage.
    Help,
    /// Print the version.
    Version,
}

impl Command {
    /// Parse arguments, excluding the program name.
    ///
    /// Without a subcommand, `validate` is assumed.
    pub fn parse<I>(args: I) -> Result<Self, CliError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut args = args.into_iter().peekable();

        match args.peek().map(String::as_str) {
            Some("scenarios") => {
                args.next();
                Self::parse_scenarios(args)
            }
            Some("validate") => {
                args.next();
                Self::parse_validate(args)
            }
            _ => Self::parse_validate(args),
        }
    }

    fn parse_validate(mut args: impl Iterator<Item = String>) -> Result<Self, CliError> {
        let mut parsed = ValidateArgs::default();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--env-file" | "-e" => {
                    parsed.env_file = Some(PathBuf::from(value(&mut args, &arg)?));
                }
                "--prefix" | "-p" => {
                    parsed.prefix = Some(value(&mut args, &arg)?);
                }
                "--json" => parsed.json = true,
                "--help" | "-h" => return Ok(Self::Help),
                "--version" | "-v" => return Ok(Self::Version),
                other => return Err(CliError::UnknownArgument(other.to_string())),
            }
        }

        Ok(Self::Validate(parsed))
    }

    fn parse_scenarios(mut args: impl Iterator<Item = String>) -> Result<Self, CliError> {
        let mut parsed = ScenarioArgs::default();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--file" | "-f" => {
                    parsed.file = Some(PathBuf::from(value(&mut args, &arg)?));
                }
                "--name" | "-n" => {
                    parsed.name = Some(value(&mut args, &arg)?);
                }
                "--json" => parsed.json = true,
                "--help" | "-h" => return Ok(Self::Help),
                other => return Err(CliError::UnknownArgument(other.to_string())),
            }
        }

        Ok(Self::Scenarios(parsed))
    }
}

fn value(args: &mut impl Iterator<Item = String>, flag: &str) -> Result<String, CliError> {
    args.next()
        .ok_or_else(|| CliError::MissingValue(flag.to_string()))
}

/// Usage text.
pub const HELP: &str = r"orgair-check - PE Org-AI-R configuration validator

USAGE:
    orgair-check [validate] [OPTIONS]
    orgair-check scenarios [OPTIONS]

VALIDATE OPTIONS:
    -e, --env-file <PATH>    Key/value file to read (default: ./.env if present)
    -p, --prefix <PREFIX>    Only read environment variables named PREFIX + FIELD
        --json               Print the JSON report

SCENARIO OPTIONS:
    -f, --file <PATH>        Scenario catalog (TOML or JSON; default: built-in)
    -n, --name <NAME>        Run only the named scenario
        --json               Print JSON reports

OPTIONS:
    -h, --help               Print help information
    -v, --version            Print version information

EXIT STATUS:
    0    configuration valid / every scenario matched its expectation
    1    configuration invalid / a scenario did not match
    2    usage or load error

ENVIRONMENT VARIABLES:
    RUST_LOG    Log filter for diagnostics on stderr (default: warn)
";

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Command, CliError> {
        Command::parse(args.iter().map(|s| (*s).to_string()))
    }

    #[test]
    fn test_no_arguments_validates() {
        assert_eq!(parse(&[]), Ok(Command::Validate(ValidateArgs::default())));
    }

    #[test]
    fn test_validate_options() {
        let command = parse(&["validate", "--env-file", "prod.env", "--prefix", "ORGAIR_", "--json"]);
        assert_eq!(
            command,
            Ok(Command::Validate(ValidateArgs {
                env_file: Some(PathBuf::from("prod.env")),
                prefix: Some("ORGAIR_".to_string()),
                json: true,
            }))
        );
    }

    #[test]
    fn test_implicit_validate_options() {
        let command = parse(&["--json"]);
        assert_eq!(
            command,
            Ok(Command::Validate(ValidateArgs {
                json: true,
                ..ValidateArgs::default()
            }))
        );
    }

    #[test]
    fn test_scenario_options() {
        let command = parse(&["scenarios", "-f", "catalog.toml", "-n", "rate-limit-1001"]);
        assert_eq!(
            command,
            Ok(Command::Scenarios(ScenarioArgs {
                file: Some(PathBuf::from("catalog.toml")),
                name: Some("rate-limit-1001".to_string()),
                json: false,
            }))
        );
    }

    #[test]
    fn test_missing_value() {
        assert_eq!(
            parse(&["validate", "--env-file"]),
            Err(CliError::MissingValue("--env-file".to_string()))
        );
    }

    #[test]
    fn test_unknown_argument() {
        assert_eq!(
            parse(&["scenarios", "--verbose"]),
            Err(CliError::UnknownArgument("--verbose".to_string()))
        );
    }

    #[test]
    fn test_help_and_version() {
        assert_eq!(parse(&["--help"]), Ok(Command::Help));
        assert_eq!(parse(&["scenarios", "-h"]), Ok(Command::Help));
        assert_eq!(parse(&["-v"]), Ok(Command::Version));
    }
}
