//! Command implementations.
//!
//! Reports go to `out`; the issue list of an invalid configuration goes to
//! `diag`, the diagnostic stream.

use std::io::Write;

use anyhow::{bail, Context, Result};
use tracing::info;

use orgair_config::{
    Assembler, ScenarioCatalog, ScenarioReport, ScenarioRunner, SourceStack, ValidationReport,
};

use crate::cli::{ScenarioArgs, ValidateArgs};

const DEFAULT_ENV_FILE: &str = ".env";

/// Validate the ambient configuration.
///
/// Returns whether it is valid.
pub fn run_validate(args: &ValidateArgs, out: &mut impl Write, diag: &mut impl Write) -> Result<bool> {
    let assembler = Assembler::platform().context("platform schema is malformed")?;

    let sources = match &args.prefix {
        Some(prefix) => SourceStack::new().with_env_prefix(prefix),
        None => SourceStack::new().with_env(),
    };
    let sources = match &args.env_file {
        Some(path) => sources
            .with_env_file(path)
            .with_context(|| format!("cannot load {}", path.display()))?,
        None => sources.with_optional_env_file(DEFAULT_ENV_FILE)?,
    };
    info!(sources = ?sources.names(), "validating configuration");

    let outcome = assembler.assemble(&sources);
    let report = ValidationReport::from(&outcome);
    let rendered = if args.json {
        let mut json = report.to_json()?;
        json.push('\n');
        json
    } else {
        report.render_text()
    };

    if report.is_valid() {
        out.write_all(rendered.as_bytes())?;
    } else {
        diag.write_all(rendered.as_bytes())?;
    }
    Ok(report.is_valid())
}

/// Run a scenario catalog.
///
/// Returns whether every scenario matched its declared expectation.
pub fn run_scenarios(args: &ScenarioArgs, out: &mut impl Write) -> Result<bool> {
    let catalog = match &args.file {
        Some(path) => ScenarioCatalog::from_file(path)
            .with_context(|| format!("cannot load scenario catalog {}", path.display()))?,
        None => ScenarioCatalog::builtin()?,
    };

    let runner = ScenarioRunner::new(Assembler::platform().context("platform schema is malformed")?);

    let reports: Vec<ScenarioReport> = match &args.name {
        Some(name) => match catalog.get(name) {
            Some(scenario) => vec![runner.run(scenario)],
            None => bail!("no scenario named '{name}'"),
        },
        None => runner.run_all(&catalog),
    };

    if args.json {
        serde_json::to_writer_pretty(&mut *out, &reports)?;
        writeln!(out)?;
    } else {
        for report in &reports {
            writeln!(out, "{}", report.render_text())?;
        }
    }

    let mismatches = reports.iter().filter(|r| !r.matches_expectation()).count();
    info!(scenarios = reports.len(), mismatches, "scenario run complete");
    Ok(mismatches == 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const REQUIRED: &str = "\
SECRET_KEY=file_secret_key_0123456789abcdef0123
SNOWFLAKE_ACCOUNT=acct
SNOWFLAKE_USER=user
SNOWFLAKE_PASSWORD=file-password
SNOWFLAKE_WAREHOUSE=wh
AWS_ACCESS_KEY_ID=id
AWS_SECRET_ACCESS_KEY=secret
S3_BUCKET=bucket
";

    // A prefix nothing in the test environment uses, so only the file counts.
    const ISOLATED_PREFIX: &str = "ORGAIR_CHECK_UNIT_TEST_";

    fn validate(content: &str, json: bool) -> (bool, String, String) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.env");
        fs::write(&path, content).unwrap();

        let args = ValidateArgs {
            env_file: Some(path),
            prefix: Some(ISOLATED_PREFIX.to_string()),
            json,
        };
        let mut out = Vec::new();
        let mut diag = Vec::new();
        let valid = run_validate(&args, &mut out, &mut diag).unwrap();
        (
            valid,
            String::from_utf8(out).unwrap(),
            String::from_utf8(diag).unwrap(),
        )
    }

    #[test]
    fn test_validate_valid_file() {
        let (valid, out, diag) = validate(REQUIRED, false);
        assert!(valid);
        assert!(out.starts_with("status: valid"));
        assert!(diag.is_empty());
        assert!(!out.contains("file-password"));
    }

    #[test]
    fn test_validate_invalid_file_reports_on_diag() {
        let content = format!("{REQUIRED}RATE_LIMIT_PER_MINUTE=1001\n");
        let (valid, out, diag) = validate(&content, false);
        assert!(!valid);
        assert!(out.is_empty());
        assert!(diag.contains("- RATE_LIMIT_PER_MINUTE [upper_bound]:"));
    }

    #[test]
    fn test_validate_json_report() {
        let content = format!("{REQUIRED}APP_ENV=qa\n");
        let (valid, _, diag) = validate(&content, true);
        assert!(!valid);

        let report: serde_json::Value = serde_json::from_str(&diag).unwrap();
        assert_eq!(report["status"], "invalid");
        assert_eq!(report["issues"][0]["field"], "APP_ENV");
        assert_eq!(report["issues"][0]["rule"], "enumeration");
    }

    #[test]
    fn test_validate_missing_env_file_is_error() {
        let args = ValidateArgs {
            env_file: Some("/nonexistent/orgair/settings.env".into()),
            prefix: Some(ISOLATED_PREFIX.to_string()),
            json: false,
        };
        let result = run_validate(&args, &mut Vec::new(), &mut Vec::new());
        assert!(result.is_err());
    }

    #[test]
    fn test_single_builtin_scenario() {
        let args = ScenarioArgs {
            name: Some("rate-limit-1001".to_string()),
            ..ScenarioArgs::default()
        };
        let mut out = Vec::new();
        assert!(run_scenarios(&args, &mut out).unwrap());

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("--- rate-limit-1001 ---"));
        assert!(text.contains("RATE_LIMIT_PER_MINUTE [upper_bound]"));
        assert!(text.contains("expected: invalid [ok]"));
    }

    #[test]
    fn test_catalog_mismatch_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        fs::write(
            &path,
            r#"{"scenarios": {"too-fast": {"expect": "valid", "values": {"RATE_LIMIT_PER_MINUTE": 5000}}}}"#,
        )
        .unwrap();

        let args = ScenarioArgs {
            file: Some(path),
            json: true,
            ..ScenarioArgs::default()
        };
        let mut out = Vec::new();
        assert!(!run_scenarios(&args, &mut out).unwrap());

        let reports: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(reports[0]["scenario"], "too-fast");
        assert_eq!(reports[0]["status"], "invalid");
    }

    #[test]
    fn test_unknown_scenario_name() {
        let args = ScenarioArgs {
            name: Some("does-not-exist".to_string()),
            ..ScenarioArgs::default()
        };
        assert!(run_scenarios(&args, &mut Vec::new()).is_err());
    }
}
