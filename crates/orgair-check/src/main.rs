//! orgair-check - Entry point
//!
//! Validates the platform configuration at startup and runs scenario
//! catalogs.

use std::io;

use tracing::error;

use orgair_check::cli::HELP;
use orgair_check::{run_scenarios, run_validate, Command, EXIT_ERROR, EXIT_INVALID, EXIT_VALID};
use orgair_telemetry::{init_logging, LogConfig};

fn main() {
    let command = match Command::parse(std::env::args().skip(1)) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("{e}");
            eprintln!("Use --help for usage information");
            std::process::exit(EXIT_ERROR);
        }
    };

    let log_config = LogConfig::production()
        .with_level(std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".to_string()))
        .with_service_name("orgair-check");
    if let Err(e) = init_logging(&log_config) {
        eprintln!("{e}");
        std::process::exit(EXIT_ERROR);
    }

    let stdout = io::stdout();
    let stderr = io::stderr();

    let result = match command {
        Command::Help => {
            print!("{HELP}");
            Ok(true)
        }
        Command::Version => {
            println!("orgair-check {}", orgair_check::VERSION);
            Ok(true)
        }
        Command::Validate(args) => run_validate(&args, &mut stdout.lock(), &mut stderr.lock()),
        Command::Scenarios(args) => run_scenarios(&args, &mut stdout.lock()),
    };

    match result {
        Ok(true) => std::process::exit(EXIT_VALID),
        Ok(false) => std::process::exit(EXIT_INVALID),
        Err(e) => {
            error!("{e:#}");
            std::process::exit(EXIT_ERROR);
        }
    }
}
