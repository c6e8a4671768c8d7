//! # p2 CLI
//!
//! Renders Jinja-style templates against environment, JSON or YAML data.
//!
//! ## Startup sequence
//!
//! 1. Parse CLI arguments (clap handles `--help` / `--version` early-exit).
//! 2. Load configuration (defaults + file + `P2_*` environment).
//! 3. Initialise the tracing subscriber (logging).
//! 4. Build the [`OutputManager`].
//! 5. Run the render command.
//! 6. Translate any [`CliError`] into a user-facing message and exit code.
//!
//! ## Exit codes
//!
//! | Code | Meaning                           |
//! |------|-----------------------------------|
//! |  0   | Success                           |
//! |  1   | Internal error or failed render   |
//! |  2   | User / input error                |
//! |  3   | Resource not found                |
//! |  4   | Configuration error               |

use std::process::ExitCode;

use clap::Parser;
use tracing::{debug, error, info, instrument};

use crate::{
    cli::Cli,
    config::AppConfig,
    error::{CliError, CliResult},
    logging::init_logging,
    output::OutputManager,
};

mod cli;
mod commands;
mod config;
mod error;
mod logging;
mod output;

fn main() -> ExitCode {
    // ── 1. Parse arguments ────────────────────────────────────────────────
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // --help and --version land here too and exit 0.
            let _ = e.print();
            return ExitCode::from(u8::try_from(e.exit_code()).unwrap_or(2));
        }
    };

    // ── 2. Load configuration ─────────────────────────────────────────────
    // The config picks the log format, so it is read before logging starts
    // and its error is reported once a subscriber exists.
    let config = AppConfig::load(cli.global.config.as_deref());
    let log_format = cli.global.log_format.unwrap_or_else(|| {
        config
            .as_ref()
            .map(|c| c.logging.format)
            .unwrap_or_default()
    });

    // ── 3. Initialise tracing ─────────────────────────────────────────────
    if let Err(e) = init_logging(&cli.global, log_format) {
        eprintln!("Failed to initialise logging: {e}");
        return ExitCode::from(1);
    }

    debug!(
        verbose = cli.global.verbose,
        quiet = cli.global.quiet,
        no_color = cli.global.no_color,
        "CLI started"
    );

    let config = match config {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {e:#}");
            return ExitCode::from(4);
        }
    };

    // ── 4. Build output manager ───────────────────────────────────────────
    let output = OutputManager::new(&cli.global);
    let verbose = cli.global.verbose > 0;

    // ── 5. Run + 6. Error handling ────────────────────────────────────────
    match run(cli, config, output) {
        Ok(()) => {
            info!("p2 completed successfully");
            ExitCode::SUCCESS
        }
        Err(e) => handle_error(e, verbose),
    }
}

#[instrument(skip_all)]
fn run(cli: Cli, config: AppConfig, output: OutputManager) -> CliResult<()> {
    commands::render::execute(cli.render, config, output)
}

/// Translate a `CliError` into a user message and an appropriate exit code.
fn handle_error(err: CliError, verbose: bool) -> ExitCode {
    err.log();

    let msg = if std::io::IsTerminal::is_terminal(&std::io::stderr()) {
        err.format_colored(verbose)
    } else {
        err.format_plain(verbose)
    };
    eprint!("{msg}");

    ExitCode::from(err.exit_code())
}

// ── tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_structure_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn cli_version_matches_cargo() {
        let cmd = Cli::command();
        assert_eq!(cmd.get_version(), Some(env!("CARGO_PKG_VERSION")));
    }

    #[test]
    fn cli_has_author() {
        let cmd = Cli::command();
        assert!(cmd.get_author().is_some());
    }

    #[test]
    fn template_is_required() {
        assert!(Cli::try_parse_from(["p2", "-i", "data.json"]).is_err());
    }

    #[test]
    fn filter_list_is_comma_separated() {
        let cli = Cli::try_parse_from([
            "p2",
            "-t",
            "t.j2",
            "--enable-filters",
            "write_file,make_dirs",
        ])
        .unwrap();
        assert_eq!(cli.render.enable_filters, ["write_file", "make_dirs"]);
    }

    #[test]
    fn substr_del_requires_directory_mode() {
        assert!(
            Cli::try_parse_from([
                "p2",
                "-t",
                "t.j2",
                "--directory-mode-filename-substr-del",
                ".j2"
            ])
            .is_err()
        );
    }
}
