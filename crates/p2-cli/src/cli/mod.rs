//! CLI argument definitions using the clap derive API.
//!
//! This module is the *only* place that knows about argument names, aliases,
//! help text, and value enums.  No business logic lives here.

use std::path::PathBuf;

use clap::{Args, Parser};

pub mod global;
pub use global::{GlobalArgs, LogFormat};

/// `-o`/`--tar` value meaning standard output.
pub const STDOUT_ARG: &str = "-";

// ── Top-level CLI ─────────────────────────────────────────────────────────────

/// Main CLI entry-point.
#[derive(Debug, Parser)]
#[command(
    name    = "p2",
    bin_name = "p2",
    version  = env!("CARGO_PKG_VERSION"),
    author   = env!("CARGO_PKG_AUTHORS"),
    about    = "Render Jinja-style templates from environment, JSON or YAML data",
    long_about = "p2 renders a template (or a whole directory of templates) against \
                  data taken from the environment, a file, stdin or a single \
                  environment variable. Output goes to stdout, a file, a mirrored \
                  directory tree or a tar archive.",
    after_help = "EXAMPLES:\n\
        \x20 p2 -t nginx.conf.j2 > nginx.conf\n\
        \x20 p2 -t app.conf.j2 -i values.yml -o /etc/app.conf\n\
        \x20 p2 -t templates/ -i values.json --directory-mode -o out/\n\
        \x20 p2 -t templates/ --directory-mode -o etc --tar - | tar -t",
    arg_required_else_help = true,
)]
pub struct Cli {
    /// Logging, colour and configuration flags.
    #[command(flatten)]
    pub global: GlobalArgs,

    /// What to render and where.
    #[command(flatten)]
    pub render: RenderArgs,
}

// ── render ────────────────────────────────────────────────────────────────────

/// Arguments for a render run.
#[derive(Debug, Args)]
pub struct RenderArgs {
    /// Template file, or template directory with `--directory-mode`.
    #[arg(
        short = 't',
        long = "template",
        value_name = "PATH",
        help = "Template file or directory"
    )]
    pub template: PathBuf,

    /// Input data file, or variable name with `--use-env-key`.
    #[arg(
        short = 'i',
        long = "input",
        value_name = "PATH",
        help = "Input data file (default: the environment)"
    )]
    pub input: Option<String>,

    /// Output file, or output directory in directory mode. `-` is stdout.
    #[arg(
        short = 'o',
        long = "output",
        value_name = "PATH",
        help = "Output file or directory (default: stdout)"
    )]
    pub output: Option<String>,

    /// Input data format.
    #[arg(
        short = 'f',
        long = "format",
        value_name = "FORMAT",
        default_value = "auto",
        help = "Input format: auto, env, json, yaml, envkey"
    )]
    pub format: String,

    /// Treat `--input` as the name of an environment variable holding the data.
    #[arg(long = "use-env-key", help = "Read input from the variable named by --input")]
    pub use_env_key: bool,

    /// Overlay the process environment on top of the input data.
    #[arg(long = "include-env", help = "Merge environment variables into the input")]
    pub include_env: bool,

    /// Write every output into one tar archive. `-` is stdout.
    #[arg(long = "tar", value_name = "FILE", help = "Bundle outputs into a tar archive")]
    pub tar: Option<String>,

    /// Scripting filters to enable.
    #[arg(
        long = "enable-filters",
        value_name = "NAMES",
        value_delimiter = ',',
        help = "Enable scripting filters (write_file, make_dirs)"
    )]
    pub enable_filters: Vec<String>,

    /// Register every scripting filter as a passthrough.
    #[arg(
        long = "enable-noop-filters",
        help = "Register scripting filters as no-ops (overrides --enable-filters)"
    )]
    pub enable_noop_filters: bool,

    /// HTML-escape expression output.
    #[arg(long = "autoescape", help = "Enable HTML autoescaping")]
    pub autoescape: bool,

    /// Render every file under the template directory.
    #[arg(long = "directory-mode", help = "Render a directory tree of templates")]
    pub directory_mode: bool,

    /// Substring removed from output file names in directory mode.
    #[arg(
        long = "directory-mode-filename-substr-del",
        value_name = "SUBSTR",
        requires = "directory_mode",
        help = "Delete SUBSTR from output file names"
    )]
    pub filename_substr_del: Option<String>,

    /// Dump the assembled input data to stderr before rendering.
    #[arg(long = "debug", help = "Print the input data before rendering")]
    pub debug: bool,
}
