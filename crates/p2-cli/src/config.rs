//! Application configuration.
//!
//! [`AppConfig`] is loaded once at startup and passed down by value.  The
//! CLI layer owns config; the core crate never sees it.
//!
//! # Resolution order (highest priority first)
//!
//! 1. CLI flags (handled at the call-site, not here)
//! 2. `P2_SECTION__KEY` environment variables
//! 3. Config file (`--config`, or the platform config directory)
//! 4. Built-in defaults (always present)
//!
//! ```toml
//! [logging]
//! format = "json"
//!
//! [render]
//! autoescape = false
//!
//! [filters]
//! enabled = "write_file,make_dirs"
//! noop = false
//!
//! [tar]
//! default_mode = "644"
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use crate::cli::LogFormat;

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub render: RenderConfig,
    pub filters: FiltersConfig,
    pub tar: TarConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub format: LogFormat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    pub autoescape: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FiltersConfig {
    /// Comma-separated scripting filter names.
    pub enabled: String,
    pub noop: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TarConfig {
    /// Octal permission bits for entries a template never calls SetMode on.
    pub default_mode: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            logging: LoggingConfig {
                format: LogFormat::Console,
            },
            render: RenderConfig { autoescape: false },
            filters: FiltersConfig {
                enabled: String::new(),
                noop: false,
            },
            tar: TarConfig {
                default_mode: "644".into(),
            },
        }
    }
}

impl AppConfig {
    /// Load configuration, starting from defaults.
    ///
    /// An explicit `config_file` must exist; the default location is
    /// optional.
    pub fn load(config_file: Option<&Path>) -> anyhow::Result<Self> {
        let defaults = Self::default();
        let (path, required) = match config_file {
            Some(path) => (path.to_path_buf(), true),
            None => (Self::config_path(), false),
        };

        let config: Self = Config::builder()
            .set_default("logging.format", "console")?
            .set_default("render.autoescape", defaults.render.autoescape)?
            .set_default("filters.enabled", defaults.filters.enabled)?
            .set_default("filters.noop", defaults.filters.noop)?
            .set_default("tar.default_mode", defaults.tar.default_mode)?
            .add_source(
                File::from(path.clone())
                    .format(FileFormat::Toml)
                    .required(required),
            )
            .add_source(
                Environment::with_prefix("P2")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .with_context(|| format!("reading configuration from {}", path.display()))?
            .try_deserialize()
            .context("invalid configuration")?;

        config.tar.mode()?;
        Ok(config)
    }

    /// Path to the default configuration file.
    ///
    /// Uses `directories::ProjectDirs` for cross-platform correctness,
    /// falling back to `.p2.toml` in the current directory.
    pub fn config_path() -> PathBuf {
        directories::ProjectDirs::from("io", "p2", "p2")
            .map(|d| d.config_dir().join("config.toml"))
            .unwrap_or_else(|| PathBuf::from(".p2.toml"))
    }
}

impl FiltersConfig {
    pub fn names(&self) -> Vec<String> {
        self.enabled
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
            .collect()
    }
}

impl TarConfig {
    pub fn mode(&self) -> anyhow::Result<u32> {
        let digits = self.default_mode.trim();
        let digits = digits.strip_prefix("0o").unwrap_or(digits);
        let mode = u32::from_str_radix(digits, 8)
            .with_context(|| format!("tar.default_mode '{}' is not octal", self.default_mode))?;
        anyhow::ensure!(mode <= 0o7777, "tar.default_mode '{}' is out of range", self.default_mode);
        Ok(mode)
    }
}
