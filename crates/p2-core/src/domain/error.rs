// ============================================================================
// domain/error.rs - DOMAIN ERRORS
// ============================================================================

use std::path::PathBuf;
use thiserror::Error;

/// Root domain error type.
///
/// All errors are:
/// - Cloneable (so batch reports can keep them)
/// - Categorizable (for CLI display)
/// - Actionable (provides suggestions)
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    // ========================================================================
    // Input data errors
    // ========================================================================
    /// An env-style line could not be turned into a key/value pair.
    #[error("EnvironmentVariablesError: {reason} (line: {raw_env_var:?})")]
    EnvironmentVariables { reason: String, raw_env_var: String },

    #[error("Input data must be a mapping at the top level, found {found}")]
    InvalidInputShape { found: String },

    #[error("Unsupported input format '{0}'")]
    UnsupportedFormat(String),

    // ========================================================================
    // Path errors
    // ========================================================================
    #[error("Cannot express {path} relative to {root}")]
    NotRelative { path: PathBuf, root: PathBuf },

    #[error("Output path has no file name: {path}")]
    MissingFileName { path: PathBuf },
}

impl DomainError {
    /// Get user-actionable suggestions for fixing this error.
    pub fn suggestions(&self) -> Vec<String> {
        match self {
            Self::EnvironmentVariables { raw_env_var, .. } => vec![
                format!("Offending line: {raw_env_var}"),
                "Each line must look like KEY=value".into(),
                "Quote values containing spaces: KEY=\"two words\"".into(),
            ],
            Self::InvalidInputShape { .. } => vec![
                "The top level of JSON or YAML input must be an object".into(),
                "Wrap lists or scalars in a key, e.g. {\"items\": [...]}".into(),
            ],
            Self::UnsupportedFormat(format) => vec![
                format!("'{format}' is not a known input format"),
                "Supported formats: env, envkey, json, yaml, yml".into(),
                "Pass the format explicitly with --format".into(),
            ],
            Self::NotRelative { root, .. } => vec![
                format!("Output paths must be expressible relative to {}", root.display()),
                "Use absolute paths for both the output and the root".into(),
            ],
            Self::MissingFileName { .. } => vec!["Point --output at a file, not a directory".into()],
        }
    }

    /// Error category for CLI display styling.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::EnvironmentVariables { .. }
            | Self::InvalidInputShape { .. }
            | Self::UnsupportedFormat(_)
            | Self::MissingFileName { .. } => ErrorCategory::Validation,
            Self::NotRelative { .. } => ErrorCategory::Internal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    Internal,
}
