//! Application layer errors.
//!
//! These errors represent failures in orchestration, not input validation.
//! Input validation errors are `DomainError` from `crate::domain`.

use std::{fmt, io, path::PathBuf};
use thiserror::Error;

use crate::error::ErrorCategory;

/// Errors that occur while running render jobs.
///
/// Every per-template variant carries the template path and the output
/// it was bound to.
#[derive(Debug, Error, Clone)]
pub enum ApplicationError {
    /// The output sink could not provide a destination.
    #[error("Could not prepare output {output} for template {template}: {source}")]
    OutputPreparation {
        template: PathBuf,
        output: String,
        #[source]
        source: OutputError,
    },

    /// The evaluator (or a filter it invoked) failed mid-render.
    #[error("Render failed for template {template}, output {output}: {source}")]
    Render {
        template: PathBuf,
        output: String,
        #[source]
        source: EvaluationError,
    },

    /// Rendering succeeded but closing the destination failed.
    #[error("Could not finalize output {output} for template {template}: {source}")]
    Finalization {
        template: PathBuf,
        output: String,
        #[source]
        source: OutputError,
    },

    /// A template failed to parse.
    #[error("Could not load template {template}: {source}")]
    TemplateLoad {
        template: PathBuf,
        #[source]
        source: EvaluationError,
    },

    /// Template discovery failed (missing path, unreadable tree).
    #[error("Template discovery failed at {root}: {reason}")]
    TemplateDiscovery { root: PathBuf, reason: String },

    /// Input data could not be read or decoded.
    #[error("Could not decode {format} input from {origin}: {reason}")]
    InputDecode {
        format: String,
        origin: String,
        reason: String,
    },

    /// The sink's end-of-batch step failed (e.g. tar trailer).
    #[error("Could not complete output: {0}")]
    SinkFinish(#[source] OutputError),

    /// At least one template in the batch failed.
    #[error("{failed} of {total} templates failed to render")]
    BatchFailed { failed: usize, total: usize },
}

impl ApplicationError {
    /// Get user-actionable suggestions.
    pub fn suggestions(&self) -> Vec<String> {
        match self {
            Self::OutputPreparation { output, .. } => vec![
                format!("Failed to open: {output}"),
                "Check that you have write permissions".into(),
                "Ensure the parent directory exists".into(),
            ],
            Self::Render { source, .. } => match source.kind {
                EvaluationErrorKind::Filter(FilterErrorKind::Lookup) => vec![
                    "A SetOwner/SetGroup name does not exist on this system".into(),
                    "Use a numeric id or an existing user/group name".into(),
                ],
                EvaluationErrorKind::Filter(_) => {
                    vec!["Check the filter's input type and parameter".into()]
                }
                EvaluationErrorKind::Syntax => vec!["Fix the template syntax error".into()],
                _ => vec!["Check the template and its input data".into()],
            },
            Self::TemplateLoad { template, .. } => vec![
                format!("Template {} could not be parsed", template.display()),
                "Check the template syntax near the reported line".into(),
            ],
            Self::TemplateDiscovery { root, .. } => vec![
                format!("Check that {} exists and is readable", root.display()),
                "In --directory-mode the template path must be a directory".into(),
            ],
            Self::InputDecode { format, .. } => vec![
                format!("The input is not valid {format}"),
                "Pass the right format explicitly with --format".into(),
            ],
            Self::BatchFailed { .. } => vec!["See the errors above for each failed template".into()],
            _ => vec!["Check the error details above".into()],
        }
    }

    /// Get error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::TemplateLoad { .. } | Self::InputDecode { .. } => ErrorCategory::Validation,
            Self::TemplateDiscovery { .. } => ErrorCategory::NotFound,
            Self::OutputPreparation { .. }
            | Self::Render { .. }
            | Self::Finalization { .. }
            | Self::SinkFinish(_)
            | Self::BatchFailed { .. } => ErrorCategory::Internal,
        }
    }
}

// ============================================================================
// Port-level errors
// ============================================================================

/// Failure reported by an output sink or file-attribute operation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{operation} {target}: {reason}")]
pub struct OutputError {
    pub operation: &'static str,
    pub target: String,
    pub reason: String,
}

impl OutputError {
    pub fn new(operation: &'static str, target: impl fmt::Display, reason: impl fmt::Display) -> Self {
        Self {
            operation,
            target: target.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn io(operation: &'static str, target: impl fmt::Display, err: &io::Error) -> Self {
        Self::new(operation, target, err)
    }
}

/// Failure reported by the template evaluator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct EvaluationError {
    pub kind: EvaluationErrorKind,
    pub message: String,
}

impl EvaluationError {
    pub fn new(kind: EvaluationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluationErrorKind {
    /// Template could not be parsed.
    Syntax,
    /// Undefined values, bad operations, unknown filters.
    Runtime,
    /// A registered filter rejected its input.
    Filter(FilterErrorKind),
    /// Writing rendered output failed.
    Io,
}

impl fmt::Display for EvaluationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Syntax => f.write_str("syntax error"),
            Self::Runtime => f.write_str("runtime error"),
            Self::Filter(kind) => write!(f, "filter {kind} error"),
            Self::Io => f.write_str("write error"),
        }
    }
}

/// Typed failure raised by a filter function.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("filter '{filter}': {message}")]
pub struct FilterError {
    pub filter: &'static str,
    pub kind: FilterErrorKind,
    pub message: String,
}

impl FilterError {
    pub fn new(filter: &'static str, kind: FilterErrorKind, message: impl Into<String>) -> Self {
        Self {
            filter,
            kind,
            message: message.into(),
        }
    }

    /// Wrong input type or malformed parameter.
    pub fn validation(filter: &'static str, message: impl Into<String>) -> Self {
        Self::new(filter, FilterErrorKind::Validation, message)
    }

    /// Filesystem side effect failed.
    pub fn io(filter: &'static str, message: impl Into<String>) -> Self {
        Self::new(filter, FilterErrorKind::Io, message)
    }

    /// User or group lookup failed.
    pub fn lookup(filter: &'static str, message: impl Into<String>) -> Self {
        Self::new(filter, FilterErrorKind::Lookup, message)
    }

    /// Encoding, decoding or (de)compression failed.
    pub fn codec(filter: &'static str, message: impl Into<String>) -> Self {
        Self::new(filter, FilterErrorKind::Codec, message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterErrorKind {
    Validation,
    Io,
    Lookup,
    Codec,
}

impl fmt::Display for FilterErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation => f.write_str("validation"),
            Self::Io => f.write_str("I/O"),
            Self::Lookup => f.write_str("lookup"),
            Self::Codec => f.write_str("codec"),
        }
    }
}
