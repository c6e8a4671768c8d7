//! Application layer for p2.
//!
//! This layer contains:
//! - **Services**: Use case orchestration (TemplateEngine, BatchService)
//! - **Ports**: Interface definitions (traits) for external dependencies
//! - **Scope**: The per-render context handed to the evaluator
//! - **Errors**: Application-specific error types
//!
//! The application layer coordinates the domain layer but performs no I/O
//! itself. All I/O happens behind ports.

pub mod error;
pub mod ports;
pub mod scope;
pub mod services;

// Re-export main services
pub use services::{BatchFailure, BatchReport, BatchService, TemplateEngine};

// Re-export port traits (for adapter implementation)
pub use ports::{FileAttributes, OutputSink, PreparedOutput, TemplateEvaluator};

pub use error::{
    ApplicationError, EvaluationError, EvaluationErrorKind, FilterError, FilterErrorKind,
    OutputError,
};
pub use scope::RenderScope;
