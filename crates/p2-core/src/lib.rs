//! p2 Core - Hexagonal Architecture Implementation
//!
//! This crate provides the domain and application layers for the p2
//! template renderer, following hexagonal (ports and adapters) architecture.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              p2-cli (CLI)               │
//! │  (input assembly, discovery, jobs)      │
//! └──────────────────┬──────────────────────┘
//!                    │ calls
//!                    ▼
//! ┌─────────────────────────────────────────┐
//! │         Application Services            │
//! │    (BatchService, TemplateEngine)       │
//! │   prepare → render → finalize per job   │
//! └──────────────────┬──────────────────────┘
//!                    │ uses
//!                    ▼
//! ┌─────────────────────────────────────────┐
//! │      Application Ports (Traits)         │
//! │ (OutputSink, FileAttributes, Evaluator) │
//! └──────────────────┬──────────────────────┘
//!                    │ implemented by
//!                    ▼
//! ┌─────────────────────────────────────────┐
//! │     p2-adapters (Infrastructure)        │
//! │ (MiniJinja, filters, stdout/file/tree/  │
//! │  tar sinks, input decoders)             │
//! └─────────────────────────────────────────┘
//!                    │
//!                    ▼
//! ┌─────────────────────────────────────────┐
//! │         Domain Layer (Pure Logic)       │
//! │ (InputData, PathMetadata, RenderJob)    │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use p2_core::prelude::*;
//!
//! let mut engine = TemplateEngine::new(evaluator, sink);
//! let template = LoadedTemplate::new("app.conf", "templates/app.conf");
//! engine.load(&template, source)?;
//!
//! let job = RenderJob::single(template, None, &cwd)?;
//! let report = BatchService::new(engine).run(&[job], &data);
//! ```

pub mod application;
pub mod domain;
pub mod error;

// Public API - what external crates should use
pub mod prelude {
    pub use crate::application::{
        ApplicationError, BatchReport, BatchService, RenderScope, TemplateEngine,
        ports::{FileAttributes, OutputSink, PreparedOutput, TemplateEvaluator},
    };
    pub use crate::domain::{
        DataFormat, FilenameTransform, InputData, LoadedTemplate, OutputTarget, PathMetadata,
        RenderJob, STDOUT_SENTINEL,
    };
    pub use crate::error::{P2Error, P2Result};
}

// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
