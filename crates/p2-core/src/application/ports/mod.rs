//! Application ports (traits) for external dependencies.
//!
//! In hexagonal architecture, ports define interfaces that the application
//! needs from the outside world. Adapters in `p2-adapters` implement these.
//!
//! ## Port Types
//!
//! - **Driven (Output) Ports**: Called by the engine, implemented by infrastructure
//!   - `OutputSink`: Where rendered bytes go
//!   - `FileAttributes`: Owner/mode changes on the current destination
//!   - `TemplateEvaluator`: The template language
//!
//! - **Driving (Input) Ports**: Called by the CLI, implemented by services

pub mod output;

pub use output::{FileAttributes, Finalizer, OutputSink, PreparedOutput, TemplateEvaluator};

#[cfg(test)]
pub use output::{MockFileAttributes, MockOutputSink};
