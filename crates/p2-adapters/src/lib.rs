//! Infrastructure adapters for p2.
//!
//! This crate implements the ports defined in `p2_core::application::ports`.
//! It contains all external dependencies and I/O operations.

pub mod input;
pub mod output;
pub mod renderer;
pub mod template_loader;

// Re-export commonly used adapters
pub use input::{InputSource, InputSpec};
pub use output::{FileSink, MemorySink, StdoutSink, TarSink, TreeSink};
pub use renderer::{EvaluatorOptions, MiniJinjaEvaluator, ScriptingMode};
pub use template_loader::{DiscoveredTemplate, FilesystemTemplateLoader};
