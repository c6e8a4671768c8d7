//! Driven (output) ports - implemented by infrastructure.
//!
//! These traits define what the engine needs from the outside world.
//! The `p2-adapters` crate provides implementations.

use std::{
    io::Write,
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::application::{
    error::{EvaluationError, OutputError},
    scope::RenderScope,
};
use crate::domain::{InputData, LoadedTemplate, OutputTarget};

/// Strategy that turns a logical output target into a writable destination.
///
/// Implemented by:
/// - `p2_adapters::output::StdoutSink`
/// - `p2_adapters::output::FileSink` (single output file)
/// - `p2_adapters::output::TreeSink` (file inside a replicated directory tree)
/// - `p2_adapters::output::TarSink` (entry inside one shared tar archive)
///
/// One sink is built per batch and asked to [`prepare`](Self::prepare) once
/// per template.
#[cfg_attr(test, mockall::automock)]
pub trait OutputSink: Send + Sync {
    /// Open a destination for `target`.
    fn prepare(&self, target: &OutputTarget) -> Result<PreparedOutput, OutputError>;

    /// Called once after the last template of the batch.
    fn finish(&self) -> Result<(), OutputError> {
        Ok(())
    }
}

/// Ownership and permission operations on the destination being rendered.
///
/// Sinks hand out the implementation matching their destination: a real
/// file, a pending archive header, or nothing at all for stdout.
#[cfg_attr(test, mockall::automock)]
pub trait FileAttributes: Send + Sync {
    /// Change owner and/or group; `None` leaves that id untouched.
    fn chown(&self, uid: Option<u32>, gid: Option<u32>) -> Result<(), OutputError>;

    /// Replace the permission bits.
    fn chmod(&self, mode: u32) -> Result<(), OutputError>;
}

/// Deferred cleanup step of a prepared destination.
pub type Finalizer = Box<dyn FnOnce() -> Result<(), OutputError> + Send>;

/// A destination handed out by an [`OutputSink`].
pub struct PreparedOutput {
    writer: Box<dyn Write + Send>,
    base_dir: PathBuf,
    attributes: Arc<dyn FileAttributes>,
    finalizer: Option<Finalizer>,
}

impl PreparedOutput {
    /// `base_dir` anchors relative paths used by scripting filters.
    pub fn new(
        writer: Box<dyn Write + Send>,
        base_dir: impl Into<PathBuf>,
        attributes: Arc<dyn FileAttributes>,
    ) -> Self {
        Self {
            writer,
            base_dir: base_dir.into(),
            attributes,
            finalizer: None,
        }
    }

    pub fn with_finalizer(
        mut self,
        finalizer: impl FnOnce() -> Result<(), OutputError> + Send + 'static,
    ) -> Self {
        self.finalizer = Some(Box::new(finalizer));
        self
    }

    pub fn writer(&mut self) -> &mut (dyn Write + Send) {
        self.writer.as_mut()
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn attributes(&self) -> Arc<dyn FileAttributes> {
        Arc::clone(&self.attributes)
    }

    /// Flush and drop the writer, then run the finalizer.
    ///
    /// The finalizer runs even when the flush fails; the flush error wins.
    pub fn finalize(self) -> Result<(), OutputError> {
        let Self {
            mut writer,
            base_dir,
            finalizer,
            ..
        } = self;

        let flushed = writer
            .flush()
            .map_err(|e| OutputError::io("flush", base_dir.display(), &e));
        drop(writer);

        let finalized = finalizer.map_or(Ok(()), |finalize| finalize());
        flushed.and(finalized)
    }
}

impl std::fmt::Debug for PreparedOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreparedOutput")
            .field("base_dir", &self.base_dir)
            .field("finalizer", &self.finalizer.is_some())
            .finish_non_exhaustive()
    }
}

/// Port for the template language.
///
/// Implemented by `p2_adapters::renderer::MiniJinjaEvaluator`.
pub trait TemplateEvaluator: Send + Sync {
    /// Parse `source` and register it under `template`'s name.
    fn compile(&mut self, template: &LoadedTemplate, source: String)
    -> Result<(), EvaluationError>;

    /// Render a compiled template into `out`.
    ///
    /// The context is `data` plus the `p2` namespace built from `scope`.
    /// Filters see the same `scope` for ownership, mode and base-directory
    /// lookups.
    fn render(
        &self,
        template: &LoadedTemplate,
        scope: RenderScope,
        data: &InputData,
        out: &mut dyn Write,
    ) -> Result<(), EvaluationError>;
}
