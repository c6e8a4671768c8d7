//! Single-file output sink.

use std::{
    fs::File,
    io::BufWriter,
    path::{Path, PathBuf},
    sync::Arc,
};

use p2_core::application::{
    OutputError,
    ports::{OutputSink, PreparedOutput},
};
use p2_core::domain::OutputTarget;

use super::attributes::{LocalFileAttributes, map_io_error};

/// Opens the target for truncated write, creating it if absent.
///
/// The parent directory must already exist.
#[derive(Debug, Clone)]
pub struct FileSink {
    base_dir: PathBuf,
}

impl FileSink {
    /// `base_dir` anchors relative paths used by scripting filters.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }
}

impl OutputSink for FileSink {
    fn prepare(&self, target: &OutputTarget) -> Result<PreparedOutput, OutputError> {
        let path = target_path(target)?;
        let file = File::create(path).map_err(|e| map_io_error(path, &e, "open"))?;

        Ok(PreparedOutput::new(
            Box::new(BufWriter::new(file)),
            self.base_dir.clone(),
            Arc::new(LocalFileAttributes::new(path)),
        ))
    }
}

pub(crate) fn target_path(target: &OutputTarget) -> Result<&Path, OutputError> {
    target
        .path()
        .ok_or_else(|| OutputError::new("open", target, "this sink needs a file target"))
}
