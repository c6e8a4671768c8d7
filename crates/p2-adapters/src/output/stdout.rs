//! Standard output sink.

use std::{path::PathBuf, sync::Arc};

use p2_core::application::{
    OutputError,
    ports::{OutputSink, PreparedOutput},
};
use p2_core::domain::OutputTarget;

use super::attributes::DetachedAttributes;

/// Writes every render to the process's standard output; ignores the target.
#[derive(Debug, Clone)]
pub struct StdoutSink {
    base_dir: PathBuf,
}

impl StdoutSink {
    /// `base_dir` anchors relative paths used by scripting filters.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }
}

impl OutputSink for StdoutSink {
    fn prepare(&self, _target: &OutputTarget) -> Result<PreparedOutput, OutputError> {
        Ok(PreparedOutput::new(
            Box::new(std::io::stdout()),
            self.base_dir.clone(),
            Arc::new(DetachedAttributes),
        ))
    }
}
