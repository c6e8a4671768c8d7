//! Directory-tree output sink.
//!
//! Each template lands at its mirrored location under the output root.
//! Scripting filters resolve relative paths against the directory of the
//! file being written, so templates can drop companion files next to
//! themselves without the process ever changing directory.

use std::{fs::File, io::BufWriter, sync::Arc};

use tracing::debug;

use p2_core::application::{
    OutputError,
    ports::{OutputSink, PreparedOutput},
};
use p2_core::domain::OutputTarget;

use super::{
    attributes::{LocalFileAttributes, map_io_error},
    file::target_path,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct TreeSink;

impl TreeSink {
    pub fn new() -> Self {
        Self
    }
}

impl OutputSink for TreeSink {
    fn prepare(&self, target: &OutputTarget) -> Result<PreparedOutput, OutputError> {
        let path = target_path(target)?;
        let dir = path
            .parent()
            .ok_or_else(|| OutputError::new("open", target, "output has no parent directory"))?;

        std::fs::create_dir_all(dir).map_err(|e| map_io_error(dir, &e, "create directory"))?;
        debug!(dir = %dir.display(), "Output directory ready");

        let file = File::create(path).map_err(|e| map_io_error(path, &e, "open"))?;
        Ok(PreparedOutput::new(
            Box::new(BufWriter::new(file)),
            dir,
            Arc::new(LocalFileAttributes::new(path)),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_parents_and_anchors_at_file_dir() {
        let root = tempfile::tempdir().unwrap();
        let path = root.path().join("dir1/dir2/template2");

        let mut prepared = TreeSink::new()
            .prepare(&OutputTarget::File(path.clone()))
            .unwrap();
        assert_eq!(prepared.base_dir(), root.path().join("dir1/dir2"));
        prepared.writer().write_all(b"two").unwrap();
        prepared.finalize().unwrap();

        assert_eq!(std::fs::read_to_string(path).unwrap(), "two");
    }

    #[test]
    fn process_working_directory_is_untouched() {
        let before = std::env::current_dir().unwrap();
        let root = tempfile::tempdir().unwrap();
        let prepared = TreeSink::new()
            .prepare(&OutputTarget::File(root.path().join("a/b")))
            .unwrap();
        prepared.finalize().unwrap();
        assert_eq!(std::env::current_dir().unwrap(), before);
    }
}
