//! Per-render scope handed to the evaluator and its filters.
//!
//! Replaces any notion of a process-wide "current output file" or working
//! directory: everything a filter needs to know about the destination
//! travels with the render.

use std::{
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::application::{error::OutputError, ports::FileAttributes};
use crate::domain::{OutputTarget, PathMetadata};

#[derive(Clone)]
pub struct RenderScope {
    target: OutputTarget,
    metadata: PathMetadata,
    base_dir: PathBuf,
    attributes: Arc<dyn FileAttributes>,
}

impl RenderScope {
    pub fn new(
        target: OutputTarget,
        metadata: PathMetadata,
        base_dir: impl Into<PathBuf>,
        attributes: Arc<dyn FileAttributes>,
    ) -> Self {
        Self {
            target,
            metadata,
            base_dir: base_dir.into(),
            attributes,
        }
    }

    pub fn target(&self) -> &OutputTarget {
        &self.target
    }

    /// The `p2` namespace values for this render.
    pub fn metadata(&self) -> &PathMetadata {
        &self.metadata
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn is_stdout(&self) -> bool {
        self.target.is_stdout()
    }

    /// Anchor a relative path at this render's base directory.
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    /// Change owner/group of the destination. No-op on stdout.
    pub fn set_owner(&self, uid: Option<u32>, gid: Option<u32>) -> Result<(), OutputError> {
        if self.is_stdout() {
            return Ok(());
        }
        self.attributes.chown(uid, gid)
    }

    /// Change permission bits of the destination. No-op on stdout.
    pub fn set_mode(&self, mode: u32) -> Result<(), OutputError> {
        if self.is_stdout() {
            return Ok(());
        }
        self.attributes.chmod(mode)
    }
}

impl fmt::Debug for RenderScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderScope")
            .field("target", &self.target)
            .field("metadata", &self.metadata)
            .field("base_dir", &self.base_dir)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::MockFileAttributes;
    use mockall::predicate::eq;

    fn scope(target: OutputTarget, attributes: MockFileAttributes) -> RenderScope {
        let metadata = match target.path() {
            Some(path) => PathMetadata::for_file(path, Path::new("/out")).unwrap(),
            None => PathMetadata::for_stdout(Path::new("/out")),
        };
        RenderScope::new(target, metadata, "/out/sub", Arc::new(attributes))
    }

    #[test]
    fn stdout_scope_never_touches_attributes() {
        // No expectations: any call would panic.
        let scope = scope(OutputTarget::Stdout, MockFileAttributes::new());
        assert!(scope.set_owner(Some(0), None).is_ok());
        assert!(scope.set_mode(0o600).is_ok());
    }

    #[test]
    fn file_scope_forwards_to_attributes() {
        let mut attributes = MockFileAttributes::new();
        attributes
            .expect_chown()
            .with(eq(Some(1000)), eq(None))
            .times(1)
            .returning(|_, _| Ok(()));
        attributes
            .expect_chmod()
            .with(eq(0o640))
            .times(1)
            .returning(|_| Ok(()));

        let scope = scope(OutputTarget::File("/out/sub/a.conf".into()), attributes);
        scope.set_owner(Some(1000), None).unwrap();
        scope.set_mode(0o640).unwrap();
    }

    #[test]
    fn resolve_anchors_relative_paths() {
        let scope = scope(OutputTarget::Stdout, MockFileAttributes::new());
        assert_eq!(scope.resolve("x/y.txt"), PathBuf::from("/out/sub/x/y.txt"));
        assert_eq!(scope.resolve("/etc/z"), PathBuf::from("/etc/z"));
    }
}
