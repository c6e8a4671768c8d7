//! File attribute adapters (owner/group/mode) using std::fs.

use std::io;
use std::path::{Path, PathBuf};

use p2_core::application::{OutputError, ports::FileAttributes};

/// Changes ownership and permissions of a real file on disk.
#[derive(Debug, Clone)]
pub struct LocalFileAttributes {
    path: PathBuf,
}

impl LocalFileAttributes {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FileAttributes for LocalFileAttributes {
    fn chown(&self, uid: Option<u32>, gid: Option<u32>) -> Result<(), OutputError> {
        #[cfg(unix)]
        {
            std::os::unix::fs::chown(&self.path, uid, gid)
                .map_err(|e| map_io_error(&self.path, &e, "chown"))
        }
        #[cfg(not(unix))]
        {
            let _ = (uid, gid);
            Err(OutputError::new(
                "chown",
                self.path.display(),
                "ownership changes are only supported on unix",
            ))
        }
    }

    fn chmod(&self, mode: u32) -> Result<(), OutputError> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(mode))
                .map_err(|e| map_io_error(&self.path, &e, "chmod"))
        }
        #[cfg(not(unix))]
        {
            // Only the read-only bit exists here
            let mut perms = std::fs::metadata(&self.path)
                .map_err(|e| map_io_error(&self.path, &e, "chmod"))?
                .permissions();
            perms.set_readonly(mode & 0o200 == 0);
            std::fs::set_permissions(&self.path, perms)
                .map_err(|e| map_io_error(&self.path, &e, "chmod"))
        }
    }
}

/// Attributes for destinations with no file behind them (stdout).
#[derive(Debug, Clone, Copy, Default)]
pub struct DetachedAttributes;

impl FileAttributes for DetachedAttributes {
    fn chown(&self, _uid: Option<u32>, _gid: Option<u32>) -> Result<(), OutputError> {
        Ok(())
    }

    fn chmod(&self, _mode: u32) -> Result<(), OutputError> {
        Ok(())
    }
}

pub(crate) fn map_io_error(path: &Path, e: &io::Error, operation: &'static str) -> OutputError {
    OutputError::io(operation, path.display(), e)
}
