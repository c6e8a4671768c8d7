//! Filesystem template discovery.
//!
//! Single mode loads one file; directory mode walks a tree and loads every
//! regular file under it.
//!
//! ```text
//! templates/            ← root (directory mode)
//! ├── app.conf          → name "app.conf"
//! └── dir1/
//!     └── dir2/
//!         └── template2 → name "dir1/dir2/template2"
//! ```
//!
//! Template names use `/` separators so `include`/`extends` can refer to
//! siblings the same way on every platform.

use std::{
    fs,
    path::{Path, PathBuf},
};

use tracing::{debug, instrument};
use walkdir::WalkDir;

use p2_core::application::ApplicationError;
use p2_core::domain::LoadedTemplate;

/// A template found on disk, with its source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredTemplate {
    pub template: LoadedTemplate,
    /// Location relative to the discovery root.
    pub rel_path: PathBuf,
    pub source: String,
}

pub struct FilesystemTemplateLoader {
    root: PathBuf,
}

impl FilesystemTemplateLoader {
    /// Loader for the template file or directory at `root`.
    ///
    /// Nothing is read until [`Self::load_file`] or [`Self::load_tree`].
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory `include`/`extends` resolve against.
    pub fn include_root(&self) -> PathBuf {
        if self.root.is_dir() {
            self.root.clone()
        } else {
            self.root
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."))
        }
    }

    /// Load `root` as a single template named after its file name.
    #[instrument(skip(self), fields(path = %self.root.display()))]
    pub fn load_file(&self) -> Result<DiscoveredTemplate, ApplicationError> {
        let name = self
            .root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| self.discovery_error("template path has no file name"))?;
        let source = self.read(&self.root)?;
        Ok(DiscoveredTemplate {
            template: LoadedTemplate::new(name.clone(), self.root.clone()),
            rel_path: PathBuf::from(name),
            source,
        })
    }

    /// Load every regular file under `root`, in sorted path order.
    ///
    /// Directories produce no templates of their own. Symlinks are not
    /// followed.
    #[instrument(skip(self), fields(root = %self.root.display()))]
    pub fn load_tree(&self) -> Result<Vec<DiscoveredTemplate>, ApplicationError> {
        if !self.root.is_dir() {
            return Err(self.discovery_error(
                "template path must be a directory in directory mode",
            ));
        }

        let mut templates = Vec::new();
        for entry in WalkDir::new(&self.root).min_depth(1).sort_by_file_name() {
            let entry = entry.map_err(|e| self.discovery_error(format!("directory walk error: {e}")))?;
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let rel_path = path
                .strip_prefix(&self.root)
                .map_err(|_| {
                    self.discovery_error(format!(
                        "{} is outside the template root",
                        path.display()
                    ))
                })?
                .to_path_buf();
            let name = template_name(&rel_path);
            debug!(template = %name, "Template file");

            templates.push(DiscoveredTemplate {
                template: LoadedTemplate::new(name, path),
                source: self.read(path)?,
                rel_path,
            });
        }

        debug!(count = templates.len(), "Finished discovering templates");
        Ok(templates)
    }

    fn read(&self, path: &Path) -> Result<String, ApplicationError> {
        fs::read_to_string(path).map_err(|e| ApplicationError::TemplateDiscovery {
            root: path.to_path_buf(),
            reason: format!("could not read template: {e}"),
        })
    }

    fn discovery_error(&self, reason: impl Into<String>) -> ApplicationError {
        ApplicationError::TemplateDiscovery {
            root: self.root.clone(),
            reason: reason.into(),
        }
    }
}

/// `/`-separated name for a path relative to the template root.
fn template_name(rel_path: &Path) -> String {
    rel_path
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
