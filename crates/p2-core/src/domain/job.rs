//! Render jobs: one template instance bound to one output destination.

use std::{
    fmt,
    path::{Path, PathBuf},
};

use super::{
    error::DomainError,
    path_metadata::{PathMetadata, STDOUT_SENTINEL, normalize},
};

/// Where a render's bytes end up.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OutputTarget {
    Stdout,
    File(PathBuf),
}

impl OutputTarget {
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Stdout => None,
            Self::File(path) => Some(path),
        }
    }

    pub fn is_stdout(&self) -> bool {
        matches!(self, Self::Stdout)
    }
}

impl fmt::Display for OutputTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdout => f.write_str(STDOUT_SENTINEL),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Handle to a template compiled into the evaluator.
///
/// `name` is the evaluator-side key (the path relative to the template
/// root); `source_path` is where the template was read from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LoadedTemplate {
    name: String,
    source_path: PathBuf,
}

impl LoadedTemplate {
    pub fn new(name: impl Into<String>, source_path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            source_path: source_path.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }
}

/// Deletes a fixed substring from output file names in directory mode.
///
/// Only the final path component is touched; directory names are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilenameTransform {
    delete: Option<String>,
}

impl FilenameTransform {
    pub fn new(delete: Option<String>) -> Self {
        Self {
            delete: delete.filter(|s| !s.is_empty()),
        }
    }

    pub fn apply(&self, rel_path: &Path) -> PathBuf {
        let Some(delete) = &self.delete else {
            return rel_path.to_path_buf();
        };
        match rel_path.file_name() {
            Some(name) => {
                let renamed = name.to_string_lossy().replace(delete.as_str(), "");
                rel_path.with_file_name(renamed)
            }
            None => rel_path.to_path_buf(),
        }
    }
}

/// Everything the engine needs for one render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderJob {
    pub template: LoadedTemplate,
    pub target: OutputTarget,
    pub metadata: PathMetadata,
}

impl RenderJob {
    /// Single-template job.
    ///
    /// `output` of `None` targets stdout; a file output must be absolute.
    /// `root` is the directory relative paths are computed against.
    pub fn single(
        template: LoadedTemplate,
        output: Option<&Path>,
        root: &Path,
    ) -> Result<Self, DomainError> {
        match output {
            None => Ok(Self {
                template,
                target: OutputTarget::Stdout,
                metadata: PathMetadata::for_stdout(root),
            }),
            Some(path) => {
                let path = normalize(path);
                Ok(Self {
                    metadata: PathMetadata::for_file(&path, root)?,
                    target: OutputTarget::File(path),
                    template,
                })
            }
        }
    }

    /// Directory-mode job: the template at `rel_path` under the template
    /// root renders to the same relative location under `output_root`.
    pub fn in_tree(
        template: LoadedTemplate,
        rel_path: &Path,
        output_root: &Path,
        transform: &FilenameTransform,
    ) -> Result<Self, DomainError> {
        let output = normalize(&output_root.join(transform.apply(rel_path)));
        Ok(Self {
            metadata: PathMetadata::for_file(&output, output_root)?,
            target: OutputTarget::File(output),
            template,
        })
    }
}
