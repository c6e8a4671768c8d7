//! Path metadata exposed to templates under the reserved `p2` namespace.
//!
//! Computed once per render job by the batch driver. All five fields switch
//! to sentinel/root values together when output goes to standard output.

use std::path::{Component, Path, PathBuf};

use serde::Serialize;

use super::error::DomainError;

/// Marker used in place of a real path when output targets stdout.
pub const STDOUT_SENTINEL: &str = "<stdout>";

/// The flat string map a template sees as `p2`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PathMetadata {
    output_path: String,
    output_name: String,
    output_dir: String,
    output_rel_path: String,
    output_rel_dir: String,
}

impl PathMetadata {
    /// Template-visible key names, in declaration order.
    pub const KEYS: &'static [&'static str] = &[
        "OutputPath",
        "OutputName",
        "OutputDir",
        "OutputRelPath",
        "OutputRelDir",
    ];

    /// Metadata for a render whose output is standard output.
    ///
    /// `OutputDir` is the root directory and `OutputRelDir` is `"."`; the
    /// remaining fields carry [`STDOUT_SENTINEL`].
    pub fn for_stdout(root: &Path) -> Self {
        Self {
            output_path: STDOUT_SENTINEL.into(),
            output_name: STDOUT_SENTINEL.into(),
            output_dir: display(root),
            output_rel_path: STDOUT_SENTINEL.into(),
            output_rel_dir: ".".into(),
        }
    }

    /// Metadata for a render writing the file `output`, relative to `root`.
    pub fn for_file(output: &Path, root: &Path) -> Result<Self, DomainError> {
        let output = normalize(output);
        let name = output
            .file_name()
            .ok_or_else(|| DomainError::MissingFileName {
                path: output.clone(),
            })?;
        let dir = output.parent().unwrap_or_else(|| Path::new("."));

        Ok(Self {
            output_name: name.to_string_lossy().into_owned(),
            output_dir: display(dir),
            output_rel_path: display(&relative_path(root, &output)?),
            output_rel_dir: display(&relative_path(root, dir)?),
            output_path: display(&output),
        })
    }

    pub fn output_path(&self) -> &str {
        &self.output_path
    }

    pub fn output_name(&self) -> &str {
        &self.output_name
    }

    pub fn output_dir(&self) -> &str {
        &self.output_dir
    }

    pub fn output_rel_path(&self) -> &str {
        &self.output_rel_path
    }

    pub fn output_rel_dir(&self) -> &str {
        &self.output_rel_dir
    }

    /// Look a field up by its template-visible name.
    pub fn get(&self, key: &str) -> Option<&str> {
        match key {
            "OutputPath" => Some(&self.output_path),
            "OutputName" => Some(&self.output_name),
            "OutputDir" => Some(&self.output_dir),
            "OutputRelPath" => Some(&self.output_rel_path),
            "OutputRelDir" => Some(&self.output_rel_dir),
            _ => None,
        }
    }

    pub fn is_stdout(&self) -> bool {
        self.output_path == STDOUT_SENTINEL
    }

    /// `(key, value)` pairs in [`Self::KEYS`] order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        Self::KEYS
            .iter()
            .filter_map(|key| self.get(key).map(|value| (*key, value)))
    }
}

fn display(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Lexically clean a path: drop `.` components and fold `..` into its parent.
///
/// Never touches the filesystem, so symlinks are not resolved. An empty
/// result becomes `"."`.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                // `/..` is `/`
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

/// Express `path` relative to `root`, climbing with `..` where needed.
///
/// Both paths must be absolute, or both relative. Equal paths yield `"."`.
pub fn relative_path(root: &Path, path: &Path) -> Result<PathBuf, DomainError> {
    let not_relative = || DomainError::NotRelative {
        path: path.to_path_buf(),
        root: root.to_path_buf(),
    };

    if root.is_absolute() != path.is_absolute() {
        return Err(not_relative());
    }

    let root_norm = normalize(root);
    let path_norm = normalize(path);
    let root_parts: Vec<Component<'_>> = root_norm
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect();
    let path_parts: Vec<Component<'_>> = path_norm
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect();

    let common = root_parts
        .iter()
        .zip(&path_parts)
        .take_while(|(a, b)| a == b)
        .count();

    // Differing drive prefixes, or a root that climbs above where we can see.
    if (common == 0 && root_norm.has_root())
        || root_parts[common..]
            .iter()
            .any(|c| !matches!(c, Component::Normal(_)))
    {
        return Err(not_relative());
    }

    let mut rel = PathBuf::new();
    for _ in &root_parts[common..] {
        rel.push("..");
    }
    for component in &path_parts[common..] {
        rel.push(component.as_os_str());
    }
    if rel.as_os_str().is_empty() {
        rel.push(".");
    }
    Ok(rel)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stdout_metadata_switches_all_fields_together() {
        let meta = PathMetadata::for_stdout(Path::new("/work"));
        assert!(meta.is_stdout());
        assert_eq!(meta.output_path(), STDOUT_SENTINEL);
        assert_eq!(meta.output_name(), STDOUT_SENTINEL);
        assert_eq!(meta.output_rel_path(), STDOUT_SENTINEL);
        assert_eq!(meta.output_dir(), "/work");
        assert_eq!(meta.output_rel_dir(), ".");
    }

    #[test]
    fn file_metadata_in_a_tree() {
        let meta = PathMetadata::for_file(
            Path::new("/out/dir1/dir2/template2"),
            Path::new("/out"),
        )
        .unwrap();
        assert_eq!(meta.output_path(), "/out/dir1/dir2/template2");
        assert_eq!(meta.output_name(), "template2");
        assert_eq!(meta.output_dir(), "/out/dir1/dir2");
        assert_eq!(meta.output_rel_path(), "dir1/dir2/template2");
        assert_eq!(meta.output_rel_dir(), "dir1/dir2");
        assert!(!meta.is_stdout());
    }

    #[test]
    fn file_directly_under_root_has_dot_rel_dir() {
        let meta = PathMetadata::for_file(Path::new("/out/a.txt"), Path::new("/out")).unwrap();
        assert_eq!(meta.output_rel_dir(), ".");
        assert_eq!(meta.output_rel_path(), "a.txt");
    }

    #[test]
    fn file_outside_root_climbs() {
        let meta =
            PathMetadata::for_file(Path::new("/srv/conf/app.conf"), Path::new("/home/me")).unwrap();
        assert_eq!(meta.output_rel_path(), "../../srv/conf/app.conf");
        assert_eq!(meta.output_rel_dir(), "../../srv/conf");
    }

    #[test]
    fn keys_and_serialization_agree() {
        let meta = PathMetadata::for_file(Path::new("/o/x"), Path::new("/o")).unwrap();
        let json = serde_json::to_value(&meta).unwrap();
        let object = json.as_object().unwrap();
        assert_eq!(object.len(), PathMetadata::KEYS.len());
        for (key, value) in meta.iter() {
            assert_eq!(object[key], value);
        }
    }

    #[test]
    fn normalize_folds_dots() {
        assert_eq!(normalize(Path::new("/a/./b/../c")), PathBuf::from("/a/c"));
        assert_eq!(normalize(Path::new("/..")), PathBuf::from("/"));
        assert_eq!(normalize(Path::new("a/../..")), PathBuf::from(".."));
        assert_eq!(normalize(Path::new("./")), PathBuf::from("."));
    }

    #[test]
    fn relative_path_cases() {
        assert_eq!(
            relative_path(Path::new("/a"), Path::new("/a")).unwrap(),
            PathBuf::from(".")
        );
        assert_eq!(
            relative_path(Path::new("/a/b"), Path::new("/a/c/d")).unwrap(),
            PathBuf::from("../c/d")
        );
        assert!(relative_path(Path::new("/a"), Path::new("b")).is_err());
        assert!(relative_path(Path::new("../x"), Path::new("y")).is_err());
    }
}
