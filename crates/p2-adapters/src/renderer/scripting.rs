//! Opt-in filters that let a template touch the filesystem.
//!
//! Relative paths resolve against the render scope's base directory: the
//! output file's directory in directory mode, the working directory
//! otherwise.

use std::{fmt, str::FromStr};

use minijinja::{
    Environment, Error, State,
    value::{Rest, Value},
};
use thiserror::Error as ThisError;
use tracing::debug;

use p2_core::application::FilterError;

use super::jinja::{current_scope, filter_failure};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptingFilter {
    WriteFile,
    MakeDirs,
}

impl ScriptingFilter {
    pub const ALL: [ScriptingFilter; 2] = [Self::WriteFile, Self::MakeDirs];

    pub fn name(self) -> &'static str {
        match self {
            Self::WriteFile => "write_file",
            Self::MakeDirs => "make_dirs",
        }
    }
}

impl fmt::Display for ScriptingFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
#[error("unknown filter '{0}' (available: write_file, make_dirs)")]
pub struct UnknownScriptingFilter(pub String);

impl FromStr for ScriptingFilter {
    type Err = UnknownScriptingFilter;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|filter| filter.name() == s.trim())
            .ok_or_else(|| UnknownScriptingFilter(s.to_owned()))
    }
}

/// Which scripting filters are registered, and how.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ScriptingMode {
    #[default]
    Disabled,
    /// Only the listed filters, with real side effects.
    Enabled(Vec<ScriptingFilter>),
    /// Every scripting filter, passing its input through untouched.
    Noop,
}

impl ScriptingMode {
    /// Resolve command-line style options. `noop` supersedes `names`.
    pub fn from_options<S: AsRef<str>>(
        names: &[S],
        noop: bool,
    ) -> Result<Self, UnknownScriptingFilter> {
        if noop {
            return Ok(Self::Noop);
        }
        let mut filters = Vec::new();
        for name in names.iter().map(AsRef::as_ref).filter(|n| !n.trim().is_empty()) {
            let filter = name.parse::<ScriptingFilter>()?;
            if !filters.contains(&filter) {
                filters.push(filter);
            }
        }
        Ok(if filters.is_empty() {
            Self::Disabled
        } else {
            Self::Enabled(filters)
        })
    }

    pub(crate) fn register(&self, env: &mut Environment<'static>) {
        match self {
            Self::Disabled => {}
            Self::Enabled(filters) => {
                for filter in filters {
                    match filter {
                        ScriptingFilter::WriteFile => env.add_filter("write_file", write_file),
                        ScriptingFilter::MakeDirs => env.add_filter("make_dirs", make_dirs),
                    }
                }
            }
            Self::Noop => {
                for filter in ScriptingFilter::ALL {
                    env.add_filter(filter.name(), passthrough);
                }
            }
        }
    }
}

fn passthrough(value: Value, _args: Rest<Value>) -> Value {
    value
}

/// `content | write_file(filename)`: write `content` and pass it on.
fn write_file(state: &State, content: Value, filename: Value) -> Result<Value, Error> {
    const NAME: &str = "write_file";
    let text = content
        .as_str()
        .ok_or_else(|| filter_failure(FilterError::validation(NAME, "input must be a string")))?;
    let filename = filename.as_str().ok_or_else(|| {
        filter_failure(FilterError::validation(NAME, "filename must be a string"))
    })?;

    let path = current_scope(state, NAME)?.scope().resolve(filename);
    std::fs::write(&path, text).map_err(|e| {
        filter_failure(FilterError::io(
            NAME,
            format!("could not write {}: {e}", path.display()),
        ))
    })?;
    debug!(path = %path.display(), bytes = text.len(), "write_file");
    Ok(content)
}

/// `content | make_dirs(dirname)`: create `dirname` and parents, pass `content` on.
fn make_dirs(state: &State, content: Value, dirname: Value) -> Result<Value, Error> {
    const NAME: &str = "make_dirs";
    let dirname = dirname.as_str().ok_or_else(|| {
        filter_failure(FilterError::validation(NAME, "directory name must be a string"))
    })?;

    let path = current_scope(state, NAME)?.scope().resolve(dirname);
    std::fs::create_dir_all(&path).map_err(|e| {
        filter_failure(FilterError::io(
            NAME,
            format!("could not create {}: {e}", path.display()),
        ))
    })?;
    debug!(path = %path.display(), "make_dirs");
    Ok(content)
}
