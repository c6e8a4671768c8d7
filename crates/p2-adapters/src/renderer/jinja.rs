//! MiniJinja-backed template evaluator.

use std::{error::Error as _, io::Write, path::PathBuf, sync::Arc};

use minijinja::{
    AutoEscape, Environment, Error, ErrorKind, State,
    value::{Enumerator, Object, Value},
};
use tracing::{debug, instrument};

use p2_core::application::{
    EvaluationError, EvaluationErrorKind, FilterError, RenderScope, ports::TemplateEvaluator,
};
use p2_core::domain::{InputData, LoadedTemplate, PathMetadata};

use super::{filters, scripting::ScriptingMode};

/// Name of the reserved context key holding path metadata.
pub const P2_NAMESPACE: &str = "p2";

/// How the evaluator is set up for a run.
#[derive(Debug, Clone, Default)]
pub struct EvaluatorOptions {
    /// HTML-escape every expression result.
    pub autoescape: bool,
    /// Directory that `include`/`extends`/`import` resolve against.
    pub loader_root: Option<PathBuf>,
    pub scripting: ScriptingMode,
}

pub struct MiniJinjaEvaluator {
    env: Environment<'static>,
}

impl MiniJinjaEvaluator {
    pub fn new(options: EvaluatorOptions) -> Self {
        let mut env = Environment::new();
        env.set_keep_trailing_newline(true);

        let escape = if options.autoescape {
            AutoEscape::Html
        } else {
            AutoEscape::None
        };
        env.set_auto_escape_callback(move |_| escape.clone());

        if let Some(root) = &options.loader_root {
            env.set_loader(minijinja::path_loader(root));
        }

        filters::register(&mut env);
        options.scripting.register(&mut env);

        debug!(
            autoescape = options.autoescape,
            loader_root = ?options.loader_root,
            scripting = ?options.scripting,
            "Template environment ready"
        );
        Self { env }
    }
}

impl Default for MiniJinjaEvaluator {
    fn default() -> Self {
        Self::new(EvaluatorOptions::default())
    }
}

impl TemplateEvaluator for MiniJinjaEvaluator {
    #[instrument(skip_all, fields(template = template.name()))]
    fn compile(
        &mut self,
        template: &LoadedTemplate,
        source: String,
    ) -> Result<(), EvaluationError> {
        self.env
            .add_template_owned(template.name().to_owned(), source)
            .map_err(evaluation_error)
    }

    fn render(
        &self,
        template: &LoadedTemplate,
        scope: RenderScope,
        data: &InputData,
        out: &mut dyn Write,
    ) -> Result<(), EvaluationError> {
        let compiled = self
            .env
            .get_template(template.name())
            .map_err(evaluation_error)?;
        compiled
            .render_captured_to(build_context(scope, data), out)
            .map_err(evaluation_error)?;
        Ok(())
    }
}

/// Input data plus the `p2` namespace.
///
/// A `p2` key in the input never reaches the template; the namespace wins.
fn build_context(scope: RenderScope, data: &InputData) -> Value {
    let namespace = Value::from_object(P2Namespace { scope });
    data.iter()
        .filter(|(key, _)| key.as_str() != P2_NAMESPACE)
        .map(|(key, value)| (key.clone(), Value::from_serialize(value)))
        .chain(std::iter::once((P2_NAMESPACE.to_owned(), namespace)))
        .collect()
}

/// The `p2` object seen by templates.
///
/// Reads like a flat string map of path metadata. Filters downcast it to
/// reach the render scope of the output being written.
#[derive(Debug)]
pub struct P2Namespace {
    scope: RenderScope,
}

impl P2Namespace {
    pub fn scope(&self) -> &RenderScope {
        &self.scope
    }
}

impl Object for P2Namespace {
    fn get_value(self: &Arc<Self>, key: &Value) -> Option<Value> {
        self.scope.metadata().get(key.as_str()?).map(Value::from)
    }

    fn enumerate(self: &Arc<Self>) -> Enumerator {
        Enumerator::Str(PathMetadata::KEYS)
    }
}

/// Scope of the render a filter is running in.
pub(crate) fn current_scope(state: &State, filter: &'static str) -> Result<Arc<P2Namespace>, Error> {
    state
        .lookup(P2_NAMESPACE)
        .and_then(|value| value.downcast_object::<P2Namespace>())
        .ok_or_else(|| filter_failure(FilterError::lookup(filter, "render scope is not available")))
}

/// Wrap a typed filter failure so it survives the trip through the evaluator.
pub(crate) fn filter_failure(err: FilterError) -> Error {
    Error::new(ErrorKind::InvalidOperation, err.to_string()).with_source(err)
}

fn evaluation_error(err: Error) -> EvaluationError {
    let kind = match find_filter_error(&err) {
        Some(filter) => EvaluationErrorKind::Filter(filter.kind),
        None => match err.kind() {
            ErrorKind::SyntaxError => EvaluationErrorKind::Syntax,
            ErrorKind::WriteFailure => EvaluationErrorKind::Io,
            _ => EvaluationErrorKind::Runtime,
        },
    };
    EvaluationError::new(kind, err.to_string())
}

fn find_filter_error(err: &Error) -> Option<&FilterError> {
    let mut source = err.source();
    while let Some(current) = source {
        if let Some(filter) = current.downcast_ref::<FilterError>() {
            return Some(filter);
        }
        source = current.source();
    }
    None
}


/// Helpers shared by the renderer test modules.
#[cfg(test)]
pub(crate) mod test_support {
    use std::{path::Path, sync::Arc};

    use super::*;
    use crate::output::DetachedAttributes;
    use p2_core::application::ports::FileAttributes;
    use p2_core::domain::OutputTarget;

    pub fn data() -> InputData {
        let mut data = InputData::new();
        data.insert("name", "Sally");
        data
    }

    pub fn stdout_scope() -> RenderScope {
        RenderScope::new(
            OutputTarget::Stdout,
            PathMetadata::for_stdout(Path::new("/cwd")),
            "/cwd",
            Arc::new(DetachedAttributes),
        )
    }

    pub fn file_scope(output: &str, root: &str) -> RenderScope {
        file_scope_with(output, root, Arc::new(DetachedAttributes))
    }

    pub fn file_scope_with(
        output: &str,
        root: &str,
        attributes: Arc<dyn FileAttributes>,
    ) -> RenderScope {
        let output = Path::new(output);
        let base_dir = output.parent().unwrap_or(Path::new("/")).to_path_buf();
        RenderScope::new(
            OutputTarget::File(output.to_path_buf()),
            PathMetadata::for_file(output, Path::new(root)).unwrap(),
            base_dir,
            attributes,
        )
    }

    pub fn compile(evaluator: &mut MiniJinjaEvaluator, name: &str, source: &str) -> LoadedTemplate {
        let template = LoadedTemplate::new(name, name);
        evaluator.compile(&template, source.to_owned()).unwrap();
        template
    }

    pub fn render(
        evaluator: &MiniJinjaEvaluator,
        template: &LoadedTemplate,
        scope: RenderScope,
        data: &InputData,
    ) -> String {
        let mut out = Vec::new();
        evaluator.render(template, scope, data, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }
}
