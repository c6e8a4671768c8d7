//! Template evaluation.
//!
//! [`MiniJinjaEvaluator`] implements the `TemplateEvaluator` port. The p2
//! filters live in [`filters`]; the opt-in filesystem filters in
//! [`scripting`].

pub mod filters;
mod jinja;
pub mod scripting;

pub use jinja::{EvaluatorOptions, MiniJinjaEvaluator, P2_NAMESPACE, P2Namespace};
pub use scripting::{ScriptingFilter, ScriptingMode, UnknownScriptingFilter};
