//! Template Engine - executes exactly one render.
//!
//! 1. Ask the output sink for a destination
//! 2. Build the render scope (target, `p2` metadata, base dir, attributes)
//! 3. Run the evaluator against the input data and the prepared writer
//! 4. Always finalize the destination once it was prepared

use tracing::{debug, error, instrument};

use crate::{
    application::{
        ApplicationError,
        ports::{OutputSink, TemplateEvaluator},
        scope::RenderScope,
    },
    domain::{InputData, LoadedTemplate, RenderJob},
};

/// Binds one evaluator to one output sink.
pub struct TemplateEngine {
    evaluator: Box<dyn TemplateEvaluator>,
    sink: Box<dyn OutputSink>,
}

impl TemplateEngine {
    pub fn new(evaluator: Box<dyn TemplateEvaluator>, sink: Box<dyn OutputSink>) -> Self {
        Self { evaluator, sink }
    }

    /// Compile a template so later jobs can reference it.
    pub fn load(&mut self, template: &LoadedTemplate, source: String) -> Result<(), ApplicationError> {
        self.evaluator
            .compile(template, source)
            .map_err(|source| ApplicationError::TemplateLoad {
                template: template.source_path().to_path_buf(),
                source,
            })
    }

    /// Render one job.
    ///
    /// A render error takes precedence over a finalize error; the latter is
    /// then logged. A finalize error after a clean render is returned as
    /// [`ApplicationError::Finalization`].
    #[instrument(
        skip_all,
        fields(
            template = %job.template.source_path().display(),
            output = %job.target
        )
    )]
    pub fn execute(&self, job: &RenderJob, data: &InputData) -> Result<(), ApplicationError> {
        let template = job.template.source_path().to_path_buf();
        let output = job.target.to_string();

        let mut prepared =
            self.sink
                .prepare(&job.target)
                .map_err(|source| ApplicationError::OutputPreparation {
                    template: template.clone(),
                    output: output.clone(),
                    source,
                })?;

        let scope = RenderScope::new(
            job.target.clone(),
            job.metadata.clone(),
            prepared.base_dir(),
            prepared.attributes(),
        );

        let rendered = self
            .evaluator
            .render(&job.template, scope, data, prepared.writer());
        let finalized = prepared.finalize();

        match (rendered, finalized) {
            (Ok(()), Ok(())) => {
                debug!("Template rendered");
                Ok(())
            }
            (Ok(()), Err(source)) => Err(ApplicationError::Finalization {
                template,
                output,
                source,
            }),
            (Err(source), finalized) => {
                if let Err(finalize_error) = finalized {
                    error!(error = %finalize_error, "Finalizing output failed after render error");
                }
                Err(ApplicationError::Render {
                    template,
                    output,
                    source,
                })
            }
        }
    }

    /// End-of-batch hook on the sink.
    pub fn finish(&self) -> Result<(), ApplicationError> {
        self.sink.finish().map_err(ApplicationError::SinkFinish)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::{
        error::{EvaluationError, EvaluationErrorKind, OutputError},
        ports::{MockFileAttributes, MockOutputSink, PreparedOutput},
    };
    use crate::domain::{OutputTarget, PathMetadata};
    use std::{
        io::Write,
        path::Path,
        sync::{Arc, Mutex},
    };

    /// Evaluator that writes `body` (or fails) and records what it saw.
    struct FakeEvaluator {
        body: &'static str,
        fail: bool,
        seen: Arc<Mutex<Vec<String>>>,
    }

    impl TemplateEvaluator for FakeEvaluator {
        fn compile(
            &mut self,
            _template: &LoadedTemplate,
            source: String,
        ) -> Result<(), EvaluationError> {
            if source.contains("{%") {
                return Err(EvaluationError::new(EvaluationErrorKind::Syntax, "unclosed block"));
            }
            Ok(())
        }

        fn render(
            &self,
            _template: &LoadedTemplate,
            scope: RenderScope,
            _data: &InputData,
            out: &mut dyn Write,
        ) -> Result<(), EvaluationError> {
            self.seen
                .lock()
                .unwrap()
                .push(format!("{}|{}", scope.metadata().output_rel_path(), scope.base_dir().display()));
            out.write_all(self.body.as_bytes())
                .map_err(|e| EvaluationError::new(EvaluationErrorKind::Io, e.to_string()))?;
            if self.fail {
                return Err(EvaluationError::new(EvaluationErrorKind::Runtime, "undefined"));
            }
            Ok(())
        }
    }

    fn evaluator(fail: bool) -> (Box<FakeEvaluator>, Arc<Mutex<Vec<String>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let eval = FakeEvaluator {
            body: "rendered",
            fail,
            seen: Arc::clone(&seen),
        };
        (Box::new(eval), seen)
    }

    fn job() -> RenderJob {
        RenderJob {
            template: LoadedTemplate::new("a.conf", "/t/a.conf"),
            target: OutputTarget::File("/out/a.conf".into()),
            metadata: PathMetadata::for_file(Path::new("/out/a.conf"), Path::new("/out")).unwrap(),
        }
    }

    /// Sink whose destination records bytes and reports finalize calls.
    fn recording_sink(
        finalize_result: Result<(), OutputError>,
    ) -> (MockOutputSink, Arc<Mutex<Vec<u8>>>, Arc<Mutex<u32>>) {
        let bytes = Arc::new(Mutex::new(Vec::new()));
        let finalized = Arc::new(Mutex::new(0));
        let mut sink = MockOutputSink::new();
        let (b, f) = (Arc::clone(&bytes), Arc::clone(&finalized));
        sink.expect_prepare().times(1).returning(move |_| {
            let (b, f, result) = (Arc::clone(&b), Arc::clone(&f), finalize_result.clone());
            Ok(PreparedOutput::new(
                Box::new(SharedVec(b)),
                "/out",
                Arc::new(MockFileAttributes::new()),
            )
            .with_finalizer(move || {
                *f.lock().unwrap() += 1;
                result
            }))
        });
        (sink, bytes, finalized)
    }

    struct SharedVec(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedVec {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn successful_render_writes_and_finalizes() {
        let (eval, seen) = evaluator(false);
        let (sink, bytes, finalized) = recording_sink(Ok(()));
        let engine = TemplateEngine::new(eval, Box::new(sink));

        engine.execute(&job(), &InputData::new()).unwrap();

        assert_eq!(bytes.lock().unwrap().as_slice(), b"rendered");
        assert_eq!(*finalized.lock().unwrap(), 1);
        assert_eq!(seen.lock().unwrap().as_slice(), ["a.conf|/out"]);
    }

    #[test]
    fn render_error_still_finalizes_and_names_paths() {
        let (eval, _) = evaluator(true);
        let (sink, bytes, finalized) = recording_sink(Ok(()));
        let engine = TemplateEngine::new(eval, Box::new(sink));

        let err = engine.execute(&job(), &InputData::new()).unwrap_err();

        assert!(matches!(err, ApplicationError::Render { .. }));
        assert!(err.to_string().contains("/t/a.conf"));
        assert!(err.to_string().contains("/out/a.conf"));
        // Partial output stays where it was written.
        assert_eq!(bytes.lock().unwrap().as_slice(), b"rendered");
        assert_eq!(*finalized.lock().unwrap(), 1);
    }

    #[test]
    fn render_error_takes_precedence_over_finalize_error() {
        let (eval, _) = evaluator(true);
        let (sink, _, finalized) =
            recording_sink(Err(OutputError::new("close", "/out/a.conf", "disk full")));
        let engine = TemplateEngine::new(eval, Box::new(sink));

        let err = engine.execute(&job(), &InputData::new()).unwrap_err();
        assert!(matches!(err, ApplicationError::Render { .. }));
        assert_eq!(*finalized.lock().unwrap(), 1);
    }

    #[test]
    fn finalize_error_after_clean_render_is_reported() {
        let (eval, _) = evaluator(false);
        let (sink, _, _) = recording_sink(Err(OutputError::new("close", "/out/a.conf", "disk full")));
        let engine = TemplateEngine::new(eval, Box::new(sink));

        let err = engine.execute(&job(), &InputData::new()).unwrap_err();
        assert!(matches!(err, ApplicationError::Finalization { .. }));
    }

    #[test]
    fn preparation_failure_skips_render() {
        let (eval, seen) = evaluator(false);
        let mut sink = MockOutputSink::new();
        sink.expect_prepare()
            .times(1)
            .returning(|_| Err(OutputError::new("open", "/out/a.conf", "permission denied")));
        let engine = TemplateEngine::new(eval, Box::new(sink));

        let err = engine.execute(&job(), &InputData::new()).unwrap_err();
        assert!(matches!(err, ApplicationError::OutputPreparation { .. }));
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn load_maps_syntax_errors() {
        let (eval, _) = evaluator(false);
        let mut engine = TemplateEngine::new(eval, Box::new(MockOutputSink::new()));
        let template = LoadedTemplate::new("bad", "/t/bad");

        let err = engine.load(&template, "{% if".into()).unwrap_err();
        assert!(matches!(err, ApplicationError::TemplateLoad { .. }));
        assert!(engine.load(&template, "fine".into()).is_ok());
    }
}
