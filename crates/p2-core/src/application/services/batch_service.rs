//! Batch Service - drives the engine over every render job of a run.
//!
//! Best-effort semantics: a failing template is recorded and the batch
//! moves on. Renders are strictly sequential; each job is prepared,
//! rendered and finalized before the next one starts.

use std::path::PathBuf;

use tracing::{error, info, instrument, warn};

use crate::{
    application::{ApplicationError, services::TemplateEngine},
    domain::{InputData, RenderJob},
};

/// One template that did not render cleanly.
#[derive(Debug, Clone)]
pub struct BatchFailure {
    pub template: PathBuf,
    pub output: String,
    pub error: ApplicationError,
}

/// Outcome of a batch run.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub total: usize,
    pub rendered: usize,
    pub failures: Vec<BatchFailure>,
    /// Error from the sink's end-of-batch step, if any.
    pub finish_error: Option<ApplicationError>,
}

impl BatchReport {
    /// `true` only if every template rendered and the sink finished cleanly.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && self.finish_error.is_none()
    }

    /// Collapse the report into a single result.
    pub fn into_result(self) -> Result<usize, ApplicationError> {
        if !self.failures.is_empty() {
            return Err(ApplicationError::BatchFailed {
                failed: self.failures.len(),
                total: self.total,
            });
        }
        match self.finish_error {
            Some(err) => Err(err),
            None => Ok(self.rendered),
        }
    }
}

/// Runs render jobs through a [`TemplateEngine`].
pub struct BatchService {
    engine: TemplateEngine,
}

impl BatchService {
    pub fn new(engine: TemplateEngine) -> Self {
        Self { engine }
    }

    /// Render every job against `data`, then let the sink finish.
    #[instrument(skip_all, fields(jobs = jobs.len()))]
    pub fn run(&self, jobs: &[RenderJob], data: &InputData) -> BatchReport {
        let mut report = BatchReport {
            total: jobs.len(),
            ..BatchReport::default()
        };

        for job in jobs {
            match self.engine.execute(job, data) {
                Ok(()) => report.rendered += 1,
                Err(err) => {
                    error!(
                        error = %err,
                        template = %job.template.source_path().display(),
                        output = %job.target,
                        "Failed to execute template"
                    );
                    report.failures.push(BatchFailure {
                        template: job.template.source_path().to_path_buf(),
                        output: job.target.to_string(),
                        error: err,
                    });
                }
            }
        }

        if let Err(err) = self.engine.finish() {
            error!(error = %err, "Failed to complete output");
            report.finish_error = Some(err);
        }

        if report.failures.is_empty() {
            info!(rendered = report.rendered, "Batch completed");
        } else {
            warn!(
                failed = report.failures.len(),
                total = report.total,
                "Errors encountered during template processing"
            );
        }
        report
    }
}
