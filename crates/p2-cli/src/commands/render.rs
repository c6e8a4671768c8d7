//! The render command.
//!
//! Responsibility: assemble the input data, discover templates, turn them
//! into render jobs, choose the output sink and hand everything to the
//! core `BatchService`. No rendering logic lives here.

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use tracing::{debug, info, instrument};

use p2_adapters::{
    DiscoveredTemplate, FileSink, FilesystemTemplateLoader, StdoutSink, TarSink, TreeSink,
    input::{self, InputSpec},
    renderer::{EvaluatorOptions, MiniJinjaEvaluator, ScriptingMode},
};
use p2_core::domain::normalize;
use p2_core::prelude::*;

use crate::{
    cli::{RenderArgs, STDOUT_ARG},
    config::AppConfig,
    error::{CliError, CliResult, IntoCli},
    output::OutputManager,
};

/// Templates to compile and the jobs that render them.
#[derive(Debug)]
struct RenderPlan {
    templates: Vec<DiscoveredTemplate>,
    jobs: Vec<RenderJob>,
    /// Directory output paths are made relative to.
    output_root: PathBuf,
    /// Leading path for tar entry names.
    tar_prefix: Option<PathBuf>,
}

/// Execute a render run.
///
/// Dispatch sequence:
/// 1. Resolve and load the input data
/// 2. Resolve evaluator settings from flags and config
/// 3. Plan jobs for single or directory mode
/// 4. Build the output sink
/// 5. Compile every template, then run the batch
#[instrument(skip_all, fields(template = %args.template.display()))]
pub fn execute(args: RenderArgs, config: AppConfig, output: OutputManager) -> CliResult<()> {
    let cwd = std::env::current_dir().with_cli_context(|| "reading the working directory")?;

    // 1. Input data
    let spec = InputSpec::resolve(&args.format, args.input.as_deref(), args.use_env_key)?;
    let data = input::load(&spec, args.include_env)?;
    if args.debug {
        output.header("Input data:")?;
        output.print(&data.to_pretty_json())?;
    }

    // 2. Evaluator settings
    let scripting = scripting_mode(&args, &config)?;
    let default_mode = config
        .tar
        .mode()
        .with_cli_context(|| "tar.default_mode")?;

    // 3. Plan
    let loader = FilesystemTemplateLoader::new(normalize(&cwd.join(&args.template)));
    let plan = if args.directory_mode {
        plan_tree(&args, &loader, &cwd)?
    } else {
        plan_single(&args, &loader, &cwd)?
    };
    debug!(
        jobs = plan.jobs.len(),
        output_root = %plan.output_root.display(),
        "Render plan ready"
    );

    // 4. Sink
    let sink = build_sink(&args, &plan, &cwd, default_mode)?;

    // 5. Compile + render
    let evaluator = MiniJinjaEvaluator::new(EvaluatorOptions {
        autoescape: args.autoescape || config.render.autoescape,
        loader_root: Some(loader.include_root()),
        scripting,
    });
    let mut engine = TemplateEngine::new(Box::new(evaluator), sink);
    for discovered in plan.templates {
        engine.load(&discovered.template, discovered.source)?;
    }

    let report = BatchService::new(engine).run(&plan.jobs, &data);
    let total = report.total;
    let rendered = report.into_result()?;

    info!(rendered, total, "Render run finished");
    if args.directory_mode {
        output.success(&format!("Rendered {rendered} of {total} templates"))?;
    }
    Ok(())
}

/// Scripting filters from flags, falling back to the config file.
fn scripting_mode(args: &RenderArgs, config: &AppConfig) -> CliResult<ScriptingMode> {
    let names = if args.enable_filters.is_empty() {
        config.filters.names()
    } else {
        args.enable_filters.clone()
    };
    let noop = args.enable_noop_filters || config.filters.noop;
    Ok(ScriptingMode::from_options(&names, noop)?)
}

/// `-o` as an absolute path; `None` when absent or `-`.
fn output_path(args: &RenderArgs, cwd: &Path) -> Option<PathBuf> {
    args.output
        .as_deref()
        .filter(|o| !o.is_empty() && *o != STDOUT_ARG)
        .map(|o| normalize(&cwd.join(o)))
}

fn plan_single(
    args: &RenderArgs,
    loader: &FilesystemTemplateLoader,
    cwd: &Path,
) -> CliResult<RenderPlan> {
    let discovered = loader.load_file()?;

    // Tar entries need a file name even when nothing was given.
    let output = match output_path(args, cwd) {
        None if args.tar.is_some() => Some(cwd.join(discovered.template.name())),
        output => output,
    };

    let job = RenderJob::single(discovered.template.clone(), output.as_deref(), cwd)?;
    Ok(RenderPlan {
        templates: vec![discovered],
        jobs: vec![job],
        output_root: cwd.to_path_buf(),
        tar_prefix: None,
    })
}

fn plan_tree(
    args: &RenderArgs,
    loader: &FilesystemTemplateLoader,
    cwd: &Path,
) -> CliResult<RenderPlan> {
    let output_root = match output_path(args, cwd) {
        Some(root) => root,
        None if args.tar.is_some() => cwd.to_path_buf(),
        None => {
            return Err(CliError::InvalidArguments {
                message: "--directory-mode needs --output DIR (or --tar)".into(),
            });
        }
    };
    if args.tar.is_none() && !output_root.is_dir() {
        return Err(CliError::OutputDirectoryMissing { path: output_root });
    }

    let templates = loader.load_tree()?;
    let transform = FilenameTransform::new(args.filename_substr_del.clone());
    let jobs = templates
        .iter()
        .map(|t| RenderJob::in_tree(t.template.clone(), &t.rel_path, &output_root, &transform))
        .collect::<Result<Vec<_>, _>>()?;

    let tar_prefix = args
        .output
        .as_deref()
        .filter(|o| !o.is_empty() && *o != STDOUT_ARG)
        .map(PathBuf::from);

    Ok(RenderPlan {
        templates,
        jobs,
        output_root,
        tar_prefix,
    })
}

fn build_sink(
    args: &RenderArgs,
    plan: &RenderPlan,
    cwd: &Path,
    default_mode: u32,
) -> CliResult<Box<dyn OutputSink>> {
    if let Some(archive) = &args.tar {
        let writer: Box<dyn Write + Send> = if archive == STDOUT_ARG {
            Box::new(std::io::stdout())
        } else {
            let path = cwd.join(archive);
            let file = File::create(&path)
                .with_cli_context(|| format!("creating archive {}", path.display()))?;
            Box::new(BufWriter::new(file))
        };
        let sink = TarSink::new(writer, archive.clone(), plan.output_root.clone(), cwd)
            .with_prefix(plan.tar_prefix.clone())
            .with_default_mode(default_mode);
        return Ok(Box::new(sink));
    }

    if args.directory_mode {
        Ok(Box::new(TreeSink::new()))
    } else if plan.jobs.iter().all(|job| job.target.is_stdout()) {
        Ok(Box::new(StdoutSink::new(cwd)))
    } else {
        Ok(Box::new(FileSink::new(cwd)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;
    use std::fs;

    fn args(extra: &[&str]) -> RenderArgs {
        let mut argv = vec!["p2"];
        argv.extend_from_slice(extra);
        Cli::try_parse_from(argv).unwrap().render
    }

    #[test]
    fn dash_output_means_stdout() {
        let cwd = Path::new("/work");
        assert_eq!(output_path(&args(&["-t", "t", "-o", "-"]), cwd), None);
        assert_eq!(output_path(&args(&["-t", "t"]), cwd), None);
        assert_eq!(
            output_path(&args(&["-t", "t", "-o", "./conf/../app.conf"]), cwd),
            Some(PathBuf::from("/work/app.conf"))
        );
    }

    #[test]
    fn flags_override_configured_filters() {
        let mut config = AppConfig::default();
        config.filters.enabled = "make_dirs".into();

        let from_config = scripting_mode(&args(&["-t", "t"]), &config).unwrap();
        assert_eq!(
            from_config,
            ScriptingMode::Enabled(vec![p2_adapters::renderer::ScriptingFilter::MakeDirs])
        );

        let from_flags =
            scripting_mode(&args(&["-t", "t", "--enable-filters", "write_file"]), &config).unwrap();
        assert_eq!(
            from_flags,
            ScriptingMode::Enabled(vec![p2_adapters::renderer::ScriptingFilter::WriteFile])
        );

        let noop = scripting_mode(&args(&["-t", "t", "--enable-noop-filters"]), &config).unwrap();
        assert_eq!(noop, ScriptingMode::Noop);
    }

    #[test]
    fn unknown_filter_is_a_user_error() {
        let err = scripting_mode(
            &args(&["-t", "t", "--enable-filters", "write_file,exec"]),
            &AppConfig::default(),
        )
        .unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn single_tar_without_output_is_named_after_the_template() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("app.conf.j2"), "x").unwrap();

        let loader = FilesystemTemplateLoader::new(dir.path().join("app.conf.j2"));
        let plan =
            plan_single(&args(&["-t", "app.conf.j2", "--tar", "-"]), &loader, dir.path()).unwrap();
        assert_eq!(
            plan.jobs[0].target,
            OutputTarget::File(dir.path().join("app.conf.j2"))
        );
    }

    #[test]
    fn tree_needs_an_existing_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("templates")).unwrap();
        let loader = FilesystemTemplateLoader::new(dir.path().join("templates"));

        let missing = plan_tree(
            &args(&["-t", "templates", "--directory-mode", "-o", "out"]),
            &loader,
            dir.path(),
        )
        .unwrap_err();
        assert!(matches!(missing, CliError::OutputDirectoryMissing { .. }));

        let no_output =
            plan_tree(&args(&["-t", "templates", "--directory-mode"]), &loader, dir.path())
                .unwrap_err();
        assert!(matches!(no_output, CliError::InvalidArguments { .. }));
    }

    #[test]
    fn tree_with_tar_uses_output_as_prefix() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("templates/sub")).unwrap();
        fs::write(dir.path().join("templates/sub/a.tmpl"), "a").unwrap();
        let loader = FilesystemTemplateLoader::new(dir.path().join("templates"));

        let plan = plan_tree(
            &args(&[
                "-t",
                "templates",
                "--directory-mode",
                "-o",
                "etc",
                "--tar",
                "out.tar",
                "--directory-mode-filename-substr-del",
                ".tmpl",
            ]),
            &loader,
            dir.path(),
        )
        .unwrap();

        assert_eq!(plan.tar_prefix, Some(PathBuf::from("etc")));
        assert_eq!(plan.output_root, dir.path().join("etc"));
        assert_eq!(plan.jobs[0].metadata.output_rel_path(), "sub/a");
    }
}
