//! CLI command handler: layer options, build the pipeline and run input lines through it.

use anyhow::{Context, Result};
use log::debug;

use crate::Opts;
use crate::engine::arg_parser::Cli;
use crate::engine::io::{FileReader, FileWriter};
use crate::engine::progress::{create_progress_bar, executor_progress_hook, refresh_bar};
use crate::engine::registry::Registry;
use crate::engine::stages::InputHeaders;
use crate::pipeline::{ExtractStage, PipelineContext};
use crate::utils::config::{EnvKeys, env_flag, env_or};
use crate::utils::{apply_file_to_opts, load_streamline_toml, set_verbose, setup_logging};

/// Defaults, then environment, then `.streamline.toml` in the working directory, then flags.
/// Logging is up first so a broken settings file is reported, not silently skipped.
pub fn setup_opts(cli: &Cli) -> Result<Opts> {
    setup_logging(cli.verbose.unwrap_or(false));
    let mut opts = Opts {
        workers: env_or(EnvKeys::WORKER_COUNT, Opts::default().workers),
        closing_newline: env_flag(EnvKeys::CLOSING_NEWLINE),
        ..Opts::default()
    };
    if let Ok(cwd) = std::env::current_dir()
        && let Some(file) = load_streamline_toml(&cwd)
    {
        apply_file_to_opts(&file, &mut opts);
    }

    opts.input = cli.input.clone();
    opts.output = cli.output.clone();
    if let Some(workers) = cli.workers {
        opts.workers = workers;
    }
    if let Some(ref raw) = cli.error_value {
        opts.error_value = serde_json::from_str(raw)
            .with_context(|| format!("--error-value must be JSON, got {raw:?}"))?;
    }
    if let Some(rendering) = cli.error_rendering() {
        opts.error_rendering = rendering;
    }
    if let Some(ref path) = cli.extract {
        opts.extract = Some(path.clone());
    }
    opts.headers = cli.headers.unwrap_or(opts.headers);
    opts.progress = cli.progress.unwrap_or(opts.progress);
    opts.keep_trailing_newline = cli.keep_trailing_newline.unwrap_or(opts.keep_trailing_newline);
    opts.closing_newline = cli.closing_newline.unwrap_or(opts.closing_newline);
    opts.verbose = cli.verbose.unwrap_or(opts.verbose);
    set_verbose(opts.verbose);
    Ok(opts)
}

/// Build the pipeline from the stage tokens and stream input to output.
pub fn handle_run(cli: &Cli) -> Result<()> {
    let opts = setup_opts(cli)?;
    debug!(
        "{} CONFIG:{:#?}",
        env!("CARGO_PKG_NAME").to_uppercase(),
        opts
    );

    let registry = Registry::with_builtins();
    if cli.list_stages {
        for name in registry.names() {
            println!("{name}");
        }
        return Ok(());
    }

    let mut ctx = PipelineContext::from_opts(&opts)?;
    let bar = opts.progress.then(|| create_progress_bar("handler calls"));
    if let Some(ref bar) = bar {
        ctx = ctx.with_progress(executor_progress_hook(bar));
    }

    let mut pipeline = registry.build_pipeline(cli.stages.as_slice(), ctx)?;
    if let Some(ref path) = opts.extract {
        pipeline.push_stage(Box::new(ExtractStage::new(path)));
    }
    if opts.headers {
        pipeline.push_stage(Box::new(InputHeaders::default()));
    }

    let mut reader = FileReader::new(&opts.input, opts.error_value.clone())
        .keep_trailing_newline(opts.keep_trailing_newline);
    let mut writer = FileWriter::new(&opts.output).closing_newline(opts.closing_newline);
    let count = pipeline.run(&mut reader, Some(&mut writer))?;

    if let Some(ref bar) = bar {
        refresh_bar(bar);
        eprintln!();
    }
    debug!("Wrote {} entries", count);
    Ok(())
}
