use clap::Parser;

use crate::ErrorRendering;
use crate::utils::config::StreamlineConsts;

struct DefaultArgs;

impl DefaultArgs {
    pub const INPUT: &'static str = StreamlineConsts::STDIO;
    pub const OUTPUT: &'static str = StreamlineConsts::STDIO;
}

/// Streaming line-by-line transformation pipelines.
#[derive(Clone, Parser)]
#[command(name = "streamline")]
#[command(
    about = "Run each input line through a chain of stages, e.g. `json 'doubled=shell(value, value.stdout)'`."
)]
pub struct Cli {
    /// Stages, in order: `name`, `name{key=value,...}` or `[target=]stage(input, output)`.
    #[arg(value_name = "STAGE")]
    pub stages: Vec<String>,

    /// Input file, `-` for stdin.
    #[arg(long, short = 'i', default_value = DefaultArgs::INPUT)]
    pub input: String,

    /// Output file, `-` for stdout. `{input}` in the name writes one file per input.
    #[arg(long, short = 'o', default_value = DefaultArgs::OUTPUT)]
    pub output: String,

    /// Max concurrent handler calls per stage. Default: STREAMLINE_WORKER_COUNT or 20.
    #[arg(long, short = 'w', value_parser = clap::value_parser!(usize))]
    pub workers: Option<usize>,

    /// Prefix every output with its original input line.
    #[arg(long, short = 'd', num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub headers: Option<bool>,

    /// Show a progress bar for handler stages.
    #[arg(long, short = 'p', num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub progress: Option<bool>,

    /// Render handler failures with their full diagnostic instead of the error value.
    #[arg(long, num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub stacktraces: Option<bool>,

    /// Value (JSON text) substituted for failed entries.
    #[arg(long)]
    pub error_value: Option<String>,

    /// Extract this path from every final value.
    #[arg(long, short = 'e')]
    pub extract: Option<String>,

    /// Emit a trailing empty entry when the input ends with a newline.
    #[arg(long, short = 'k', num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub keep_trailing_newline: Option<bool>,

    /// End the output with a newline.
    #[arg(long, num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub closing_newline: Option<bool>,

    /// List registered stage names and exit.
    #[arg(long)]
    pub list_stages: bool,

    /// Verbose output.
    #[arg(long, short = 'v', num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub verbose: Option<bool>,
}

impl Cli {
    /// `--stacktraces` selects full diagnostics; otherwise the configured rendering stands.
    pub fn error_rendering(&self) -> Option<ErrorRendering> {
        self.stacktraces
            .map(|on| if on { ErrorRendering::Trace } else { ErrorRendering::Substitute })
    }
}
