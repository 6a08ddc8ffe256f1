//! Runtime options shared by the CLI and library entry points.

use serde::Deserialize;
use serde_json::Value;

use crate::utils::config::StreamlineConsts;

/// How a failed handler call replaces the entry's value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorRendering {
    /// Keep the entry's configured error value.
    #[default]
    Substitute,
    /// Error message with its cause chain.
    Message,
    /// Full diagnostic, including backtrace when one was captured.
    Trace,
}

/// Full options (CLI and lib).
#[derive(Clone, Debug)]
pub struct Opts {
    /// Input file, `-` for stdin.
    pub input: String,
    /// Output file, `-` for stdout. `{input}` in the name writes one file per entry.
    pub output: String,
    /// Max concurrent handler calls per executor stage.
    pub workers: usize,
    /// Value substituted when an entry records an error.
    pub error_value: Value,
    pub error_rendering: ErrorRendering,
    /// Prefix each output with the entry's original input.
    pub headers: bool,
    /// Final extraction path applied to every output value.
    pub extract: Option<String>,
    /// Show a progress bar for executor stages.
    pub progress: bool,
    /// Terminate output with a newline.
    pub closing_newline: bool,
    /// Emit a trailing empty entry when the input ends with a newline.
    pub keep_trailing_newline: bool,
    pub verbose: bool,
}

impl Default for Opts {
    fn default() -> Self {
        Opts {
            input: StreamlineConsts::STDIO.to_string(),
            output: StreamlineConsts::STDIO.to_string(),
            workers: StreamlineConsts::DEFAULT_WORKERS,
            error_value: Value::Null,
            error_rendering: ErrorRendering::default(),
            headers: false,
            extract: None,
            progress: false,
            closing_newline: false,
            keep_trailing_newline: false,
            verbose: false,
        }
    }
}
