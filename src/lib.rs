//! Streamline: composable, lazily pulled stream-transformation pipelines over JSON-like values.

pub mod engine;
pub mod entry;
pub mod error;
pub mod extractor;
pub mod pipeline;
pub mod types;
pub mod utils;

/// Re-export types for API
pub use types::*;

pub use engine::{Registry, StageOptions};
pub use entry::{Entry, EntryFactory, entry_unwrap, entry_wrap};
pub use error::StreamlineError;
pub use extractor::{Extractor, Selector};
pub use pipeline::{Pipeline, PipelineContext};

use log::debug;
use serde_json::Value;

/// Result alias used by public streamline API
pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, Error>;

/// Run `values` through the stage tokens using the built-in registry and return the final values.
///
/// ```ignore
/// let out = streamline::stream_values(vec![json!("[1,2]")], &["json", "split_list"], &Opts::default())?;
/// assert_eq!(out, vec![json!(1), json!(2)]);
/// ```
pub fn stream_values<S: AsRef<str>>(
    values: Vec<Value>,
    stages: &[S],
    opts: &Opts,
) -> Result<Vec<Value>> {
    stream_values_with(&Registry::with_builtins(), values, stages, opts)
}

/// Same as [`stream_values`] with a caller-supplied registry.
pub fn stream_values_with<S: AsRef<str>>(
    registry: &Registry,
    values: Vec<Value>,
    stages: &[S],
    opts: &Opts,
) -> Result<Vec<Value>> {
    let ctx = PipelineContext::from_opts(opts)?;
    let pipeline = registry.build_pipeline(stages, ctx)?;
    let mut factory = EntryFactory::new(opts.error_value.clone());
    let source = pipeline::static_stream(values.into_iter().map(|v| factory.make(v)).collect());
    let mut out = Vec::new();
    for item in pipeline.stream(source) {
        out.push(item?.into_value());
    }
    debug!("Streamed {} values", out.len());
    Ok(out)
}
