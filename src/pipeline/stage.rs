//! Stage contracts: the lazy entry stream, plugin kinds and capability traits.

use anyhow::Result;
use serde_json::Value;
use std::sync::Arc;

use crate::Entry;
use crate::engine::StageOptions;

/// Lazy, pull-based sequence of entries. An `Err` item is a fatal wiring fault and ends the run;
/// per-entry failures travel inside the entry instead.
pub type EntryStream<'a> = Box<dyn Iterator<Item = Result<Entry>> + 'a>;

/// Plain function stage: transforms one stream into another.
pub type StageFn = for<'a> fn(EntryStream<'a>) -> EntryStream<'a>;

/// A transformation from one entry stream to another. May filter, multiply or mutate entries.
pub trait Stage {
    fn stream<'a>(&'a self, source: EntryStream<'a>) -> EntryStream<'a>;
}

/// Per-value handler. Runs on the scheduler's worker pool inside a bounded executor.
pub trait Handle: Send + Sync {
    fn handle(&self, value: Value) -> Result<Value>;
}

impl<F> Handle for F
where
    F: Fn(Value) -> Result<Value> + Send + Sync,
{
    fn handle(&self, value: Value) -> Result<Value> {
        self(value)
    }
}

/// Build a stage or handler from `name{key=value,...}` options.
pub trait Configure: Sized {
    fn configure(options: &StageOptions) -> Result<Self>;
}

/// Plugin capability, resolved once when the pipeline is built.
pub enum StageKind {
    Function(StageFn),
    StreamObject(Box<dyn Stage>),
    /// Needs wrapping in a bounded executor.
    HandlerObject(Arc<dyn Handle>),
}

impl StageKind {
    pub fn stream<S: Stage + 'static>(stage: S) -> Self {
        StageKind::StreamObject(Box::new(stage))
    }

    pub fn handler<H: Handle + 'static>(handler: H) -> Self {
        StageKind::HandlerObject(Arc::new(handler))
    }

    pub fn label(&self) -> &'static str {
        match self {
            StageKind::Function(_) => "function",
            StageKind::StreamObject(_) => "stream",
            StageKind::HandlerObject(_) => "handler",
        }
    }
}

/// Adapter so a [`StageFn`] can sit in a chain of boxed stages.
pub struct FnStage(pub StageFn);

impl Stage for FnStage {
    fn stream<'a>(&'a self, source: EntryStream<'a>) -> EntryStream<'a> {
        (self.0)(source)
    }
}

/// Stream over already-built entries.
pub fn static_stream<'a>(entries: Vec<Entry>) -> EntryStream<'a> {
    Box::new(entries.into_iter().map(Ok))
}

/// Mutate each entry in place; faults pass through untouched.
pub fn map_entries<'a, F>(source: EntryStream<'a>, mut f: F) -> EntryStream<'a>
where
    F: FnMut(&mut Entry) + 'a,
{
    Box::new(source.map(move |item| {
        item.map(|mut entry| {
            f(&mut entry);
            entry
        })
    }))
}

/// Keep entries matching `keep`; faults always pass.
pub fn filter_entries<'a, P>(source: EntryStream<'a>, mut keep: P) -> EntryStream<'a>
where
    P: FnMut(&Entry) -> bool + 'a,
{
    Box::new(source.filter(move |item| match item {
        Ok(entry) => keep(entry),
        Err(_) => true,
    }))
}
