use anyhow::Result;
use log::debug;
use std::sync::Arc;

use super::context::PipelineContext;
use super::executor::BoundedExecutor;
use super::stage::{EntryStream, FnStage, Handle, Stage, StageKind};
use super::subpipeline::{SubpipelineWrapper, WrapperPaths};

/// Source of entries. No upstream.
pub trait Generator {
    fn stream(&mut self) -> Result<EntryStream<'_>>;
}

/// Sink. Must fully drain its input; returns the number of entries consumed.
pub trait Consumer {
    fn drain(&mut self, source: EntryStream<'_>) -> Result<usize>;
}

/// Linear chain of stages between a generator and a consumer.
///
/// Stages are resolved when added: handler objects are wrapped in a [`BoundedExecutor`] built
/// from the pipeline's context, so nothing inspects plugin kinds while data flows.
pub struct Pipeline {
    ctx: PipelineContext,
    stages: Vec<Box<dyn Stage>>,
}

impl Pipeline {
    pub fn new(ctx: PipelineContext) -> Self {
        Pipeline {
            ctx,
            stages: Vec::new(),
        }
    }

    pub fn context(&self) -> &PipelineContext {
        &self.ctx
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Turn a plugin into a runnable stage.
    pub fn resolve(&self, kind: StageKind) -> Box<dyn Stage> {
        match kind {
            StageKind::Function(f) => Box::new(FnStage(f)),
            StageKind::StreamObject(stage) => stage,
            StageKind::HandlerObject(handler) => Box::new(self.executor(handler)),
        }
    }

    pub fn executor(&self, handler: Arc<dyn Handle>) -> BoundedExecutor {
        debug!(
            "Wrapping handler in bounded executor (workers={})",
            self.ctx.workers
        );
        BoundedExecutor::new(handler, &self.ctx)
    }

    pub fn push_kind(&mut self, kind: StageKind) -> &mut Self {
        debug!("Adding {} stage at position {}", kind.label(), self.stages.len());
        let stage = self.resolve(kind);
        self.stages.push(stage);
        self
    }

    pub fn push_stage(&mut self, stage: Box<dyn Stage>) -> &mut Self {
        self.stages.push(stage);
        self
    }

    /// Add `kind` scoped to a sub-value (see [`SubpipelineWrapper`]).
    pub fn push_wrapped(&mut self, kind: StageKind, paths: &WrapperPaths) -> &mut Self {
        debug!(
            "Adding scoped {} stage: input={} output={} target={:?}",
            kind.label(),
            paths.input_path,
            paths.output_path,
            paths.target_path
        );
        let inner = self.resolve(kind);
        self.stages
            .push(Box::new(SubpipelineWrapper::new(inner, paths)));
        self
    }

    /// Chain every stage over `source`. Nothing runs until the result is pulled.
    pub fn stream<'a>(&'a self, source: EntryStream<'a>) -> EntryStream<'a> {
        self.stages
            .iter()
            .fold(source, |upstream, stage| stage.stream(upstream))
    }

    /// Drive `generator` through the chain into `consumer`. With no consumer the output is
    /// drained and discarded. Returns the number of entries that reached the end.
    pub fn run(
        &self,
        generator: &mut dyn Generator,
        consumer: Option<&mut dyn Consumer>,
    ) -> Result<usize> {
        let source = generator.stream()?;
        let stream = self.stream(source);
        let count = match consumer {
            Some(consumer) => consumer.drain(stream)?,
            None => discard(stream)?,
        };
        debug!("Pipeline drained {} entries", count);
        Ok(count)
    }
}

fn discard(stream: EntryStream<'_>) -> Result<usize> {
    let mut count = 0;
    for item in stream {
        item?;
        count += 1;
    }
    Ok(count)
}
