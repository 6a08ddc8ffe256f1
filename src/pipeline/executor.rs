//! Bounded executor: fan each entry's value out to a handler with at most `W` calls in flight.
//!
//! The coordinating loop runs on the consumer's thread inside `next()`. It admits upstream
//! entries while fewer than `W` are in flight, hands each to the scheduler pool, and yields
//! completions from a shared channel as soon as they arrive. Output is in completion order.

use anyhow::Result;
use crossbeam_channel::{Receiver, Sender, unbounded};
use log::debug;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::Entry;
use crate::ErrorRendering;
use crate::error::StreamlineError;

use super::context::{ExecutorProgress, PipelineContext, ProgressHook, Scheduler};
use super::error_handler::{panic_message, record_failure};
use super::stage::{EntryStream, Handle, Stage};

/// Stage that applies a [`Handle`] to every entry's value with bounded concurrency.
pub struct BoundedExecutor {
    handler: Arc<dyn Handle>,
    workers: usize,
    scheduler: Scheduler,
    error_rendering: ErrorRendering,
    on_progress: Option<ProgressHook>,
}

impl BoundedExecutor {
    pub fn new(handler: Arc<dyn Handle>, ctx: &PipelineContext) -> Self {
        BoundedExecutor {
            handler,
            workers: ctx.workers.max(1),
            scheduler: ctx.scheduler.clone(),
            error_rendering: ctx.error_rendering,
            on_progress: ctx.on_progress.clone(),
        }
    }

    /// Override the in-flight cap for this stage only.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }
}

impl Stage for BoundedExecutor {
    fn stream<'a>(&'a self, source: EntryStream<'a>) -> EntryStream<'a> {
        let (done_tx, done_rx) = unbounded::<Entry>();
        Box::new(ExecutorStream {
            executor: self,
            upstream: source,
            done_tx,
            done_rx,
            exhausted: false,
            progress: ExecutorProgress::default(),
        })
    }
}

/// Run `handler` on the entry's current value, recording any failure or panic on the entry.
/// Always returns the entry, so each admission yields exactly one completion.
pub fn apply_handler(handler: &dyn Handle, mut entry: Entry, rendering: ErrorRendering) -> Entry {
    let value = entry.value().clone();
    match panic::catch_unwind(AssertUnwindSafe(|| handler.handle(value))) {
        Ok(Ok(result)) => entry.set_value(result),
        Ok(Err(err)) => record_failure(&mut entry, err, rendering),
        Err(payload) => {
            let err = StreamlineError::Handler(panic_message(payload.as_ref()));
            record_failure(&mut entry, err.into(), rendering);
        }
    }
    entry
}

struct ExecutorStream<'a> {
    executor: &'a BoundedExecutor,
    upstream: EntryStream<'a>,
    done_tx: Sender<Entry>,
    done_rx: Receiver<Entry>,
    exhausted: bool,
    progress: ExecutorProgress,
}

impl ExecutorStream<'_> {
    fn admit(&mut self, entry: Entry) {
        self.progress.admitted += 1;
        self.progress.in_flight += 1;
        let handler = Arc::clone(&self.executor.handler);
        let done_tx = self.done_tx.clone();
        let rendering = self.executor.error_rendering;
        self.executor.scheduler.spawn(move || {
            let entry = apply_handler(handler.as_ref(), entry, rendering);
            // Receiver is gone only when the consumer stopped pulling.
            let _ = done_tx.send(entry);
        });
        self.report();
    }

    fn complete(&mut self, entry: Entry) -> Entry {
        self.progress.completed += 1;
        self.progress.in_flight -= 1;
        self.report();
        entry
    }

    fn report(&self) {
        if let Some(hook) = &self.executor.on_progress {
            hook(self.progress);
        }
    }
}

impl Iterator for ExecutorStream<'_> {
    type Item = Result<Entry>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Ok(entry) = self.done_rx.try_recv() {
                return Some(Ok(self.complete(entry)));
            }
            if !self.exhausted && self.progress.in_flight < self.executor.workers {
                match self.upstream.next() {
                    Some(Ok(entry)) => self.admit(entry),
                    Some(Err(err)) => return Some(Err(err)),
                    None => {
                        self.exhausted = true;
                        debug!(
                            "executor: upstream exhausted after {} admissions",
                            self.progress.admitted
                        );
                    }
                }
                continue;
            }
            if self.progress.in_flight == 0 {
                return None;
            }
            // We hold a sender, so recv only returns once a job publishes its completion.
            return match self.done_rx.recv() {
                Ok(entry) => Some(Ok(self.complete(entry))),
                Err(_) => None,
            };
        }
    }
}
