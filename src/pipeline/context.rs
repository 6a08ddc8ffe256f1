//! Pipeline context: the injected scheduler and the settings every executor stage shares.

use anyhow::{Context, Result};
use log::debug;
use std::sync::Arc;

use crate::error::StreamlineError;
use crate::{ErrorRendering, Opts};

/// Bounded background pool that runs blocking handler work.
///
/// One instance is built per pipeline and handed to every executor stage that needs it.
#[derive(Clone)]
pub struct Scheduler {
    pool: Arc<rayon::ThreadPool>,
}

impl Scheduler {
    pub fn new(num_threads: usize) -> Result<Self> {
        if num_threads == 0 {
            return Err(StreamlineError::config("scheduler needs at least one thread").into());
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .thread_name(|i| format!("{}-worker-{}", env!("CARGO_PKG_NAME"), i))
            .build()
            .context("build handler worker pool")?;
        debug!("Scheduler pool: {} threads", num_threads);
        Ok(Scheduler {
            pool: Arc::new(pool),
        })
    }

    pub fn spawn<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.pool.spawn(job);
    }

    pub fn num_threads(&self) -> usize {
        self.pool.current_num_threads()
    }
}

/// Counts reported by an executor on every admission and completion.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExecutorProgress {
    pub admitted: usize,
    pub completed: usize,
    pub in_flight: usize,
}

/// Observability callback for executor stages. Purely additive.
pub type ProgressHook = Arc<dyn Fn(ExecutorProgress) + Send + Sync>;

/// Shared settings for resolving stages: scheduler, worker cap, failure rendering, progress hook.
#[derive(Clone)]
pub struct PipelineContext {
    pub scheduler: Scheduler,
    /// Max concurrent handler calls per executor stage.
    pub workers: usize,
    pub error_rendering: ErrorRendering,
    pub on_progress: Option<ProgressHook>,
}

impl PipelineContext {
    /// Context with a dedicated pool of `workers` threads.
    pub fn new(workers: usize) -> Result<Self> {
        if workers == 0 {
            return Err(StreamlineError::config("workers must be a positive integer").into());
        }
        Ok(PipelineContext {
            scheduler: Scheduler::new(workers)?,
            workers,
            error_rendering: ErrorRendering::default(),
            on_progress: None,
        })
    }

    pub fn from_opts(opts: &Opts) -> Result<Self> {
        let mut ctx = Self::new(opts.workers)?;
        ctx.error_rendering = opts.error_rendering;
        Ok(ctx)
    }

    pub fn with_progress(mut self, hook: ProgressHook) -> Self {
        self.on_progress = Some(hook);
        self
    }

    pub fn with_error_rendering(mut self, rendering: ErrorRendering) -> Self {
        self.error_rendering = rendering;
        self
    }
}
