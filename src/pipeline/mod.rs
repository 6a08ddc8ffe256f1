//! Pipeline components: stage contracts, composition, bounded executor, scoped sub-chains.

pub mod context;
pub mod error_handler;
pub mod executor;
pub mod orchestrator;
pub mod stage;
pub mod subpipeline;

pub use context::{ExecutorProgress, PipelineContext, ProgressHook, Scheduler};
pub use error_handler::{record_failure, render_error};
pub use executor::{BoundedExecutor, apply_handler};
pub use orchestrator::{Consumer, Generator, Pipeline};
pub use stage::{
    Configure, EntryStream, FnStage, Handle, Stage, StageFn, StageKind, filter_entries,
    map_entries, static_stream,
};
pub use subpipeline::{
    CombineOptions, Combiner, ExtractStage, Shorthand, SubpipelineWrapper, WrapperPaths,
    history_collapse, history_pop, history_push, history_reset, history_values,
};
