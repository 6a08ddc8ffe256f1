//! Engine module: stage catalog, registry, line I/O and the CLI driver

pub mod arg_parser;
pub mod cli;
pub mod evaluate;
pub mod handlers;
pub mod io;
pub mod progress;
pub mod registry;
pub mod stages;
pub mod tools;

// Re-export commonly used items
pub use arg_parser::Cli;
pub use cli::{handle_run, setup_opts};
pub use evaluate::{EvalFilter, EvalTransform, Evaluate, Scope};
pub use handlers::{ShellHandler, SleepHandler};
pub use io::{FileReader, FileWriter};
pub use registry::{Registry, StageFactory, StageOptions, StageSpec};
pub use tools::{force_string, is_truthy};
