//! Error taxonomy for pipeline wiring and per-entry failures.

use thiserror::Error;

/// Faults raised by the engine itself.
///
/// `Configuration` and `InvalidOperation` are wiring defects and abort a run. `Handler` and
/// `Combine` are recorded on the failing [`Entry`](crate::Entry) and travel with it as data.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StreamlineError {
    /// Unknown stage name, malformed shorthand or bad stage option. Raised before any data flows.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// History misuse, e.g. popping the root frame.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
    /// A handler panicked or failed inside a bounded executor.
    #[error("handler failed: {0}")]
    Handler(String),
    /// Merge target is not a mapping and wrapping is disallowed.
    #[error("cannot combine: {0}")]
    Combine(String),
}

impl StreamlineError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}
