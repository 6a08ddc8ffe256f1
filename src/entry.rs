//! Versioned entry with a branchable value history.
//!
//! History is a stack of frames; each frame is an append-only list of value versions.
//! The root value (first value of the first frame) is never touched after construction.

use serde_json::Value;
use std::sync::Arc;

use crate::error::StreamlineError;

/// One level of an entry's history.
pub type Frame = Vec<Value>;

/// Recorded failure. Errors are immutable once recorded, so clones share them.
pub type EntryError = Arc<anyhow::Error>;

/// Unit of data flowing through a pipeline.
///
/// `Clone` deep-copies every frame, so a cloned entry shares no mutable state with its source.
/// Errors and the error value are immutable and shared by reference.
#[derive(Clone, Debug)]
pub struct Entry {
    index: Option<usize>,
    history: Vec<Frame>,
    errors: Vec<EntryError>,
    error_value: Arc<Value>,
}

impl Entry {
    /// Entry from a literal: no index, `null` error value.
    pub fn new(value: Value) -> Self {
        Self::with_error_value(value, None, Arc::new(Value::Null))
    }

    pub fn with_error_value(value: Value, index: Option<usize>, error_value: Arc<Value>) -> Self {
        Entry {
            index,
            history: vec![vec![value]],
            errors: Vec::new(),
            error_value,
        }
    }

    pub fn index(&self) -> Option<usize> {
        self.index
    }

    /// Root value: first value of the first frame.
    pub fn original_value(&self) -> &Value {
        &self.history[0][0]
    }

    /// Current value: last value of the last frame.
    pub fn value(&self) -> &Value {
        self.current_frame()
            .last()
            .unwrap_or_else(|| self.original_value())
    }

    /// Append a new version to the current frame.
    pub fn set_value(&mut self, value: Value) {
        self.current_frame_mut().push(value);
    }

    pub fn errors(&self) -> &[EntryError] {
        &self.errors
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn last_error(&self) -> Option<&EntryError> {
        self.errors.last()
    }

    pub fn error_value(&self) -> &Value {
        &self.error_value
    }

    /// Record `err` and replace the current value with the error value. Never fails.
    pub fn error<E: Into<anyhow::Error>>(&mut self, err: E) {
        self.errors.push(Arc::new(err.into()));
        let substitute = self.error_value.as_ref().clone();
        self.set_value(substitute);
    }

    /// Open a scope: new frame seeded with `value`, or with the current value when `None`.
    pub fn push(&mut self, value: Option<Value>) {
        let seed = value.unwrap_or_else(|| self.value().clone());
        self.history.push(vec![seed]);
    }

    /// Close the top scope. Its final value is appended to the enclosing frame, so the value
    /// just before the scope opened stays readable at offset `-2` there.
    pub fn pop(&mut self) -> Result<(), StreamlineError> {
        if self.history.len() == 1 {
            return Err(StreamlineError::InvalidOperation(format!(
                "cannot pop root history frame of entry {}",
                self.describe_index()
            )));
        }
        let result = self
            .history
            .pop()
            .and_then(|mut frame| frame.pop())
            .unwrap_or(Value::Null);
        self.set_value(result);
        Ok(())
    }

    /// Shrink the current frame to its latest value. Nesting depth is kept.
    pub fn collapse(&mut self) {
        let frame = self.current_frame_mut();
        if frame.len() > 1 {
            frame.drain(..frame.len() - 1);
        }
    }

    /// Drop every frame and start over from the root value.
    pub fn reset(&mut self) {
        let root = self.original_value().clone();
        self.history = vec![vec![root]];
    }

    /// Every value version of the current frame, oldest first.
    pub fn history(&self) -> &[Value] {
        self.current_frame()
    }

    /// Value in the current frame at `offset`; negative offsets count from the end.
    pub fn history_at(&self, offset: isize) -> Option<&Value> {
        let frame = self.current_frame();
        let idx = if offset < 0 {
            frame.len().checked_sub(offset.unsigned_abs())?
        } else {
            offset as usize
        };
        frame.get(idx)
    }

    pub fn frames(&self) -> &[Frame] {
        &self.history
    }

    pub fn depth(&self) -> usize {
        self.history.len()
    }

    pub fn into_value(mut self) -> Value {
        self.history
            .pop()
            .and_then(|mut frame| frame.pop())
            .unwrap_or(Value::Null)
    }

    fn describe_index(&self) -> String {
        self.index
            .map(|i| i.to_string())
            .unwrap_or_else(|| "<unindexed>".to_string())
    }

    fn current_frame(&self) -> &Frame {
        &self.history[self.history.len() - 1]
    }

    fn current_frame_mut(&mut self) -> &mut Frame {
        let top = self.history.len() - 1;
        &mut self.history[top]
    }
}

/// Mints entries with monotonically increasing indexes and a shared error value.
#[derive(Debug)]
pub struct EntryFactory {
    error_value: Arc<Value>,
    next_index: usize,
}

impl Default for EntryFactory {
    fn default() -> Self {
        Self::new(Value::Null)
    }
}

impl EntryFactory {
    pub fn new(error_value: Value) -> Self {
        EntryFactory {
            error_value: Arc::new(error_value),
            next_index: 0,
        }
    }

    pub fn make(&mut self, value: Value) -> Entry {
        let entry = Entry::with_error_value(
            value,
            Some(self.next_index),
            Arc::clone(&self.error_value),
        );
        self.next_index += 1;
        entry
    }
}

/// Wrap literal values as unindexed entries.
pub fn entry_wrap<I: IntoIterator<Item = Value>>(values: I) -> Vec<Entry> {
    values.into_iter().map(Entry::new).collect()
}

/// Current value of every entry.
pub fn entry_unwrap<I: IntoIterator<Item = Entry>>(entries: I) -> Vec<Value> {
    entries.into_iter().map(Entry::into_value).collect()
}
