//! Expression stages. No language ships with the crate: callers plug one in through [`Evaluate`]
//! and [`Registry::register_evaluator`](super::Registry::register_evaluator).

use anyhow::Result;
use serde_json::Value;
use std::sync::Arc;

use crate::pipeline::{EntryStream, Stage, map_entries};

use super::tools::is_truthy;

/// Names visible to an expression.
pub struct Scope<'a> {
    pub value: &'a Value,
    pub index: Option<usize>,
    pub original: &'a Value,
}

pub trait Evaluate: Send + Sync {
    fn evaluate(&self, expr: &str, scope: &Scope<'_>) -> Result<Value>;
}

impl<F> Evaluate for F
where
    F: Fn(&str, &Scope<'_>) -> Result<Value> + Send + Sync,
{
    fn evaluate(&self, expr: &str, scope: &Scope<'_>) -> Result<Value> {
        self(expr, scope)
    }
}

fn evaluate_entry(evaluator: &dyn Evaluate, code: &str, entry: &crate::Entry) -> Result<Value> {
    let scope = Scope {
        value: entry.value(),
        index: entry.index(),
        original: entry.original_value(),
    };
    evaluator.evaluate(code, &scope)
}

/// Replace each value with the result of an expression. Failures are recorded on the entry.
pub struct EvalTransform {
    code: String,
    evaluator: Arc<dyn Evaluate>,
}

impl EvalTransform {
    pub fn new(code: &str, evaluator: Arc<dyn Evaluate>) -> Self {
        EvalTransform {
            code: code.to_string(),
            evaluator,
        }
    }
}

impl Stage for EvalTransform {
    fn stream<'a>(&'a self, source: EntryStream<'a>) -> EntryStream<'a> {
        map_entries(source, |entry| {
            match evaluate_entry(self.evaluator.as_ref(), &self.code, entry) {
                Ok(value) => entry.set_value(value),
                Err(e) => entry.error(e),
            }
        })
    }
}

/// Keep entries whose expression result is truthy. An evaluation failure drops the entry.
pub struct EvalFilter {
    code: String,
    evaluator: Arc<dyn Evaluate>,
}

impl EvalFilter {
    pub fn new(code: &str, evaluator: Arc<dyn Evaluate>) -> Self {
        EvalFilter {
            code: code.to_string(),
            evaluator,
        }
    }
}

impl Stage for EvalFilter {
    fn stream<'a>(&'a self, source: EntryStream<'a>) -> EntryStream<'a> {
        Box::new(source.filter(move |item| match item {
            Ok(entry) => match evaluate_entry(self.evaluator.as_ref(), &self.code, entry) {
                Ok(result) => is_truthy(&result),
                Err(e) => {
                    log::debug!("filter dropped entry {:?}: {:#}", entry.index(), e);
                    false
                }
            },
            Err(_) => true,
        }))
    }
}
