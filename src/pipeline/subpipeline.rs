//! Scoped sub-chains: history scope stages, extraction, the combiner and the shorthand wrapper.
//!
//! A wrapped stage runs on an extracted sub-value inside its own history frame:
//!
//! ```text
//! history:push -> [extract(input)] -> S -> [extract(output)] -> history:pop -> [combine(target)]
//! ```

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;

use crate::error::StreamlineError;
use crate::extractor::Extractor;
use crate::utils::config::StreamlineConsts;

use super::stage::{EntryStream, FnStage, Stage, map_entries};

// ---- History scope stages ----

/// Open a nested scope seeded with the current value.
pub fn history_push(source: EntryStream<'_>) -> EntryStream<'_> {
    map_entries(source, |entry| entry.push(None))
}

/// Close the top scope. Popping the root frame is a fatal wiring fault.
pub fn history_pop(source: EntryStream<'_>) -> EntryStream<'_> {
    Box::new(source.map(|item| {
        let mut entry = item?;
        entry.pop()?;
        Ok(entry)
    }))
}

pub fn history_collapse(source: EntryStream<'_>) -> EntryStream<'_> {
    map_entries(source, |entry| entry.collapse())
}

pub fn history_reset(source: EntryStream<'_>) -> EntryStream<'_> {
    map_entries(source, |entry| entry.reset())
}

/// Replace the value with the list of every version in the current frame.
pub fn history_values(source: EntryStream<'_>) -> EntryStream<'_> {
    map_entries(source, |entry| {
        let all = Value::Array(entry.history().to_vec());
        entry.set_value(all);
    })
}

// ---- Extraction ----

/// Replace each value with the sub-value at a path. A leading `value` segment means the value itself.
pub struct ExtractStage {
    extractor: Extractor,
}

impl ExtractStage {
    pub fn new(selector: &str) -> Self {
        ExtractStage {
            extractor: Extractor::with_value_symbol(selector),
        }
    }
}

impl Stage for ExtractStage {
    fn stream<'a>(&'a self, source: EntryStream<'a>) -> EntryStream<'a> {
        map_entries(source, |entry| {
            let extracted = self.extractor.extract(entry.value());
            entry.set_value(extracted);
        })
    }
}

// ---- Combiner ----

#[derive(Clone, Debug)]
pub struct CombineOptions {
    /// Key on the target that receives the source value.
    pub path: String,
    /// History offset of the inserted value.
    pub source: isize,
    /// History offset of the value inserted into.
    pub target: isize,
    /// Fail instead of wrapping a non-object target as `{"base": target, path: source}`.
    pub disallow_wrapping: bool,
}

impl Default for CombineOptions {
    fn default() -> Self {
        CombineOptions {
            path: "value".to_string(),
            source: StreamlineConsts::COMBINE_SOURCE_OFFSET,
            target: StreamlineConsts::COMBINE_TARGET_OFFSET,
            disallow_wrapping: false,
        }
    }
}

/// Merge two versions from the current history frame into a new value. The target is copied,
/// never mutated.
pub struct Combiner {
    options: CombineOptions,
}

impl Combiner {
    pub fn new(options: CombineOptions) -> Self {
        Combiner { options }
    }

    pub fn at_path(path: &str) -> Self {
        Self::new(CombineOptions {
            path: path.to_string(),
            ..CombineOptions::default()
        })
    }

    /// New value with `source` written under the configured path of a copy of `target`.
    pub fn combine(&self, source: &Value, target: &Value) -> Result<Value, StreamlineError> {
        let path = self.options.path.clone();
        match target {
            Value::Object(map) => {
                let mut merged = map.clone();
                merged.insert(path, source.clone());
                Ok(Value::Object(merged))
            }
            _ if self.options.disallow_wrapping => Err(StreamlineError::Combine(
                "target is not an object".to_string(),
            )),
            _ => {
                let mut wrapped = Map::new();
                wrapped.insert("base".to_string(), target.clone());
                wrapped.insert(path, source.clone());
                Ok(Value::Object(wrapped))
            }
        }
    }
}

impl Stage for Combiner {
    fn stream<'a>(&'a self, source: EntryStream<'a>) -> EntryStream<'a> {
        map_entries(source, |entry| {
            let pair = entry
                .history_at(self.options.source)
                .zip(entry.history_at(self.options.target));
            let Some((src, dst)) = pair else {
                entry.error(anyhow::anyhow!(
                    "history offsets {}/{} out of range for frame of {}",
                    self.options.source,
                    self.options.target,
                    entry.history().len()
                ));
                return;
            };
            match self.combine(src, dst) {
                Ok(value) => entry.set_value(value),
                Err(err) => entry.error(err),
            }
        })
    }
}

// ---- Wrapper ----

/// Paths that scope a wrapped stage. `"value"` means "no extraction".
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WrapperPaths {
    pub input_path: String,
    pub output_path: String,
    pub target_path: Option<String>,
}

impl Default for WrapperPaths {
    fn default() -> Self {
        WrapperPaths {
            input_path: "value".to_string(),
            output_path: "value".to_string(),
            target_path: None,
        }
    }
}

/// Inline sub-chain letting `target` operate on a nested sub-value and merge its result back.
pub struct SubpipelineWrapper {
    stages: Vec<Box<dyn Stage>>,
}

impl SubpipelineWrapper {
    pub fn new(target: Box<dyn Stage>, paths: &WrapperPaths) -> Self {
        let mut stages: Vec<Box<dyn Stage>> = vec![Box::new(FnStage(history_push))];
        if paths.input_path != "value" {
            stages.push(Box::new(ExtractStage::new(&paths.input_path)));
        }
        stages.push(target);
        if paths.output_path != "value" {
            stages.push(Box::new(ExtractStage::new(&paths.output_path)));
        }
        stages.push(Box::new(FnStage(history_pop)));
        if let Some(target_path) = &paths.target_path {
            stages.push(Box::new(Combiner::at_path(target_path)));
        }
        SubpipelineWrapper { stages }
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

impl Stage for SubpipelineWrapper {
    fn stream<'a>(&'a self, source: EntryStream<'a>) -> EntryStream<'a> {
        self.stages
            .iter()
            .fold(source, |upstream, stage| stage.stream(upstream))
    }
}

// ---- Shorthand ----

const SHORTHAND_PATTERN: &str =
    r"^(?:([-\[\]_.\w]+)=)?([-\[\]_.\w]+)\(([-\[\]._*\w]+), ?([-\[\]._*\w]+)\)$";

static SHORTHAND_RE: OnceLock<Regex> = OnceLock::new();

fn shorthand_re() -> &'static Regex {
    SHORTHAND_RE.get_or_init(|| Regex::new(SHORTHAND_PATTERN).expect("shorthand pattern is valid"))
}

/// Parsed `[target=]stage(input, output)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Shorthand {
    pub target_attr: Option<String>,
    pub stage_name: String,
    pub input_path: String,
    pub output_path: String,
}

impl Shorthand {
    /// True if `text` is meant as a shorthand call: it matches the grammar, or an argument list
    /// opens before any `{options}` body. `split{delimiter=(a|b)}` is not shorthand.
    pub fn looks_like(text: &str) -> bool {
        if shorthand_re().is_match(text) {
            return true;
        }
        match (text.find('('), text.find('{')) {
            (Some(paren), Some(brace)) => paren < brace,
            (Some(_), None) => true,
            (None, _) => false,
        }
    }

    pub fn parse(text: &str) -> Result<Self, StreamlineError> {
        let caps = shorthand_re()
            .captures(text)
            .ok_or_else(|| StreamlineError::config(format!("malformed shorthand: {text}")))?;
        let group = |i: usize| caps.get(i).map(|m| m.as_str().to_string());
        Ok(Shorthand {
            target_attr: group(1),
            stage_name: group(2).unwrap_or_default(),
            input_path: group(3).unwrap_or_default(),
            output_path: group(4).unwrap_or_default(),
        })
    }

    pub fn paths(&self) -> WrapperPaths {
        WrapperPaths {
            input_path: self.input_path.clone(),
            output_path: self.output_path.clone(),
            target_path: self.target_attr.clone(),
        }
    }
}
