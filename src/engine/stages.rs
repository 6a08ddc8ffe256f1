//! Built-in stages.
//!
//! All stages pull lazily except `buffer`, `sort`, `stats` and `breakdown`, which have to hold
//! entries back before they can emit anything.

use anyhow::{Context, Result};
use regex::Regex;
use serde_json::{Map, Value, json};
use std::cmp::Ordering;
use std::collections::{HashMap, VecDeque};
use std::path::Path;

use crate::Entry;
use crate::error::StreamlineError;
use crate::extractor::Extractor;
use crate::pipeline::{
    CombineOptions, Combiner, Configure, EntryStream, ExtractStage, Stage, filter_entries,
    map_entries,
};
use crate::utils::config::StreamlineConsts;

use super::registry::StageOptions;
use super::tools::{as_number, expand_home, force_string, is_truthy};

// ---- Function stages ----

pub fn noop(source: EntryStream<'_>) -> EntryStream<'_> {
    source
}

/// Keep entries whose value is truthy.
pub fn truthy(source: EntryStream<'_>) -> EntryStream<'_> {
    filter_entries(source, |entry| is_truthy(entry.value()))
}

/// Keep entries whose value is falsey.
pub fn falsey(source: EntryStream<'_>) -> EntryStream<'_> {
    filter_entries(source, |entry| !is_truthy(entry.value()))
}

/// Parse string values as JSON. Non-strings pass through.
pub fn json_parser(source: EntryStream<'_>) -> EntryStream<'_> {
    map_entries(source, |entry| {
        let Value::String(text) = entry.value() else {
            return;
        };
        match serde_json::from_str::<Value>(text) {
            Ok(parsed) => entry.set_value(parsed),
            Err(e) => entry.error(e),
        }
    })
}

/// Explode array values: one cloned entry per element.
pub fn split_lists(source: EntryStream<'_>) -> EntryStream<'_> {
    Box::new(source.flat_map(|item| -> Vec<Result<Entry>> {
        let entry = match item {
            Ok(entry) => entry,
            Err(e) => return vec![Err(e)],
        };
        let Some(items) = entry.value().as_array().cloned() else {
            return vec![Ok(entry)];
        };
        items
            .into_iter()
            .map(|value| {
                let mut sub = entry.clone();
                sub.set_value(value);
                Ok(sub)
            })
            .collect()
    }))
}

/// Reset the value to the original input.
pub fn input_values(source: EntryStream<'_>) -> EntryStream<'_> {
    map_entries(source, |entry| {
        let original = entry.original_value().clone();
        entry.set_value(original);
    })
}

/// Replace the value of failed entries with their latest error message.
pub fn error_values(source: EntryStream<'_>) -> EntryStream<'_> {
    map_entries(source, |entry| {
        if let Some(err) = entry.last_error() {
            let text = format!("{:#}", err);
            entry.set_value(Value::String(text));
        }
    })
}

pub fn filter_out_errors(source: EntryStream<'_>) -> EntryStream<'_> {
    filter_entries(source, |entry| !entry.has_errors())
}

// ---- Extraction / combine options ----

impl Configure for ExtractStage {
    fn configure(options: &StageOptions) -> Result<Self> {
        Ok(ExtractStage::new(options.require("selector")?))
    }
}

impl Configure for Combiner {
    fn configure(options: &StageOptions) -> Result<Self> {
        let defaults = CombineOptions::default();
        Ok(Combiner::new(CombineOptions {
            path: options.str_or("path", &defaults.path),
            source: options.parsed_or("source", defaults.source)?,
            target: options.parsed_or("target", defaults.target)?,
            disallow_wrapping: options.flag("disallow_wrapping")?,
        }))
    }
}

// ---- Split ----

/// Split string values on a regex; one cloned entry per piece.
pub struct Split {
    pattern: Regex,
}

impl Split {
    pub fn new(delimiter: &str) -> Result<Self> {
        let pattern = Regex::new(delimiter)
            .map_err(|e| StreamlineError::config(format!("split delimiter: {e}")))?;
        Ok(Split { pattern })
    }
}

impl Configure for Split {
    fn configure(options: &StageOptions) -> Result<Self> {
        Split::new(&options.str_or("delimiter", StreamlineConsts::DEFAULT_SPLIT_DELIMITER))
    }
}

impl Stage for Split {
    fn stream<'a>(&'a self, source: EntryStream<'a>) -> EntryStream<'a> {
        Box::new(source.flat_map(move |item| -> Vec<Result<Entry>> {
            let entry = match item {
                Ok(entry) => entry,
                Err(e) => return vec![Err(e)],
            };
            let Value::String(text) = entry.value() else {
                return vec![Ok(entry)];
            };
            let pieces: Vec<String> = self.pattern.split(text).map(str::to_string).collect();
            pieces
                .into_iter()
                .map(|piece| {
                    let mut sub = entry.clone();
                    sub.set_value(Value::String(piece));
                    Ok(sub)
                })
                .collect()
        }))
    }
}

// ---- Headers ----

/// Render each value as `<original>: <value>`, optionally prefixed with `[index]`.
#[derive(Default)]
pub struct InputHeaders {
    pub indexes: bool,
}

impl Configure for InputHeaders {
    fn configure(options: &StageOptions) -> Result<Self> {
        Ok(InputHeaders {
            indexes: options.flag("indexes")?,
        })
    }
}

impl Stage for InputHeaders {
    fn stream<'a>(&'a self, source: EntryStream<'a>) -> EntryStream<'a> {
        map_entries(source, |entry| {
            let header = force_string(entry.original_value());
            let value = force_string(entry.value());
            let line = if self.indexes {
                let index = entry.index().map(|i| i.to_string()).unwrap_or_default();
                format!("[{index}] {header}: {value}")
            } else {
                format!("{header}: {value}")
            };
            entry.set_value(Value::String(line));
        })
    }
}

// ---- Buffer ----

/// Hold entries back until `size` have arrived (or upstream ends), then release them in order.
/// `None` buffers everything.
pub struct StreamingBuffer {
    size: Option<usize>,
}

impl StreamingBuffer {
    pub fn new(size: Option<usize>) -> Self {
        StreamingBuffer {
            size: size.filter(|n| *n > 0),
        }
    }
}

impl Configure for StreamingBuffer {
    fn configure(options: &StageOptions) -> Result<Self> {
        let size = match options.get("size") {
            None | Some("all") => None,
            Some(_) => options.parsed::<usize>("size")?,
        };
        Ok(StreamingBuffer::new(size))
    }
}

impl Stage for StreamingBuffer {
    fn stream<'a>(&'a self, mut source: EntryStream<'a>) -> EntryStream<'a> {
        let size = self.size;
        let mut buffer: VecDeque<Result<Entry>> = VecDeque::new();
        let mut done = false;
        Box::new(std::iter::from_fn(move || {
            if buffer.is_empty() && !done {
                loop {
                    match source.next() {
                        Some(item) => {
                            let fault = item.is_err();
                            buffer.push_back(item);
                            if fault || size.is_some_and(|n| buffer.len() >= n) {
                                break;
                            }
                        }
                        None => {
                            done = true;
                            break;
                        }
                    }
                }
            }
            buffer.pop_front()
        }))
    }
}

// ---- Strip ----

/// Trim string values; drop entries left blank unless `keep_blank`.
pub struct StripWhitespace {
    keep_blank: bool,
}

impl Configure for StripWhitespace {
    fn configure(options: &StageOptions) -> Result<Self> {
        Ok(StripWhitespace {
            keep_blank: options.flag("keep_blank")?,
        })
    }
}

impl Stage for StripWhitespace {
    fn stream<'a>(&'a self, source: EntryStream<'a>) -> EntryStream<'a> {
        Box::new(source.filter_map(move |item| {
            let mut entry = match item {
                Ok(entry) => entry,
                Err(e) => return Some(Err(e)),
            };
            let Value::String(text) = entry.value() else {
                return Some(Ok(entry));
            };
            let trimmed = text.trim();
            if trimmed.is_empty() && !self.keep_blank {
                return None;
            }
            if trimmed.len() != text.len() {
                let trimmed = trimmed.to_string();
                entry.set_value(Value::String(trimmed));
            }
            Some(Ok(entry))
        }))
    }
}

// ---- Head ----

/// Only the first `count` entries. Upstream is not pulled past them.
pub struct Head {
    count: usize,
}

impl Configure for Head {
    fn configure(options: &StageOptions) -> Result<Self> {
        Ok(Head {
            count: options.parsed_or("count", StreamlineConsts::DEFAULT_HEAD_COUNT)?,
        })
    }
}

impl Stage for Head {
    fn stream<'a>(&'a self, source: EntryStream<'a>) -> EntryStream<'a> {
        Box::new(source.take(self.count))
    }
}

// ---- Read file ----

/// Replace the value with the contents of the file named by the `path` template
/// (`{value}` is substituted). A directory path reads `<dir>/{value}`.
pub struct ReadFile {
    template: String,
    file_metadata: bool,
}

impl Configure for ReadFile {
    fn configure(options: &StageOptions) -> Result<Self> {
        let raw = options.str_or("path", "{value}");
        let expanded = expand_home(&raw);
        let template = if expanded.is_dir() {
            expanded.join("{value}")
        } else {
            expanded
        };
        Ok(ReadFile {
            template: template.to_string_lossy().into_owned(),
            file_metadata: options.flag("file_metadata")?,
        })
    }
}

impl ReadFile {
    fn read(&self, value: &Value) -> Result<Value> {
        let path = self.template.replace("{value}", &force_string(value));
        let contents = std::fs::read_to_string(Path::new(&path))
            .with_context(|| format!("read file {path}"))?;
        if !self.file_metadata {
            return Ok(Value::String(contents));
        }
        let size = std::fs::metadata(&path)
            .with_context(|| format!("stat file {path}"))?
            .len();
        Ok(json!({ "content": contents, "path": path, "size": size }))
    }
}

impl Stage for ReadFile {
    fn stream<'a>(&'a self, source: EntryStream<'a>) -> EntryStream<'a> {
        map_entries(source, |entry| match self.read(entry.value()) {
            Ok(value) => entry.set_value(value),
            Err(e) => entry.error(e),
        })
    }
}

// ---- Stats ----

/// Emit one entry with `count`, `sum`, `min`, `max`, `average` over numeric values at `path`.
/// Non-numeric values are skipped.
pub struct Stats {
    extractor: Extractor,
}

impl Configure for Stats {
    fn configure(options: &StageOptions) -> Result<Self> {
        Ok(Stats {
            extractor: Extractor::with_value_symbol(&options.str_or("path", "value")),
        })
    }
}

impl Stats {
    fn summarize(&self, source: EntryStream<'_>) -> Result<Entry> {
        let mut count = 0_u64;
        let mut sum = 0.0_f64;
        let mut min: Option<f64> = None;
        let mut max: Option<f64> = None;
        for item in source {
            let entry = item?;
            let Some(num) = as_number(&self.extractor.extract(entry.value())) else {
                continue;
            };
            count += 1;
            sum += num;
            min = Some(min.map_or(num, |m| m.min(num)));
            max = Some(max.map_or(num, |m| m.max(num)));
        }
        let average = if count == 0 { 0.0 } else { sum / count as f64 };
        Ok(Entry::new(json!({
            "count": count,
            "sum": sum,
            "min": min,
            "max": max,
            "average": average,
        })))
    }
}

impl Stage for Stats {
    fn stream<'a>(&'a self, source: EntryStream<'a>) -> EntryStream<'a> {
        let mut source = Some(source);
        Box::new(std::iter::from_fn(move || {
            let src = source.take()?;
            Some(self.summarize(src))
        }))
    }
}

// ---- Sort ----

#[derive(Clone, Debug, PartialEq, PartialOrd)]
enum SortKey {
    Number(f64),
    Text(String),
}

/// Sort entries by the value at `path`. Entries without a sort value go first (ascending)
/// or last (descending). Stable.
pub struct Sort {
    extractor: Extractor,
    numeric: bool,
    descending: bool,
}

impl Configure for Sort {
    fn configure(options: &StageOptions) -> Result<Self> {
        Ok(Sort {
            extractor: Extractor::with_value_symbol(&options.str_or("path", "value")),
            numeric: options.flag("numeric")?,
            descending: options.flag("descending")?,
        })
    }
}

impl Sort {
    fn key(&self, entry: &Entry) -> Option<SortKey> {
        let value = self.extractor.extract(entry.value());
        if self.numeric {
            as_number(&value).map(SortKey::Number)
        } else if value.is_null() {
            None
        } else {
            Some(SortKey::Text(force_string(&value)))
        }
    }

    fn sort_all(&self, source: EntryStream<'_>) -> Vec<Result<Entry>> {
        let mut keyed: Vec<(Entry, SortKey)> = Vec::new();
        let mut unkeyed: Vec<Entry> = Vec::new();
        let mut fault = None;
        for item in source {
            match item {
                Ok(entry) => match self.key(&entry) {
                    Some(key) => keyed.push((entry, key)),
                    None => unkeyed.push(entry),
                },
                Err(e) => {
                    fault = Some(e);
                    break;
                }
            }
        }
        keyed.sort_by(|a, b| {
            let ord = a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal);
            if self.descending { ord.reverse() } else { ord }
        });
        let sorted = keyed.into_iter().map(|(entry, _)| entry);
        let mut out: Vec<Result<Entry>> = if self.descending {
            sorted.chain(unkeyed).map(Ok).collect()
        } else {
            unkeyed.into_iter().chain(sorted).map(Ok).collect()
        };
        if let Some(e) = fault {
            out.push(Err(e));
        }
        out
    }
}

impl Stage for Sort {
    fn stream<'a>(&'a self, source: EntryStream<'a>) -> EntryStream<'a> {
        let mut source = Some(source);
        let mut sorted = Vec::new().into_iter();
        Box::new(std::iter::from_fn(move || {
            if let Some(src) = source.take() {
                sorted = self.sort_all(src).into_iter();
            }
            sorted.next()
        }))
    }
}

// ---- Breakdown ----

struct Bucket {
    value: Value,
    count: u64,
    inputs: Vec<Value>,
}

/// Count entries per distinct value (or per tuple of `group_by` paths), in first-seen order.
/// Replaces the stream with one entry per group, or with `append_summary` passes entries
/// through and appends a single summary entry.
pub struct ValueBreakdown {
    inputs: bool,
    append: bool,
    group_by: Vec<Extractor>,
}

impl Configure for ValueBreakdown {
    fn configure(options: &StageOptions) -> Result<Self> {
        let group_by = options
            .str_or("group_by", "value")
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(Extractor::with_value_symbol)
            .collect();
        Ok(ValueBreakdown {
            inputs: options.flag("inputs")?,
            append: options.flag("append_summary")?,
            group_by,
        })
    }
}

impl ValueBreakdown {
    fn group_key(&self, entry: &Entry) -> Value {
        let mut keys: Vec<Value> = self
            .group_by
            .iter()
            .map(|e| e.extract(entry.value()))
            .collect();
        if keys.len() == 1 {
            keys.remove(0)
        } else {
            Value::Array(keys)
        }
    }

    fn tally(&self, buckets: &mut Vec<Bucket>, seen: &mut HashMap<String, usize>, entry: &Entry) {
        let key = self.group_key(entry);
        let slot = *seen.entry(key.to_string()).or_insert_with(|| {
            buckets.push(Bucket {
                value: key,
                count: 0,
                inputs: Vec::new(),
            });
            buckets.len() - 1
        });
        let bucket = &mut buckets[slot];
        bucket.count += 1;
        if self.inputs {
            bucket.inputs.push(entry.original_value().clone());
        }
    }

    fn bucket_value(&self, bucket: Bucket) -> Value {
        let mut meta = Map::new();
        meta.insert("value".to_string(), bucket.value);
        meta.insert("count".to_string(), json!(bucket.count));
        if self.inputs {
            meta.insert("inputs".to_string(), Value::Array(bucket.inputs));
        }
        Value::Object(meta)
    }

    fn summary(&self, buckets: Vec<Bucket>) -> Vec<Result<Entry>> {
        let values: Vec<Value> = buckets.into_iter().map(|b| self.bucket_value(b)).collect();
        if self.append {
            vec![Ok(Entry::new(Value::Array(values)))]
        } else {
            values.into_iter().map(|v| Ok(Entry::new(v))).collect()
        }
    }
}

impl Stage for ValueBreakdown {
    fn stream<'a>(&'a self, source: EntryStream<'a>) -> EntryStream<'a> {
        let mut source = Some(source);
        let mut buckets: Vec<Bucket> = Vec::new();
        let mut seen: HashMap<String, usize> = HashMap::new();
        let mut pending = Vec::new().into_iter();
        Box::new(std::iter::from_fn(move || {
            loop {
                if let Some(item) = pending.next() {
                    return Some(item);
                }
                let src = source.as_mut()?;
                match src.next() {
                    Some(Ok(entry)) => {
                        self.tally(&mut buckets, &mut seen, &entry);
                        if self.append {
                            return Some(Ok(entry));
                        }
                    }
                    Some(Err(e)) => return Some(Err(e)),
                    None => {
                        source = None;
                        pending = self.summary(std::mem::take(&mut buckets)).into_iter();
                    }
                }
            }
        }))
    }
}
