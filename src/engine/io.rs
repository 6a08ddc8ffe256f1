//! Line-oriented generator and consumer for files and stdio.

use anyhow::{Context, Result};
use log::debug;
use serde_json::Value;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};

use crate::entry::EntryFactory;
use crate::pipeline::{Consumer, EntryStream, Generator};
use crate::utils::config::StreamlineConsts;

use super::tools::{expand_home, force_string};

/// One entry per line of a file (or stdin for `-`). Line terminators are stripped.
pub struct FileReader {
    source: String,
    error_value: Value,
    keep_trailing_newline: bool,
}

impl FileReader {
    pub fn new(source: &str, error_value: Value) -> Self {
        FileReader {
            source: source.to_string(),
            error_value,
            keep_trailing_newline: false,
        }
    }

    /// Emit a final empty entry when the input ends with a newline.
    pub fn keep_trailing_newline(mut self, keep: bool) -> Self {
        self.keep_trailing_newline = keep;
        self
    }

    fn open(&self) -> Result<Box<dyn BufRead>> {
        if self.source == StreamlineConsts::STDIO {
            return Ok(Box::new(BufReader::new(std::io::stdin())));
        }
        let path = expand_home(&self.source);
        let file = File::open(&path).with_context(|| format!("open input {}", path.display()))?;
        Ok(Box::new(BufReader::new(file)))
    }
}

impl Generator for FileReader {
    fn stream(&mut self) -> Result<EntryStream<'_>> {
        let mut reader = self.open()?;
        let mut factory = EntryFactory::new(self.error_value.clone());
        let keep_trailing = self.keep_trailing_newline;
        let mut ended_with_newline = false;
        let mut done = false;
        let mut buf = Vec::new();
        debug!("Reading entries from {}", self.source);
        Ok(Box::new(std::iter::from_fn(move || {
            if done {
                return None;
            }
            buf.clear();
            match reader.read_until(StreamlineConsts::LINE_DELIMITER, &mut buf) {
                Ok(0) => {
                    done = true;
                    (keep_trailing && ended_with_newline)
                        .then(|| Ok(factory.make(Value::String(String::new()))))
                }
                Ok(_) => {
                    ended_with_newline = buf.last() == Some(&StreamlineConsts::LINE_DELIMITER);
                    if ended_with_newline {
                        buf.pop();
                        if buf.last() == Some(&b'\r') {
                            buf.pop();
                        }
                    }
                    let line = String::from_utf8_lossy(&buf).into_owned();
                    Some(Ok(factory.make(Value::String(line))))
                }
                Err(e) => {
                    done = true;
                    Some(Err(anyhow::Error::new(e).context("read input line")))
                }
            }
        })))
    }
}

/// Newline-separated output to a file (or stdout for `-`), flushed after every entry.
///
/// A target containing `{input}` writes each entry to its own file, named by substituting the
/// entry's original input.
pub struct FileWriter {
    target: String,
    closing_newline: bool,
}

impl FileWriter {
    pub fn new(target: &str) -> Self {
        FileWriter {
            target: target.to_string(),
            closing_newline: false,
        }
    }

    pub fn closing_newline(mut self, closing: bool) -> Self {
        self.closing_newline = closing;
        self
    }

    fn is_templated(&self) -> bool {
        self.target.contains("{input}")
    }

    fn open(&self, name: &str) -> Result<Box<dyn Write>> {
        if name == StreamlineConsts::STDIO {
            return Ok(Box::new(BufWriter::new(std::io::stdout().lock())));
        }
        let path = expand_home(name);
        let file =
            File::create(&path).with_context(|| format!("create output {}", path.display()))?;
        Ok(Box::new(BufWriter::new(file)))
    }

    fn drain_per_input(&self, source: EntryStream<'_>) -> Result<usize> {
        let mut count = 0;
        for item in source {
            let entry = item?;
            let name = self
                .target
                .replace("{input}", &force_string(entry.original_value()));
            let mut out = self.open(&name)?;
            out.write_all(force_string(entry.value()).as_bytes())?;
            if self.closing_newline {
                out.write_all(b"\n")?;
            }
            out.flush().with_context(|| format!("write {name}"))?;
            count += 1;
        }
        Ok(count)
    }

    fn drain_joined(&self, source: EntryStream<'_>) -> Result<usize> {
        let mut out = self.open(&self.target)?;
        let mut count = 0;
        for item in source {
            let entry = item?;
            if count > 0 {
                out.write_all(b"\n")?;
            }
            out.write_all(force_string(entry.value()).as_bytes())?;
            out.flush()
                .with_context(|| format!("write {}", self.target))?;
            count += 1;
        }
        if self.closing_newline && count > 0 {
            out.write_all(b"\n")?;
        }
        out.flush()?;
        Ok(count)
    }
}

impl Consumer for FileWriter {
    fn drain(&mut self, source: EntryStream<'_>) -> Result<usize> {
        if self.is_templated() {
            self.drain_per_input(source)
        } else {
            self.drain_joined(source)
        }
    }
}
