//! Built-in blocking handlers. Each runs on the scheduler pool inside a bounded executor.

use anyhow::{Context, Result};
use log::debug;
use serde_json::{Value, json};
use std::process::Command;
use std::time::Duration;

use crate::pipeline::{Configure, Handle};

use super::registry::StageOptions;
use super::tools::{force_string, shell_quote};

/// Run a shell command per value. `{value}` in the command is replaced by the shell-quoted value.
/// Produces `{stdout, stderr, exit_code}`; a non-zero exit is not an error.
pub struct ShellHandler {
    command: String,
}

impl ShellHandler {
    pub fn new(command: &str) -> Self {
        ShellHandler {
            command: command.to_string(),
        }
    }

    fn render(&self, value: &Value) -> String {
        self.command
            .replace("{value}", &shell_quote(&force_string(value)))
    }
}

impl Configure for ShellHandler {
    fn configure(options: &StageOptions) -> Result<Self> {
        Ok(ShellHandler::new(&options.str_or("command", "echo {value}")))
    }
}

impl Handle for ShellHandler {
    fn handle(&self, value: Value) -> Result<Value> {
        let command = self.render(&value);
        debug!("sh -c {}", command);
        let output = Command::new("sh")
            .arg("-c")
            .arg(&command)
            .output()
            .with_context(|| format!("spawn `{command}`"))?;
        Ok(json!({
            "stdout": String::from_utf8_lossy(&output.stdout),
            "stderr": String::from_utf8_lossy(&output.stderr),
            "exit_code": output.status.code(),
        }))
    }
}

/// Identity after a fixed delay.
pub struct SleepHandler {
    delay: Duration,
}

impl SleepHandler {
    pub fn new(delay: Duration) -> Self {
        SleepHandler { delay }
    }
}

impl Configure for SleepHandler {
    fn configure(options: &StageOptions) -> Result<Self> {
        let seconds: f64 = options.parsed_or("seconds", 1.0)?;
        let delay = Duration::try_from_secs_f64(seconds)
            .with_context(|| format!("sleep seconds {seconds}"))?;
        Ok(SleepHandler::new(delay))
    }
}

impl Handle for SleepHandler {
    fn handle(&self, value: Value) -> Result<Value> {
        std::thread::sleep(self.delay);
        Ok(value)
    }
}
