//! Stage registry: names and option strings to [`StageKind`]s, and pipeline assembly.

use anyhow::Result;
use log::debug;
use std::collections::BTreeMap;
use std::fmt::Display;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::StreamlineError;
use crate::pipeline::{
    Configure, Handle, Pipeline, PipelineContext, Shorthand, Stage, StageFn, StageKind,
    history_collapse, history_pop, history_push, history_reset, history_values,
};

use super::evaluate::{EvalFilter, EvalTransform, Evaluate};
use super::handlers::{ShellHandler, SleepHandler};
use super::stages;

/// `key=value` options for one stage. Keys are normalised (`-` → `_`); a bare key means `true`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StageOptions {
    values: BTreeMap<String, String>,
}

impl StageOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the body of `name{k=v,k2=v2}`.
    ///
    /// A comma only separates pairs when the next option name follows it (`key=`, a bare
    /// `flag`, or the end of another flag). Anything else stays in the value, so
    /// `delimiter=,` and `command=echo a{1,2}` survive intact. `\,` is always a literal comma.
    pub fn parse(body: &str) -> Result<Self, StreamlineError> {
        let mut options = StageOptions::new();
        let pairs = split_pairs(body);
        for pair in pairs.iter().map(|p| p.trim()).filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, "true"));
            let key = key.trim();
            if key.is_empty() {
                return Err(StreamlineError::config(format!(
                    "empty option name in {{{body}}}"
                )));
            }
            options.set(key, value.trim());
        }
        Ok(options)
    }

    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: &str, value: &str) {
        self.values.insert(key.replace('-', "_"), value.to_string());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn str_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or(default).to_string()
    }

    pub fn require(&self, key: &str) -> Result<&str, StreamlineError> {
        self.get(key)
            .ok_or_else(|| StreamlineError::config(format!("missing option `{key}`")))
    }

    pub fn parsed<T>(&self, key: &str) -> Result<Option<T>, StreamlineError>
    where
        T: FromStr,
        T::Err: Display,
    {
        self.get(key)
            .map(|raw| {
                raw.parse::<T>().map_err(|e| {
                    StreamlineError::config(format!("option `{key}`: {raw:?}: {e}"))
                })
            })
            .transpose()
    }

    pub fn parsed_or<T>(&self, key: &str, default: T) -> Result<T, StreamlineError>
    where
        T: FromStr,
        T::Err: Display,
    {
        Ok(self.parsed(key)?.unwrap_or(default))
    }

    pub fn flag(&self, key: &str) -> Result<bool, StreamlineError> {
        self.parsed_or(key, false)
    }
}

fn split_pairs(body: &str) -> Vec<String> {
    let mut pairs = Vec::new();
    let mut current = String::new();
    let mut chars = body.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' if chars.peek().is_some_and(|&(_, next)| next == ',') => {
                chars.next();
                current.push(',');
            }
            ',' if starts_new_pair(&body[i + 1..]) => pairs.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    pairs.push(current);
    pairs
}

/// `rest` begins with an option name followed by `=`, `,` or the end of the body.
fn starts_new_pair(rest: &str) -> bool {
    let rest = rest.trim_start();
    if !rest.starts_with(|c: char| c.is_alphabetic() || c == '_') {
        return false;
    }
    let key_len = rest
        .find(|c: char| !(c.is_alphanumeric() || c == '_' || c == '-'))
        .unwrap_or(rest.len());
    let after = rest[key_len..].trim_start();
    after.is_empty() || after.starts_with('=') || after.starts_with(',')
}

/// One stage token from the command line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StageSpec {
    Plain { name: String, options: StageOptions },
    Shorthand(Shorthand),
}

impl StageSpec {
    /// `name`, `name{k=v,...}` or `[target=]stage(input, output)`.
    pub fn parse(token: &str) -> Result<Self, StreamlineError> {
        let token = token.trim();
        if Shorthand::looks_like(token) {
            return Shorthand::parse(token).map(StageSpec::Shorthand);
        }
        let (name, options) = match token.split_once('{') {
            Some((name, rest)) => {
                let body = rest.strip_suffix('}').ok_or_else(|| {
                    StreamlineError::config(format!("unterminated options in `{token}`"))
                })?;
                (name, StageOptions::parse(body)?)
            }
            None => (token, StageOptions::new()),
        };
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_alphanumeric() || "-_.:".contains(c));
        if !valid {
            return Err(StreamlineError::config(format!(
                "invalid stage name `{name}`"
            )));
        }
        Ok(StageSpec::Plain {
            name: name.to_string(),
            options,
        })
    }
}

pub type StageFactory = Arc<dyn Fn(&StageOptions) -> Result<StageKind> + Send + Sync>;

/// Name → stage factory.
#[derive(Clone, Default)]
pub struct Registry {
    factories: BTreeMap<String, StageFactory>,
}

impl Registry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry with every built-in stage and handler.
    pub fn with_builtins() -> Self {
        let mut r = Registry::empty();
        r.register_fn("noop", stages::noop);
        r.register_fn("json", stages::json_parser);
        r.register_fn("truthy", stages::truthy);
        r.register_fn("falsey", stages::falsey);
        r.register_fn("split_list", stages::split_lists);
        r.register_fn("inputs", stages::input_values);
        r.register_fn("errors", stages::error_values);
        r.register_fn("filter_out_errors", stages::filter_out_errors);
        r.register_fn("history:push", history_push);
        r.register_fn("history:pop", history_pop);
        r.register_fn("history:collapse", history_collapse);
        r.register_fn("history:reset", history_reset);
        r.register_fn("history:values", history_values);

        r.register_configured::<crate::pipeline::ExtractStage>("extract");
        r.register_configured::<crate::pipeline::Combiner>("combine");
        r.register_configured::<stages::Split>("split");
        r.register_configured::<stages::InputHeaders>("headers");
        r.register_configured::<stages::StreamingBuffer>("buffer");
        r.register_configured::<stages::StripWhitespace>("strip");
        r.register_configured::<stages::Head>("head");
        r.register_configured::<stages::ReadFile>("readfile");
        r.register_configured::<stages::Stats>("stats");
        r.register_configured::<stages::Sort>("sort");
        r.register_configured::<stages::ValueBreakdown>("breakdown");

        r.register_configured_handler::<ShellHandler>("shell");
        r.register_configured_handler::<SleepHandler>("sleep");
        r
    }

    pub fn register<F>(&mut self, name: &str, factory: F) -> &mut Self
    where
        F: Fn(&StageOptions) -> Result<StageKind> + Send + Sync + 'static,
    {
        self.factories.insert(name.to_string(), Arc::new(factory));
        self
    }

    pub fn register_fn(&mut self, name: &str, f: StageFn) -> &mut Self {
        self.register(name, move |_| Ok(StageKind::Function(f)))
    }

    pub fn register_configured<S>(&mut self, name: &str) -> &mut Self
    where
        S: Stage + Configure + 'static,
    {
        self.register(name, |options| Ok(StageKind::stream(S::configure(options)?)))
    }

    pub fn register_configured_handler<H>(&mut self, name: &str) -> &mut Self
    where
        H: Handle + Configure + 'static,
    {
        self.register(name, |options| Ok(StageKind::handler(H::configure(options)?)))
    }

    /// Register one shared handler instance; every use wraps it in its own executor.
    pub fn register_handler<H: Handle + 'static>(&mut self, name: &str, handler: H) -> &mut Self {
        let handler: Arc<dyn Handle> = Arc::new(handler);
        self.register(name, move |_| {
            Ok(StageKind::HandlerObject(Arc::clone(&handler)))
        })
    }

    /// Enable the `eval{code=...}` and `filter{code=...}` stages backed by `evaluator`.
    pub fn register_evaluator(&mut self, evaluator: Arc<dyn Evaluate>) -> &mut Self {
        let for_eval = Arc::clone(&evaluator);
        self.register("eval", move |options| {
            let code = options.require("code")?;
            Ok(StageKind::stream(EvalTransform::new(code, Arc::clone(&for_eval))))
        });
        self.register("filter", move |options| {
            let code = options.require("code")?;
            Ok(StageKind::stream(EvalFilter::new(code, Arc::clone(&evaluator))))
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    pub fn build(&self, name: &str, options: &StageOptions) -> Result<StageKind> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| StreamlineError::config(format!("unknown stage `{name}`")))?;
        factory(options)
    }

    /// Parse `token` and append the resulting stage to `pipeline`.
    pub fn extend_pipeline(&self, pipeline: &mut Pipeline, token: &str) -> Result<()> {
        match StageSpec::parse(token)? {
            StageSpec::Plain { name, options } => {
                let kind = self.build(&name, &options)?;
                pipeline.push_kind(kind);
            }
            StageSpec::Shorthand(shorthand) => {
                let kind = self.build(&shorthand.stage_name, &StageOptions::new())?;
                pipeline.push_wrapped(kind, &shorthand.paths());
            }
        }
        Ok(())
    }

    /// Build a pipeline from stage tokens. Every token is validated before any data flows.
    pub fn build_pipeline<S: AsRef<str>>(
        &self,
        tokens: &[S],
        ctx: PipelineContext,
    ) -> Result<Pipeline> {
        let mut pipeline = Pipeline::new(ctx);
        for token in tokens {
            self.extend_pipeline(&mut pipeline, token.as_ref())?;
        }
        debug!("Built pipeline with {} stages", pipeline.len());
        Ok(pipeline)
    }
}
