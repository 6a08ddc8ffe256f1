//! Path extraction over nested JSON values.
//!
//! Syntax: dot-delimited segments; `[n]` indexes an array, `[*]` fans out over array elements,
//! a bare `*` segment fans out over object values. Examples: `foo.bar[0]`, `foo.*`, `foo.numbers[*]`.
//! Lookups never fail: a missing key, wrong type or bad index resolves to `null`.

use serde_json::Value;

static NULL: Value = Value::Null;

/// One parsed step of an extraction path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Selector {
    Name(String),
    Index(i64),
    WildcardIndex,
    WildcardName,
}

/// Compile `path` into selectors. Empty segments are skipped; a segment that does not fit
/// `name?([int]|[*])*` is kept whole as a plain name.
pub fn parse_selectors(path: &str) -> Vec<Selector> {
    path.split('.')
        .filter(|segment| !segment.is_empty())
        .flat_map(parse_segment)
        .collect()
}

fn parse_segment(segment: &str) -> Vec<Selector> {
    if segment == "*" {
        return vec![Selector::WildcardName];
    }
    let (name, mut rest) = match segment.find('[') {
        Some(pos) => segment.split_at(pos),
        None => (segment, ""),
    };
    let mut selectors = Vec::new();
    match name {
        "" => {}
        "*" => selectors.push(Selector::WildcardName),
        n => selectors.push(Selector::Name(n.to_string())),
    }
    while !rest.is_empty() {
        let Some(group) = rest.strip_prefix('[').and_then(|r| r.split_once(']')) else {
            return vec![Selector::Name(segment.to_string())];
        };
        let (inner, remaining) = group;
        let selector = match inner {
            "*" => Selector::WildcardIndex,
            n => match n.parse::<i64>() {
                Ok(i) => Selector::Index(i),
                Err(_) => return vec![Selector::Name(segment.to_string())],
            },
        };
        selectors.push(selector);
        rest = remaining;
    }
    selectors
}

/// Walk `data` along `selectors`, left to right.
pub fn extract_path(data: &Value, selectors: &[Selector]) -> Value {
    let mut current = data;
    for (i, selector) in selectors.iter().enumerate() {
        match selector {
            Selector::Name(name) => {
                current = current
                    .as_object()
                    .and_then(|map| map.get(name))
                    .unwrap_or(&NULL);
            }
            Selector::Index(idx) => {
                current = current
                    .as_array()
                    .and_then(|items| index_from(items.len(), *idx).map(|i| &items[i]))
                    .unwrap_or(&NULL);
            }
            Selector::WildcardIndex => {
                let rest = &selectors[i + 1..];
                return match current {
                    Value::Array(items) => {
                        Value::Array(items.iter().map(|v| extract_path(v, rest)).collect())
                    }
                    _ => Value::Array(Vec::new()),
                };
            }
            Selector::WildcardName => {
                let rest = &selectors[i + 1..];
                return match current {
                    Value::Object(map) => {
                        Value::Array(map.values().map(|v| extract_path(v, rest)).collect())
                    }
                    _ => Value::Array(Vec::new()),
                };
            }
        }
    }
    current.clone()
}

fn index_from(len: usize, idx: i64) -> Option<usize> {
    if idx < 0 {
        len.checked_sub(idx.unsigned_abs() as usize)
    } else {
        let idx = idx as usize;
        (idx < len).then_some(idx)
    }
}

/// Compiled, reusable extraction path. Stateless; safe to share across threads.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Extractor {
    selectors: Vec<Selector>,
}

impl Extractor {
    pub fn new(path: &str) -> Self {
        Extractor {
            selectors: parse_selectors(path),
        }
    }

    /// Like [`Extractor::new`], but a leading `value` segment refers to the value itself
    /// (`value.foo` == `foo`, `value` == identity).
    pub fn with_value_symbol(path: &str) -> Self {
        let mut selectors = parse_selectors(path);
        if matches!(selectors.first(), Some(Selector::Name(n)) if n == "value") {
            selectors.remove(0);
        }
        Extractor { selectors }
    }

    pub fn selectors(&self) -> &[Selector] {
        &self.selectors
    }

    pub fn is_identity(&self) -> bool {
        self.selectors.is_empty()
    }

    pub fn extract(&self, data: &Value) -> Value {
        extract_path(data, &self.selectors)
    }
}
