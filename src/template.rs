//! `{dot.path}` placeholder substitution.
//!
//! There is deliberately no escaping, no conditionals and no loops: a
//! placeholder either resolves to a scalar on the record or stays in the
//! output verbatim.
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::resolve::{resolve, scalar_text};

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{[A-Za-z_.]+\}").expect("valid placeholder pattern"));

/// Placeholder text (`{a.b}`) mapped to its substituted value.
pub type Replacements = BTreeMap<String, String>;

/// Runs after substitution and may rewrite the final text, e.g. to fit a
/// destination's length limit.
pub trait PostProcess: Send + Sync {
    fn apply(&self, output: String, replacements: &Replacements, record: &Value) -> String;
}

#[derive(Default)]
pub struct Renderer {
    hooks: Vec<Box<dyn PostProcess>>,
}

impl Renderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a post-processing hook. Hooks run in registration order.
    pub fn with_hook<H: PostProcess + 'static>(mut self, hook: H) -> Self {
        self.hooks.push(Box::new(hook));
        self
    }

    pub fn render(&self, template: &str, record: &Value) -> String {
        let replacements = replacements_for(template, record);
        let output = substitute(template, &replacements);
        self.hooks
            .iter()
            .fold(output, |out, hook| hook.apply(out, &replacements, record))
    }
}

/// Render without any hooks.
pub fn render(template: &str, record: &Value) -> String {
    let replacements = replacements_for(template, record);
    substitute(template, &replacements)
}

/// Resolve every distinct placeholder in `template` that has a scalar value.
pub fn replacements_for(template: &str, record: &Value) -> Replacements {
    let mut out = Replacements::new();
    for m in PLACEHOLDER.find_iter(template) {
        let placeholder = m.as_str();
        if out.contains_key(placeholder) {
            continue;
        }
        let path = &placeholder[1..placeholder.len() - 1];
        if let Some(text) = resolve(record, path).and_then(scalar_text) {
            out.insert(placeholder.to_string(), text);
        }
    }
    out
}

// Single pass over the original template, so substituted values are never
// themselves scanned for placeholders.
fn substitute(template: &str, replacements: &Replacements) -> String {
    if replacements.is_empty() {
        return template.to_string();
    }
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| {
            let matched = &caps[0];
            replacements
                .get(matched)
                .cloned()
                .unwrap_or_else(|| matched.to_string())
        })
        .into_owned()
}

/// Trims rendered text to at most `max_chars` characters, ending in `…`
/// when anything was cut.
#[derive(Debug, Clone, Copy)]
pub struct TruncateHook {
    pub max_chars: usize,
}

impl PostProcess for TruncateHook {
    fn apply(&self, output: String, _replacements: &Replacements, _record: &Value) -> String {
        if self.max_chars == 0 || output.chars().count() <= self.max_chars {
            return output;
        }
        let keep = self.max_chars - 1;
        let mut trimmed: String = output.chars().take(keep).collect();
        trimmed.truncate(trimmed.trim_end().len());
        trimmed.push('…');
        trimmed
    }
}
