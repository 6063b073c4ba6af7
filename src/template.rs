//! Template interpolation for stream definitions
//!
//! Handles `{{ variable }}` interpolation for cursor bounds and partition
//! values. Supports nested access like `{{ config.start_date }}` and
//! `{{ partition.account_id }}`, plus the clock variables `{{ now }}` and
//! `{{ today }}`.
//!
//! Components depend on the [`Evaluator`] trait only; [`TemplateEvaluator`]
//! is the default implementation and is injected at construction.

use crate::error::{Error, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use regex::Regex;
use serde_json::Value;
use std::fmt;

/// Context for template interpolation
#[derive(Debug, Clone, Default)]
pub struct EvalContext {
    /// Connector configuration values
    pub config: Value,
    /// Current partition values
    pub partition: Value,
    /// Clock reading used for `now` and `today`
    pub now: Option<DateTime<Utc>>,
}

impl EvalContext {
    /// Create a new empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Create context with config values
    pub fn with_config(config: Value) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// Set config values
    pub fn set_config(&mut self, config: Value) -> &mut Self {
        self.config = config;
        self
    }

    /// Set partition values
    pub fn set_partition(&mut self, partition: Value) -> &mut Self {
        self.partition = partition;
        self
    }

    /// Pin the clock reading
    pub fn set_now(&mut self, now: DateTime<Utc>) -> &mut Self {
        self.now = Some(now);
        self
    }

    /// Get a value by path (e.g., "config.start_date")
    pub fn get(&self, path: &str) -> Option<Value> {
        let parts: Vec<&str> = path.split('.').collect();

        // First part determines the root object
        let root = match parts[0] {
            "now" if parts.len() == 1 => {
                let now = self.now.unwrap_or_else(Utc::now);
                return Some(Value::String(
                    now.to_rfc3339_opts(SecondsFormat::AutoSi, true),
                ));
            }
            "today" if parts.len() == 1 => {
                let now = self.now.unwrap_or_else(Utc::now);
                return Some(Value::String(now.format("%Y-%m-%d").to_string()));
            }
            "config" => &self.config,
            "partition" => &self.partition,
            // Also support top-level access to config fields directly
            _ => {
                return get_nested_value(&self.config, &parts).cloned();
            }
        };

        get_nested_value(root, &parts[1..]).cloned()
    }
}

/// Get a nested value from a JSON value by path
fn get_nested_value<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    let mut current = value;
    for part in path {
        match current {
            Value::Object(map) => {
                current = map.get(*part)?;
            }
            _ => return None,
        }
    }
    Some(current)
}

/// Resolves expressions against a context
///
/// Cursor and partition components only see this trait, so the expression
/// language can be swapped without touching them.
pub trait Evaluator: Send + Sync + fmt::Debug {
    /// Resolve a template to a value
    ///
    /// A template consisting of a single `{{ expr }}` resolves to the typed
    /// value it points at; anything else renders to a string.
    fn resolve(&self, template: &str, ctx: &EvalContext) -> Result<Value>;

    /// Resolve a template and render the result as a string
    fn resolve_string(&self, template: &str, ctx: &EvalContext) -> Result<String> {
        Ok(value_to_string(&self.resolve(template, ctx)?))
    }
}

/// Default `{{ path.to.value }}` evaluator
///
/// Each instance owns its compiled pattern.
#[derive(Debug, Clone)]
pub struct TemplateEvaluator {
    pattern: Regex,
    whole: Regex,
    strict: bool,
}

impl Default for TemplateEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateEvaluator {
    /// Create an evaluator that fails on undefined variables
    pub fn new() -> Self {
        let expr = r"\{\{\s*([a-zA-Z_][a-zA-Z0-9_]*(?:\.[a-zA-Z_][a-zA-Z0-9_]*)*)\s*\}\}";
        Self {
            pattern: Regex::new(expr).unwrap(),
            whole: Regex::new(&format!("^{expr}$")).unwrap(),
            strict: true,
        }
    }

    /// Create an evaluator that leaves undefined variables as-is
    pub fn lenient() -> Self {
        Self {
            strict: false,
            ..Self::new()
        }
    }

    /// Check if a string contains template variables
    pub fn has_templates(&self, s: &str) -> bool {
        self.pattern.is_match(s)
    }

    /// Extract all variable names from a template
    pub fn extract_variables(&self, template: &str) -> Vec<String> {
        self.pattern
            .captures_iter(template)
            .map(|cap| cap[1].to_string())
            .collect()
    }

    /// Render a template string with the given context
    pub fn render(&self, template: &str, ctx: &EvalContext) -> Result<String> {
        let mut errors = Vec::new();

        let rendered = self.pattern.replace_all(template, |cap: &regex::Captures<'_>| {
            match ctx.get(&cap[1]) {
                Some(value) => value_to_string(&value),
                None => {
                    errors.push(cap[1].to_string());
                    cap[0].to_string()
                }
            }
        });

        if errors.is_empty() || !self.strict {
            Ok(rendered.into_owned())
        } else {
            Err(Error::undefined_var(errors.join(", ")))
        }
    }
}

impl Evaluator for TemplateEvaluator {
    fn resolve(&self, template: &str, ctx: &EvalContext) -> Result<Value> {
        let trimmed = template.trim();
        if let Some(cap) = self.whole.captures(trimmed) {
            return match ctx.get(&cap[1]) {
                Some(value) => Ok(value),
                None if self.strict => Err(Error::undefined_var(&cap[1])),
                None => Ok(Value::String(template.to_string())),
            };
        }
        Ok(Value::String(self.render(template, ctx)?))
    }
}

/// Convert a JSON value to a string for template substitution
fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        // For complex types, use JSON serialization
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
