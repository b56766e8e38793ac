//! Single-pass validation of declarative config documents.
//!
//! A [`SchemaReport`] walks a `serde_json::Value` tree and records every
//! missing, mistyped or unknown field instead of stopping at the first one.

use serde_json::{Map, Value};

use crate::errors::ConfigError;

/// Accumulates validation issues for one document.
#[derive(Debug, Clone, Default)]
pub struct SchemaReport {
    context: String,
    issues: Vec<String>,
    invalid_goals: Vec<(String, String)>,
}

impl SchemaReport {
    pub fn new(context: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            issues: Vec::new(),
            invalid_goals: Vec::new(),
        }
    }

    pub fn push(&mut self, field: &str, message: impl AsRef<str>) {
        self.issues.push(format!("{field}: {}", message.as_ref()));
    }

    /// Record an unparseable goal direction. Kept apart from the other issues
    /// so a document whose only problem is a goal string reports
    /// [`ConfigError::InvalidGoalDirection`].
    pub fn push_invalid_goal(&mut self, field: &str, value: &str) {
        self.invalid_goals
            .push((field.to_string(), value.to_string()));
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty() && self.invalid_goals.is_empty()
    }

    /// Borrow `value` as an object, recording an issue otherwise.
    pub fn object<'v>(&mut self, field: &str, value: &'v Value) -> Option<&'v Map<String, Value>> {
        match value {
            Value::Object(map) => Some(map),
            other => {
                self.push(field, format!("expected an object, found {}", kind_of(other)));
                None
            }
        }
    }

    /// Record every key of `object` that is not in `allowed`.
    pub fn deny_unknown(&mut self, field: &str, object: &Map<String, Value>, allowed: &[&str]) {
        for key in object.keys() {
            if !allowed.contains(&key.as_str()) {
                self.push(&join(field, key), "unknown field");
            }
        }
    }

    pub fn require<'v>(
        &mut self,
        field: &str,
        object: &'v Map<String, Value>,
        key: &str,
    ) -> Option<&'v Value> {
        let value = object.get(key);
        if value.is_none() {
            self.push(&join(field, key), "missing field");
        }
        value
    }

    pub fn string(&mut self, field: &str, object: &Map<String, Value>, key: &str) -> Option<String> {
        match self.require(field, object, key)? {
            Value::String(s) => Some(s.clone()),
            other => {
                self.push(&join(field, key), format!("expected a string, found {}", kind_of(other)));
                None
            }
        }
    }

    pub fn number(&mut self, field: &str, object: &Map<String, Value>, key: &str) -> Option<f64> {
        match self.require(field, object, key)? {
            Value::Number(n) => n.as_f64(),
            other => {
                self.push(&join(field, key), format!("expected a number, found {}", kind_of(other)));
                None
            }
        }
    }

    pub fn finish(self) -> Result<(), ConfigError> {
        if self.issues.is_empty() {
            if let Some((field, value)) = self.invalid_goals.into_iter().next() {
                return Err(ConfigError::InvalidGoalDirection { field, value });
            }
            return Ok(());
        }

        let mut issues = self.issues;
        issues.extend(
            self.invalid_goals
                .into_iter()
                .map(|(field, value)| format!("{field}: invalid goal direction '{value}'")),
        );
        Err(ConfigError::Schema {
            context: self.context,
            issues,
        })
    }
}

/// Dotted path of `key` below `field`.
pub fn join(field: &str, key: &str) -> String {
    if field.is_empty() {
        key.to_string()
    } else {
        format!("{field}.{key}")
    }
}

/// Short JSON type name used in messages.
pub fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
