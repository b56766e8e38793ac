//! Tunable parameter declarations.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::ConfigError;
use crate::schema::{join, SchemaReport};

/// Inclusive numeric range a parameter is sampled from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Boundary {
    pub min_value: f64,
    pub max_value: f64,
}

impl Boundary {
    pub fn new(min_value: f64, max_value: f64) -> Result<Self, ConfigError> {
        let boundary = Self {
            min_value,
            max_value,
        };
        let mut report = SchemaReport::new("boundary");
        boundary.check("boundary", &mut report);
        report.finish()?;
        Ok(boundary)
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min_value && value <= self.max_value
    }

    pub fn width(&self) -> f64 {
        self.max_value - self.min_value
    }

    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min_value, self.max_value)
    }

    fn check(&self, field: &str, report: &mut SchemaReport) {
        if !self.min_value.is_finite() || !self.max_value.is_finite() {
            report.push(field, "bounds must be finite");
        } else if !self.width().is_finite() {
            report.push(
                field,
                format!(
                    "range [{}, {}] is too wide to sample",
                    self.min_value, self.max_value
                ),
            );
        } else if self.min_value > self.max_value {
            report.push(
                field,
                format!(
                    "min_value {} is greater than max_value {}",
                    self.min_value, self.max_value
                ),
            );
        }
    }
}

/// One tunable parameter. `name` is the key the trainer reads from its
/// override file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub boundary: Boundary,
}

/// Ordered, named collection of tunable parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptimizeParams {
    entries: Vec<(String, Param)>,
}

impl OptimizeParams {
    /// Build and validate from `(logical name, param)` pairs.
    pub fn new(entries: Vec<(String, Param)>) -> Result<Self, ConfigError> {
        let mut report = SchemaReport::new("parameters");
        let mut seen: Vec<&str> = Vec::new();
        for (label, param) in &entries {
            let field = label.as_str();
            check_config_key(&join(field, "name"), &param.name, &mut report);
            param.boundary.check(&join(field, "boundary"), &mut report);
            if seen.contains(&param.name.as_str()) {
                report.push(&join(field, "name"), format!("duplicate config key '{}'", param.name));
            }
            seen.push(&param.name);
        }
        report.finish()?;
        Ok(Self { entries })
    }

    /// Parse the declaration document stored under `key`, e.g.
    /// `{"margin": {"name": "MARGIN", "boundary": {"min_value": 0.1, "max_value": 1.0}}}`.
    pub fn from_value(key: &str, value: &Value) -> Result<Self, ConfigError> {
        let mut report = SchemaReport::new(key);
        let mut entries = Vec::new();

        if let Some(object) = report.object(key, value) {
            if object.is_empty() {
                report.push(key, "at least one parameter is required");
            }
            for (label, decl) in object {
                let field = join(key, label);
                let Some(decl) = report.object(&field, decl) else {
                    continue;
                };
                report.deny_unknown(&field, decl, &["name", "boundary"]);
                let name = report.string(&field, decl, "name");

                let boundary_field = join(&field, "boundary");
                let boundary = report
                    .require(&field, decl, "boundary")
                    .and_then(|b| report.object(&boundary_field, b))
                    .and_then(|b| {
                        report.deny_unknown(&boundary_field, b, &["min_value", "max_value"]);
                        let min_value = report.number(&boundary_field, b, "min_value");
                        let max_value = report.number(&boundary_field, b, "max_value");
                        Some(Boundary {
                            min_value: min_value?,
                            max_value: max_value?,
                        })
                    });

                if let Some(name) = &name {
                    check_config_key(&join(&field, "name"), name, &mut report);
                }
                if let Some(boundary) = &boundary {
                    boundary.check(&boundary_field, &mut report);
                }
                if let (Some(name), Some(boundary)) = (name, boundary) {
                    if entries.iter().any(|(_, p): &(String, Param)| p.name == name) {
                        report.push(&join(&field, "name"), format!("duplicate config key '{name}'"));
                    }
                    entries.push((label.clone(), Param { name, boundary }));
                }
            }
        }

        report.finish()?;
        Ok(Self { entries })
    }

    pub fn get(&self, label: &str) -> Option<&Param> {
        self.entries
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, p)| p)
    }

    /// `(logical name, param)` pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Param)> {
        self.entries.iter().map(|(l, p)| (l.as_str(), p))
    }

    pub fn params(&self) -> impl Iterator<Item = &Param> {
        self.entries.iter().map(|(_, p)| p)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A name the override file can carry as `KEY=VALUE`.
pub fn check_config_key(field: &str, name: &str, report: &mut SchemaReport) {
    if name.is_empty() {
        report.push(field, "config key must not be empty");
    } else if name.contains('=') || name.chars().any(char::is_whitespace) {
        report.push(
            field,
            format!("config key '{name}' must not contain '=' or whitespace"),
        );
    }
}
