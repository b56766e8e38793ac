//! Application settings: a JSON document plus environment overrides.
//!
//! Field names are SCREAMING_SNAKE_CASE so the same name is used in the
//! settings file and as the environment variable that overrides it.

use std::fs;
use std::path::{Path, PathBuf};

use lt_optimizer::{StrategyOptions, TrialContext};
use lt_types::{check_config_key, ConfigError, LogTags, OptimizeParams, SchemaReport};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use lt_types::schema::kind_of;

/// Declared type of a settings field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldKind {
    Str,
    OptStr,
    Int,
    OptInt,
    Float,
    Bool,
    StrList,
}

/// `(name, kind, required)` for every settings field.
const FIELDS: &[(&str, FieldKind, bool)] = &[
    ("INTERPRETER_PATH", FieldKind::Str, true),
    ("TRAINING_SCRIPT_PATH", FieldKind::Str, true),
    ("PRIMARY_CONFIG_PATH", FieldKind::Str, true),
    ("OVERRIDE_FILE_PATH", FieldKind::Str, true),
    ("TRAINING_LOG_PATH", FieldKind::Str, true),
    ("RUN_NAME_KEY", FieldKind::OptStr, false),
    ("PARAMS_KEY", FieldKind::Str, false),
    ("LOG_TAGS_KEY", FieldKind::Str, false),
    ("OBJECTIVES", FieldKind::StrList, false),
    ("N_TRIALS", FieldKind::Int, false),
    ("STRATEGY", FieldKind::Str, false),
    ("EXPLORATION_WEIGHT", FieldKind::Float, false),
    ("GRID_STEPS", FieldKind::Int, false),
    ("SEED", FieldKind::OptInt, false),
    ("ABORT_ON_TRAINING_FAILURE", FieldKind::Bool, false),
    ("STUDY_NAME", FieldKind::Str, false),
    ("REPORT_PATH", FieldKind::OptStr, false),
    ("LOG_LEVEL", FieldKind::Str, false),
    ("LOG_FILE", FieldKind::OptStr, false),
];

/// Immutable settings for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", deny_unknown_fields)]
pub struct Settings {
    pub interpreter_path: PathBuf,
    pub training_script_path: PathBuf,
    pub primary_config_path: PathBuf,
    /// Secondary declaration source and the file patched every trial.
    pub override_file_path: PathBuf,
    pub training_log_path: PathBuf,
    #[serde(default)]
    pub run_name_key: Option<String>,
    #[serde(default = "default_params_key")]
    pub params_key: String,
    #[serde(default = "default_log_tags_key")]
    pub log_tags_key: String,
    #[serde(default = "default_objectives")]
    pub objectives: Vec<String>,
    #[serde(default = "default_n_trials")]
    pub n_trials: usize,
    #[serde(default = "default_strategy")]
    pub strategy: String,
    #[serde(default = "default_exploration_weight")]
    pub exploration_weight: f64,
    #[serde(default = "default_grid_steps")]
    pub grid_steps: usize,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub abort_on_training_failure: bool,
    #[serde(default = "default_study_name")]
    pub study_name: String,
    #[serde(default)]
    pub report_path: Option<PathBuf>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

fn default_params_key() -> String {
    "PARAMS_TO_OPT".to_string()
}

fn default_log_tags_key() -> String {
    "LOG_TAGS".to_string()
}

fn default_objectives() -> Vec<String> {
    vec!["difference".to_string(), "accuracy".to_string()]
}

fn default_n_trials() -> usize {
    10
}

fn default_strategy() -> String {
    "bayesian".to_string()
}

fn default_exploration_weight() -> f64 {
    0.3
}

fn default_grid_steps() -> usize {
    5
}

fn default_study_name() -> String {
    "logtune".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Settings {
    /// Read `path` and apply overrides from the process environment.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Load {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let value: Value = serde_json::from_str(&content).map_err(|e| ConfigError::Load {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        let Value::Object(mut document) = value else {
            return Err(ConfigError::Load {
                path: path.display().to_string(),
                message: "expected a JSON object at the top level".to_string(),
            });
        };
        apply_overrides(&mut document, |name| std::env::var(name).ok())?;
        Self::from_value(&Value::Object(document))
    }

    /// Validate a settings document, reporting every problem in one error.
    pub fn from_value(value: &Value) -> Result<Self, ConfigError> {
        let mut report = SchemaReport::new("settings");
        let Some(document) = report.object("settings", value) else {
            return Err(report_error(report));
        };

        let allowed: Vec<&str> = FIELDS.iter().map(|(name, _, _)| *name).collect();
        report.deny_unknown("", document, &allowed);

        for (name, kind, required) in FIELDS {
            match document.get(*name) {
                None if *required => report.push(name, "missing field"),
                None => {}
                Some(value) => check_kind(name, *kind, value, &mut report),
            }
        }
        report.finish()?;

        let settings: Settings =
            serde_json::from_value(value.clone()).map_err(|e| ConfigError::Invalid {
                message: format!("settings: {e}"),
            })?;
        settings.validate()?;
        Ok(settings)
    }

    /// A copy with every field named by `lookup` replaced, coerced to the
    /// field's type. `OBJECTIVES` is not scalar and is never overridden.
    pub fn with_env_overrides<F>(&self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let Value::Object(mut document) = serde_json::to_value(self).map_err(|e| ConfigError::Invalid {
            message: format!("settings: {e}"),
        })?
        else {
            return Err(ConfigError::Invalid {
                message: "settings did not serialize to an object".to_string(),
            });
        };
        // Unset optionals serialize as null; drop them so they stay optional.
        document.retain(|_, v| !v.is_null());
        apply_overrides(&mut document, lookup)?;
        Self::from_value(&Value::Object(document))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let mut report = SchemaReport::new("settings");
        if self.n_trials == 0 {
            report.push("N_TRIALS", "must be at least 1");
        }
        if self.objectives.is_empty() {
            report.push("OBJECTIVES", "at least one objective is required");
        }
        if !(0.0..=1.0).contains(&self.exploration_weight) {
            report.push("EXPLORATION_WEIGHT", "must be within [0, 1]");
        }
        if self.grid_steps < 2 {
            report.push("GRID_STEPS", "must be at least 2");
        }
        // Both end up in the override file as `RUN_NAME_KEY=<study>_trial_<n>`.
        check_config_key("STUDY_NAME", &self.study_name, &mut report);
        if let Some(key) = &self.run_name_key {
            check_config_key("RUN_NAME_KEY", key, &mut report);
        }
        report.finish()
    }

    pub fn strategy_options(&self) -> StrategyOptions {
        StrategyOptions {
            seed: self.seed,
            exploration_weight: self.exploration_weight,
            grid_steps: self.grid_steps,
        }
    }

    /// Per-trial context for the resolved declarations.
    pub fn trial_context(&self, params: OptimizeParams, tags: &LogTags) -> Result<TrialContext, ConfigError> {
        let objectives = tags.select(&self.objectives)?;
        Ok(TrialContext::new(self.study_name.clone(), params, objectives)
            .with_trials(self.n_trials)
            .with_run_name_key(self.run_name_key.clone())
            .with_abort_on_training_failure(self.abort_on_training_failure))
    }
}

fn report_error(report: SchemaReport) -> ConfigError {
    match report.finish() {
        Err(e) => e,
        Ok(()) => ConfigError::Invalid {
            message: "settings: invalid document".to_string(),
        },
    }
}

fn check_kind(name: &str, kind: FieldKind, value: &Value, report: &mut SchemaReport) {
    let ok = match kind {
        FieldKind::Str => value.is_string(),
        FieldKind::OptStr => value.is_string() || value.is_null(),
        FieldKind::Int => value.is_u64(),
        FieldKind::OptInt => value.is_u64() || value.is_null(),
        FieldKind::Float => value.is_number(),
        FieldKind::Bool => value.is_boolean(),
        FieldKind::StrList => value
            .as_array()
            .map(|items| items.iter().all(Value::is_string))
            .unwrap_or(false),
    };
    if !ok {
        let expected = match kind {
            FieldKind::Str => "a string",
            FieldKind::OptStr => "a string or null",
            FieldKind::Int => "a non-negative integer",
            FieldKind::OptInt => "a non-negative integer or null",
            FieldKind::Float => "a number",
            FieldKind::Bool => "a boolean",
            FieldKind::StrList => "an array of strings",
        };
        report.push(name, format!("expected {expected}, found {}", kind_of(value)));
    }
}

/// Replace every scalar field found by `lookup`, coerced to its declared type.
fn apply_overrides<F>(document: &mut Map<String, Value>, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut issues = Vec::new();
    for (name, kind, _) in FIELDS {
        if *kind == FieldKind::StrList {
            continue;
        }
        let Some(raw) = lookup(name) else {
            continue;
        };
        match coerce(*kind, &raw) {
            Ok(value) => {
                tracing::debug!("Overriding {} from the environment", name);
                document.insert(name.to_string(), value);
            }
            Err(message) => issues.push(format!("{name}='{raw}': {message}")),
        }
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            message: format!("environment overrides: {}", issues.join("; ")),
        })
    }
}

fn coerce(kind: FieldKind, raw: &str) -> Result<Value, String> {
    let trimmed = raw.trim();
    match kind {
        FieldKind::Str => Ok(Value::String(raw.to_string())),
        FieldKind::OptStr if trimmed.is_empty() => Ok(Value::Null),
        FieldKind::OptStr => Ok(Value::String(raw.to_string())),
        FieldKind::OptInt if trimmed.is_empty() => Ok(Value::Null),
        FieldKind::Int | FieldKind::OptInt => trimmed
            .parse::<u64>()
            .map(Value::from)
            .map_err(|e| format!("expected a non-negative integer ({e})")),
        FieldKind::Float => trimmed
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| "expected a finite number".to_string()),
        FieldKind::Bool => match trimmed.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(Value::Bool(true)),
            "false" | "0" | "no" | "off" => Ok(Value::Bool(false)),
            _ => Err("expected a boolean".to_string()),
        },
        FieldKind::StrList => Err("list fields cannot be overridden".to_string()),
    }
}
