//! Layered configuration sources and declaration resolution.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use lt_types::{ConfigError, LogTags, OptimizeParams};
use serde_json::Value;

use crate::patcher::parse_line;

/// Flat mapping of top-level names to values from one source.
pub type ConfigMap = BTreeMap<String, Value>;

/// Primary source overlaid with the secondary source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedConfig {
    values: ConfigMap,
}

impl ResolvedConfig {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Value under `key` unless it is absent or empty.
    pub fn require(&self, key: &str) -> Result<&Value, ConfigError> {
        match self.values.get(key) {
            Some(value) if !is_empty_value(value) => Ok(value),
            _ => Err(ConfigError::MissingRequiredParam {
                key: key.to_string(),
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }
}

/// Null, `false`, and empty strings, arrays or objects count as absent.
/// Numbers, zero included, are always present.
fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        Value::Number(_) => false,
    }
}

/// Parse one source. `.json` files hold a JSON object; anything else is read
/// as `KEY=VALUE` lines whose values are taken as JSON when they parse and as
/// plain strings otherwise.
pub fn load_source<P: AsRef<Path>>(path: P) -> Result<ConfigMap, ConfigError> {
    let path = path.as_ref();
    let load_err = |message: String| ConfigError::Load {
        path: path.display().to_string(),
        message,
    };

    let content = fs::read_to_string(path).map_err(|e| load_err(e.to_string()))?;

    let is_json = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if is_json {
        return match serde_json::from_str::<Value>(&content) {
            Ok(Value::Object(map)) => Ok(map.into_iter().collect()),
            Ok(_) => Err(load_err("expected a JSON object at the top level".to_string())),
            Err(e) => Err(load_err(e.to_string())),
        };
    }

    let mut map = ConfigMap::new();
    for (index, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let (key, raw) = parse_line(trimmed)
            .ok_or_else(|| load_err(format!("line {}: expected KEY=VALUE", index + 1)))?;
        if key.is_empty() {
            return Err(load_err(format!("line {}: empty key", index + 1)));
        }
        map.insert(key.to_string(), parse_scalar(raw));
    }
    Ok(map)
}

fn parse_scalar(raw: &str) -> Value {
    if let Ok(value) = serde_json::from_str::<Value>(raw) {
        return value;
    }
    let unquoted = raw
        .strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .unwrap_or(raw);
    Value::String(unquoted.to_string())
}

/// Load a source, treating a missing or malformed one as empty.
pub fn load_or_empty<P: AsRef<Path>>(path: P) -> ConfigMap {
    let path = path.as_ref();
    if !path.exists() {
        tracing::debug!("Config source {} does not exist", path.display());
        return ConfigMap::new();
    }
    match load_source(path) {
        Ok(map) => map,
        Err(e) => {
            tracing::warn!("{}", e);
            ConfigMap::new()
        }
    }
}

/// `secondary` wins on key collisions; all other primary keys survive.
pub fn merge(primary: ConfigMap, secondary: ConfigMap) -> ResolvedConfig {
    let mut values = primary;
    values.extend(secondary);
    ResolvedConfig { values }
}

/// Resolves a primary source and an optional secondary (override) source.
#[derive(Debug, Clone)]
pub struct ConfigResolver {
    primary_path: PathBuf,
    secondary_path: Option<PathBuf>,
}

impl ConfigResolver {
    pub fn new(primary_path: impl Into<PathBuf>, secondary_path: Option<PathBuf>) -> Self {
        Self {
            primary_path: primary_path.into(),
            secondary_path,
        }
    }

    pub fn resolve(&self) -> ResolvedConfig {
        let primary = load_or_empty(&self.primary_path);
        let secondary = self
            .secondary_path
            .as_ref()
            .map(load_or_empty)
            .unwrap_or_default();
        merge(primary, secondary)
    }

    /// Resolve and validate the parameter and tag declarations.
    pub fn resolve_required(
        &self,
        params_key: &str,
        tags_key: &str,
    ) -> Result<(OptimizeParams, LogTags), ConfigError> {
        let config = self.resolve();
        tracing::debug!(
            "Resolved {} config key(s) from {}",
            config.len(),
            self.primary_path.display()
        );

        let params_value = config.require(params_key)?;
        let tags_value = config.require(tags_key)?;

        let params = OptimizeParams::from_value(params_key, params_value)?;
        let tags = LogTags::from_value(tags_key, tags_value)?;
        Ok((params, tags))
    }
}

/// Shorthand for [`ConfigResolver::resolve_required`].
pub fn resolve_required<P: AsRef<Path>, S: AsRef<Path>>(
    primary_path: P,
    secondary_path: S,
    params_key: &str,
    tags_key: &str,
) -> Result<(OptimizeParams, LogTags), ConfigError> {
    ConfigResolver::new(
        primary_path.as_ref(),
        Some(secondary_path.as_ref().to_path_buf()),
    )
    .resolve_required(params_key, tags_key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lt_types::GoalDirection;
    use serde_json::json;
    use tempfile::tempdir;

    fn map(value: Value) -> ConfigMap {
        match value {
            Value::Object(m) => m.into_iter().collect(),
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn secondary_overrides_and_primary_survives() {
        let primary = map(json!({"EPOCHS": 10, "MARGIN": 0.1, "NAME": "base"}));
        let secondary = map(json!({"MARGIN": 0.7, "LR": 0.01}));
        let merged = merge(primary, secondary);

        assert_eq!(merged.get("MARGIN"), Some(&json!(0.7)));
        assert_eq!(merged.get("EPOCHS"), Some(&json!(10)));
        assert_eq!(merged.get("NAME"), Some(&json!("base")));
        assert_eq!(merged.get("LR"), Some(&json!(0.01)));
        assert_eq!(merged.len(), 4);
    }

    #[test]
    fn merge_property_over_many_pairs() {
        for i in 0..20 {
            let primary = map(json!({"shared": i, "only_primary": i * 2}));
            let secondary = map(json!({"shared": format!("s{i}")}));
            let merged = merge(primary, secondary);
            assert_eq!(merged.get("shared"), Some(&json!(format!("s{i}"))));
            assert_eq!(merged.get("only_primary"), Some(&json!(i * 2)));
        }
    }

    #[test]
    fn missing_and_malformed_sources_are_empty() {
        let dir = tempdir().unwrap();
        assert!(load_or_empty(dir.path().join("absent.json")).is_empty());

        let broken = dir.path().join("broken.json");
        fs::write(&broken, "{ not json").unwrap();
        assert!(load_or_empty(&broken).is_empty());
        assert!(matches!(load_source(&broken), Err(ConfigError::Load { .. })));

        let array = dir.path().join("array.json");
        fs::write(&array, "[1, 2]").unwrap();
        assert!(load_or_empty(&array).is_empty());
    }

    #[test]
    fn key_value_source_parses_json_values() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".env");
        fs::write(
            &path,
            "# overrides\nEPOCHS=12\nNAME=trial_3\nQUOTED='a b'\nTAGS={\"acc\": {\"tag\": \"acc\", \"goal\": \"maximize\"}}\n",
        )
        .unwrap();

        let loaded = load_source(&path).unwrap();
        assert_eq!(loaded["EPOCHS"], json!(12));
        assert_eq!(loaded["NAME"], json!("trial_3"));
        assert_eq!(loaded["QUOTED"], json!("a b"));
        assert_eq!(loaded["TAGS"]["acc"]["goal"], json!("maximize"));
    }

    #[test]
    fn key_value_source_rejects_garbage_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".env");
        fs::write(&path, "EPOCHS=12\nthis is not a pair\n").unwrap();
        match load_source(&path) {
            Err(ConfigError::Load { message, .. }) => assert!(message.contains("line 2")),
            other => panic!("expected load error, got {other:?}"),
        }
    }

    fn declarations() -> Value {
        json!({
            "PARAMS_TO_OPT": {
                "margin": {"name": "MARGIN", "boundary": {"min_value": 0.1, "max_value": 1.0}},
                "learning_rate": {"name": "LR", "boundary": {"min_value": 0.0001, "max_value": 0.01}}
            },
            "LOG_TAGS": {
                "difference": {"tag": "difference", "goal": "minimize"},
                "accuracy": {"tag": "accuracy", "goal": "maximize"}
            }
        })
    }

    #[test]
    fn resolve_required_builds_declarations() {
        let dir = tempdir().unwrap();
        let primary = dir.path().join("config.json");
        fs::write(&primary, declarations().to_string()).unwrap();
        let secondary = dir.path().join(".env");

        let (params, tags) = resolve_required(&primary, &secondary, "PARAMS_TO_OPT", "LOG_TAGS").unwrap();
        assert_eq!(params.len(), 2);
        assert_eq!(tags.get("accuracy").unwrap().goal, GoalDirection::Maximize);
    }

    #[test]
    fn secondary_can_override_declarations() {
        let dir = tempdir().unwrap();
        let primary = dir.path().join("config.json");
        fs::write(&primary, declarations().to_string()).unwrap();
        let secondary = dir.path().join(".env");
        fs::write(
            &secondary,
            "LOG_TAGS={\"accuracy\": {\"tag\": \"val_acc\", \"goal\": \"maximize\"}}\n",
        )
        .unwrap();

        let (_, tags) = resolve_required(&primary, &secondary, "PARAMS_TO_OPT", "LOG_TAGS").unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags.get("accuracy").unwrap().tag, "val_acc");
    }

    #[test]
    fn missing_or_empty_required_keys_fail() {
        let dir = tempdir().unwrap();
        let primary = dir.path().join("config.json");
        fs::write(&primary, json!({"PARAMS_TO_OPT": {}, "LOG_TAGS": {}}).to_string()).unwrap();
        let secondary = dir.path().join(".env");

        assert_eq!(
            resolve_required(&primary, &secondary, "PARAMS_TO_OPT", "LOG_TAGS"),
            Err(ConfigError::MissingRequiredParam {
                key: "PARAMS_TO_OPT".to_string()
            })
        );

        // A malformed primary cascades into a missing-key error.
        fs::write(&primary, "{ broken").unwrap();
        assert!(matches!(
            resolve_required(&primary, &secondary, "PARAMS_TO_OPT", "LOG_TAGS"),
            Err(ConfigError::MissingRequiredParam { .. })
        ));
    }

    #[test]
    fn invalid_goal_fails_resolution() {
        let dir = tempdir().unwrap();
        let primary = dir.path().join("config.json");
        let mut doc = declarations();
        doc["LOG_TAGS"]["accuracy"]["goal"] = json!("higher");
        fs::write(&primary, doc.to_string()).unwrap();

        assert!(matches!(
            resolve_required(&primary, dir.path().join(".env"), "PARAMS_TO_OPT", "LOG_TAGS"),
            Err(ConfigError::InvalidGoalDirection { .. })
        ));
    }

    #[test]
    fn zero_is_not_empty() {
        assert!(!is_empty_value(&json!(0)));
        assert!(!is_empty_value(&json!(0.0)));
        assert!(is_empty_value(&json!(null)));
        assert!(is_empty_value(&json!("")));
        assert!(is_empty_value(&json!(false)));
    }
}
