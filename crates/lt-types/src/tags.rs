//! Metric tag declarations and goal directions.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::errors::ConfigError;
use crate::schema::{join, kind_of, SchemaReport};

/// Whether a metric should be minimized, maximized or is unconstrained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalDirection {
    Minimize,
    Maximize,
    #[serde(rename = "not_set")]
    Unset,
}

impl GoalDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Minimize => "minimize",
            Self::Maximize => "maximize",
            Self::Unset => "not_set",
        }
    }
}

impl fmt::Display for GoalDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GoalDirection {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "minimize" => Ok(Self::Minimize),
            "maximize" => Ok(Self::Maximize),
            "not_set" => Ok(Self::Unset),
            _ => Err(ConfigError::InvalidGoalDirection {
                field: "goal".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// A metric as it appears in the training log: the literal `tag` text followed
/// by a number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricTag {
    pub tag: String,
    pub goal: GoalDirection,
}

/// A [`MetricTag`] together with its logical name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedMetricTag {
    pub name: String,
    pub metric: MetricTag,
}

/// Ordered, named collection of metric tags.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogTags {
    entries: Vec<NamedMetricTag>,
}

impl LogTags {
    pub fn new(entries: Vec<NamedMetricTag>) -> Result<Self, ConfigError> {
        let mut report = SchemaReport::new("log tags");
        for entry in &entries {
            if entry.metric.tag.is_empty() {
                report.push(&join(&entry.name, "tag"), "tag text must not be empty");
            }
        }
        report.finish()?;
        Ok(Self { entries })
    }

    /// Parse the declaration document stored under `key`, e.g.
    /// `{"accuracy": {"tag": "accuracy", "goal": "maximize"}}`.
    pub fn from_value(key: &str, value: &Value) -> Result<Self, ConfigError> {
        let mut report = SchemaReport::new(key);
        let mut entries = Vec::new();

        if let Some(object) = report.object(key, value) {
            if object.is_empty() {
                report.push(key, "at least one tag is required");
            }
            for (name, decl) in object {
                let field = join(key, name);
                let Some(decl) = report.object(&field, decl) else {
                    continue;
                };
                report.deny_unknown(&field, decl, &["tag", "goal"]);

                let tag = report.string(&field, decl, "tag");
                if matches!(&tag, Some(t) if t.is_empty()) {
                    report.push(&join(&field, "tag"), "tag text must not be empty");
                }

                let goal_field = join(&field, "goal");
                let goal = match report.require(&field, decl, "goal") {
                    Some(Value::String(raw)) => match raw.parse::<GoalDirection>() {
                        Ok(goal) => Some(goal),
                        Err(_) => {
                            report.push_invalid_goal(&goal_field, raw);
                            None
                        }
                    },
                    Some(other) => {
                        report.push(&goal_field, format!("expected a string, found {}", kind_of(other)));
                        None
                    }
                    None => None,
                };

                if let (Some(tag), Some(goal)) = (tag, goal) {
                    entries.push(NamedMetricTag {
                        name: name.clone(),
                        metric: MetricTag { tag, goal },
                    });
                }
            }
        }

        report.finish()?;
        Ok(Self { entries })
    }

    pub fn get(&self, name: &str) -> Option<&MetricTag> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| &e.metric)
    }

    /// The tags named in `names`, in that order. Used to pick the objectives
    /// of a study.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<NamedMetricTag>, ConfigError> {
        names
            .iter()
            .map(|name| {
                let name = name.as_ref();
                self.entries
                    .iter()
                    .find(|e| e.name == name)
                    .cloned()
                    .ok_or_else(|| ConfigError::UnknownObjective {
                        objective: name.to_string(),
                    })
            })
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NamedMetricTag> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn goal_parsing_is_case_insensitive() {
        assert_eq!("minimize".parse::<GoalDirection>().unwrap(), GoalDirection::Minimize);
        assert_eq!("MINIMIZE".parse::<GoalDirection>().unwrap(), GoalDirection::Minimize);
        assert_eq!("Maximize".parse::<GoalDirection>().unwrap(), GoalDirection::Maximize);
        assert_eq!("not_set".parse::<GoalDirection>().unwrap(), GoalDirection::Unset);
    }

    #[test]
    fn unknown_goal_is_rejected() {
        for raw in ["", "max", "minimise", "unset", "up"] {
            match raw.parse::<GoalDirection>() {
                Err(ConfigError::InvalidGoalDirection { value, .. }) => assert_eq!(value, raw),
                other => panic!("expected InvalidGoalDirection for {raw:?}, got {other:?}"),
            }
        }
    }

    fn sample_doc() -> Value {
        json!({
            "average_loss": {"tag": "Average loss:", "goal": "minimize"},
            "accuracy": {"tag": "accuracy", "goal": "MAXIMIZE"},
            "accuracy_top_10": {"tag": "accuracy top 10", "goal": "not_set"},
            "difference": {"tag": "difference", "goal": "Minimize"}
        })
    }

    #[test]
    fn parses_log_tags_and_selects_objectives() {
        let tags = LogTags::from_value("LOG_TAGS", &sample_doc()).unwrap();
        assert_eq!(tags.len(), 4);
        assert_eq!(tags.get("accuracy").unwrap().goal, GoalDirection::Maximize);

        let objectives = tags.select(&["difference", "accuracy"]).unwrap();
        let names: Vec<_> = objectives.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["difference", "accuracy"]);
        assert_eq!(objectives[0].metric.goal, GoalDirection::Minimize);
    }

    #[test]
    fn keeps_declaration_order() {
        let doc: Value = serde_json::from_str(
            r#"{
                "difference": {"tag": "difference", "goal": "minimize"},
                "average_loss": {"tag": "Average loss:", "goal": "minimize"},
                "accuracy": {"tag": "accuracy", "goal": "maximize"}
            }"#,
        )
        .unwrap();
        let tags = LogTags::from_value("LOG_TAGS", &doc).unwrap();
        let names: Vec<&str> = tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["difference", "average_loss", "accuracy"]);
    }

    #[test]
    fn selecting_undeclared_objective_fails() {
        let tags = LogTags::from_value("LOG_TAGS", &sample_doc()).unwrap();
        assert_eq!(
            tags.select(&["precision"]),
            Err(ConfigError::UnknownObjective {
                objective: "precision".to_string()
            })
        );
    }

    #[test]
    fn invalid_goal_in_document_names_the_field() {
        let doc = json!({"accuracy": {"tag": "accuracy", "goal": "upwards"}});
        match LogTags::from_value("LOG_TAGS", &doc) {
            Err(ConfigError::InvalidGoalDirection { field, value }) => {
                assert_eq!(field, "LOG_TAGS.accuracy.goal");
                assert_eq!(value, "upwards");
            }
            other => panic!("expected InvalidGoalDirection, got {other:?}"),
        }
    }

    #[test]
    fn mixed_problems_are_reported_together() {
        let doc = json!({
            "accuracy": {"tag": "", "goal": "upwards"},
            "difference": {"goal": 1, "weight": 2}
        });
        match LogTags::from_value("LOG_TAGS", &doc) {
            Err(ConfigError::Schema { issues, .. }) => {
                assert!(issues.iter().any(|i| i.contains("must not be empty")));
                assert!(issues.iter().any(|i| i.contains("upwards")));
                assert!(issues.iter().any(|i| i.contains("difference.tag: missing")));
                assert!(issues.iter().any(|i| i.contains("weight: unknown field")));
            }
            other => panic!("expected schema error, got {other:?}"),
        }
    }
}
