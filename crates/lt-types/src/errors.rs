use thiserror::Error;

/// Main error type for Logtune
#[derive(Error, Debug)]
pub enum TuneError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Trial error: {0}")]
    Trial(#[from] TrialError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Configuration and declaration errors. All of these are raised before the
/// first trial starts.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Failed to load config source {path}: {message}")]
    Load { path: String, message: String },

    #[error("No {key} found in the resolved configuration")]
    MissingRequiredParam { key: String },

    #[error("Invalid goal direction '{value}' at {field} (expected minimize, maximize or not_set)")]
    InvalidGoalDirection { field: String, value: String },

    #[error("Invalid {context}: {}", .issues.join("; "))]
    Schema { context: String, issues: Vec<String> },

    #[error("Objective '{objective}' has no goal direction set")]
    UnsetObjectiveDirection { objective: String },

    #[error("Objective '{objective}' is not declared in the log tags")]
    UnknownObjective { objective: String },

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

/// Errors raised while executing a single trial.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TrialError {
    #[error("Failed to invoke training script {path}: {message}")]
    TrainingInvocation { path: String, message: String },

    #[error("Training exited with {}", describe_exit(.code))]
    TrainingFailed { code: Option<i32> },

    #[error("Metric(s) not found in {path}: {}", .tags.join(", "))]
    MetricNotFound { tags: Vec<String>, path: String },

    #[error("Objective dimension mismatch: expected {expected} values, got {got}")]
    ObjectiveDimensionMismatch { expected: usize, got: usize },

    #[error("Failed to patch override file {path}: {message}")]
    Patch { path: String, message: String },
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("code {c}"),
        None => "a signal".to_string(),
    }
}

/// Result type alias for Logtune operations
pub type TuneResult<T> = Result<T, TuneError>;

/// Macro for creating validation errors
#[macro_export]
macro_rules! validation_error {
    ($($arg:tt)*) => {
        $crate::TuneError::Validation(format!($($arg)*))
    };
}

/// Macro for creating internal errors
#[macro_export]
macro_rules! internal_error {
    ($($arg:tt)*) => {
        $crate::TuneError::Internal(format!($($arg)*))
    };
}

/// Macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::ConfigError::Invalid { message: format!($($arg)*) }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_names_offenders() {
        let error = TrialError::MetricNotFound {
            tags: vec!["accuracy".to_string(), "difference".to_string()],
            path: "/tmp/train.log".to_string(),
        };
        let message = error.to_string();
        assert!(message.contains("accuracy"));
        assert!(message.contains("difference"));
        assert!(message.contains("/tmp/train.log"));

        let error = ConfigError::MissingRequiredParam {
            key: "PARAMS_TO_OPT".to_string(),
        };
        assert!(error.to_string().contains("PARAMS_TO_OPT"));
    }

    #[test]
    fn test_training_failed_display() {
        assert!(TrialError::TrainingFailed { code: Some(3) }
            .to_string()
            .contains("code 3"));
        assert!(TrialError::TrainingFailed { code: None }
            .to_string()
            .contains("signal"));
    }

    #[test]
    fn test_error_conversion() {
        let trial_error = TrialError::ObjectiveDimensionMismatch {
            expected: 2,
            got: 1,
        };
        let tune_error: TuneError = trial_error.into();

        match tune_error {
            TuneError::Trial(_) => (),
            _ => panic!("Expected Trial error"),
        }
    }

    #[test]
    fn test_macros() {
        let validation_err = validation_error!("Invalid value: {}", 42);
        assert!(validation_err.to_string().contains("42"));
        let _internal_err = internal_error!("Something went wrong");
        let config_err = config_error!("Unknown strategy: {}", "annealing");
        assert!(config_err.to_string().contains("annealing"));
    }
}
