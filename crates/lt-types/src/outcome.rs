use serde::{Deserialize, Serialize};

/// Exit code reported when the interpreter or training script is missing.
pub const NOT_FOUND_EXIT_CODE: i32 = -1;

/// How a training invocation ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvocationOutcome {
    Success,
    /// Non-zero exit. `code` is `None` when the process was killed by a signal.
    Failed { code: Option<i32> },
    /// The interpreter or the script could not be found.
    NotFound { path: String },
}

impl InvocationOutcome {
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::Success => Some(0),
            Self::Failed { code } => *code,
            Self::NotFound { .. } => Some(NOT_FOUND_EXIT_CODE),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes() {
        assert_eq!(InvocationOutcome::Success.exit_code(), Some(0));
        assert_eq!(InvocationOutcome::Failed { code: Some(2) }.exit_code(), Some(2));
        assert_eq!(InvocationOutcome::Failed { code: None }.exit_code(), None);
        assert_eq!(
            InvocationOutcome::NotFound { path: "run.py".into() }.exit_code(),
            Some(NOT_FOUND_EXIT_CODE)
        );
        assert!(!InvocationOutcome::Failed { code: Some(1) }.is_success());
    }
}
