//! Blocking invocation of the external trainer.

use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use lt_types::{InvocationOutcome, TrialError};

/// Runs `interpreter script` as a child process rooted in the script's
/// directory. The parent's working directory is never changed, so relative
/// paths inside the trainer resolve against the script while the orchestrator
/// keeps its own.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrainingInvoker;

impl TrainingInvoker {
    /// Block until the trainer exits. A non-zero exit or a missing
    /// interpreter/script is reported as an [`InvocationOutcome`]; any other
    /// spawn failure is an error.
    pub fn run<S: AsRef<Path>, I: AsRef<Path>>(
        script_path: S,
        interpreter_path: I,
    ) -> Result<InvocationOutcome, TrialError> {
        let script_path = script_path.as_ref();
        let interpreter_path = interpreter_path.as_ref();

        let script = match script_path.canonicalize() {
            Ok(script) => script,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Ok(Self::not_found(script_path));
            }
            Err(e) => {
                return Err(TrialError::TrainingInvocation {
                    path: script_path.display().to_string(),
                    message: e.to_string(),
                })
            }
        };
        let working_dir = script
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("/"));

        tracing::info!(
            "Running {} {} in {}",
            interpreter_path.display(),
            script.display(),
            working_dir.display()
        );

        let status = match Command::new(interpreter_path)
            .arg(&script)
            .current_dir(&working_dir)
            .status()
        {
            Ok(status) => status,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Ok(Self::not_found(interpreter_path));
            }
            Err(e) => {
                return Err(TrialError::TrainingInvocation {
                    path: script.display().to_string(),
                    message: e.to_string(),
                })
            }
        };

        if status.success() {
            tracing::info!("Training script {} finished", script.display());
            Ok(InvocationOutcome::Success)
        } else {
            let code = status.code();
            match code {
                Some(code) => tracing::error!("Script failed with return code {}", code),
                None => tracing::error!("Script {} was terminated by a signal", script.display()),
            }
            Ok(InvocationOutcome::Failed { code })
        }
    }

    fn not_found(path: &Path) -> InvocationOutcome {
        tracing::warn!(
            "Script or interpreter not found at provided path: {}",
            path.display()
        );
        InvocationOutcome::NotFound {
            path: path.display().to_string(),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::env;
    use std::fs;
    use tempfile::tempdir;

    const SHELL: &str = "/bin/sh";

    #[test]
    fn success_runs_in_script_directory_and_keeps_cwd() {
        let original = env::current_dir().unwrap();
        let dir = tempdir().unwrap();
        let script = dir.path().join("train.sh");
        fs::write(&script, "pwd > cwd.txt\necho 'accuracy: 0.9' > train.log\n").unwrap();

        let outcome = TrainingInvoker::run(&script, SHELL).unwrap();
        assert_eq!(outcome, InvocationOutcome::Success);
        assert_eq!(outcome.exit_code(), Some(0));

        // Relative writes landed next to the script.
        let reported = fs::read_to_string(dir.path().join("cwd.txt")).unwrap();
        assert_eq!(
            PathBuf::from(reported.trim()).canonicalize().unwrap(),
            dir.path().canonicalize().unwrap()
        );
        assert!(dir.path().join("train.log").exists());
        assert_eq!(env::current_dir().unwrap(), original);
    }

    #[test]
    fn failure_reports_exit_code_and_keeps_cwd() {
        let original = env::current_dir().unwrap();
        let dir = tempdir().unwrap();
        let script = dir.path().join("train.sh");
        fs::write(&script, "exit 3\n").unwrap();

        let outcome = TrainingInvoker::run(&script, SHELL).unwrap();
        assert_eq!(outcome, InvocationOutcome::Failed { code: Some(3) });
        assert_eq!(env::current_dir().unwrap(), original);
    }

    #[test]
    fn missing_interpreter_is_a_sentinel() {
        let original = env::current_dir().unwrap();
        let dir = tempdir().unwrap();
        let script = dir.path().join("train.sh");
        fs::write(&script, "exit 0\n").unwrap();

        let outcome = TrainingInvoker::run(&script, dir.path().join("no-such-python")).unwrap();
        assert!(matches!(outcome, InvocationOutcome::NotFound { .. }));
        assert_eq!(outcome.exit_code(), Some(lt_types::NOT_FOUND_EXIT_CODE));
        assert_eq!(env::current_dir().unwrap(), original);
    }

    #[test]
    fn missing_script_is_a_sentinel() {
        let dir = tempdir().unwrap();
        let outcome = TrainingInvoker::run(dir.path().join("run.py"), SHELL).unwrap();
        match outcome {
            InvocationOutcome::NotFound { path } => assert!(path.ends_with("run.py")),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }
}
