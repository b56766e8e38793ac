//! # lt-runner
//!
//! File-system side of Logtune: resolving declarations from layered config
//! sources, patching the trainer's override file, running the trainer and
//! scraping metrics from its log. [`FileTrialRunner`] plugs all of this into
//! the trial loop of `lt-optimizer`.

pub mod extractor;
pub mod invoker;
pub mod logging;
pub mod patcher;
pub mod resolver;
pub mod settings;

use std::path::PathBuf;

use lt_optimizer::TrialRunner;
use lt_types::{InvocationOutcome, NamedMetricTag, TuneResult};

pub use extractor::{ExtractedMetrics, MetricExtractor};
pub use invoker::TrainingInvoker;
pub use logging::init_logging;
pub use patcher::ConfigPatcher;
pub use resolver::{resolve_required, ConfigResolver, ResolvedConfig};
pub use settings::Settings;

/// Runs trials against real files and a real child process.
#[derive(Debug, Clone)]
pub struct FileTrialRunner {
    interpreter_path: PathBuf,
    script_path: PathBuf,
    override_file_path: PathBuf,
    log_path: PathBuf,
}

impl FileTrialRunner {
    pub fn new(
        interpreter_path: impl Into<PathBuf>,
        script_path: impl Into<PathBuf>,
        override_file_path: impl Into<PathBuf>,
        log_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            interpreter_path: interpreter_path.into(),
            script_path: script_path.into(),
            override_file_path: override_file_path.into(),
            log_path: log_path.into(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            &settings.interpreter_path,
            &settings.training_script_path,
            &settings.override_file_path,
            &settings.training_log_path,
        )
    }

    pub fn override_file_path(&self) -> &PathBuf {
        &self.override_file_path
    }
}

impl TrialRunner for FileTrialRunner {
    fn patch(&mut self, changes: &[(String, String)]) -> TuneResult<()> {
        ConfigPatcher::apply(&self.override_file_path, changes)
    }

    fn train(&mut self) -> TuneResult<InvocationOutcome> {
        Ok(TrainingInvoker::run(&self.script_path, &self.interpreter_path)?)
    }

    fn extract(&mut self, objectives: &[NamedMetricTag]) -> TuneResult<Vec<f64>> {
        Ok(MetricExtractor::extract(&self.log_path, objectives)?.values())
    }
}
