//! The trial loop: ask, patch, train, extract, tell.

use lt_types::{
    ConfigError, GoalDirection, InvocationOutcome, NamedMetricTag, OptimizeParams, TrialError,
    TuneError, TuneResult,
};
use tracing::{error, info, warn};

use crate::search::{Assignment, SearchSpace, SearchStrategy};
use crate::trial::{Study, StudySummary};

/// Side effects of a single trial. The production implementation patches the
/// override file, runs the trainer and scrapes its log; tests use fakes.
pub trait TrialRunner {
    /// Upsert `changes` into the trainer's override file.
    fn patch(&mut self, changes: &[(String, String)]) -> TuneResult<()>;

    /// Run the trainer to completion.
    fn train(&mut self) -> TuneResult<InvocationOutcome>;

    /// Read one value per objective, in the given order.
    fn extract(&mut self, objectives: &[NamedMetricTag]) -> TuneResult<Vec<f64>>;
}

/// Everything a trial needs besides the runner. Built once, read-only for the
/// whole study.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialContext {
    pub study_name: String,
    pub params: OptimizeParams,
    /// Objective tags; their order fixes the direction vector and the value
    /// tuple of every trial.
    pub objectives: Vec<NamedMetricTag>,
    pub n_trials: usize,
    /// Override-file key that receives a per-trial run name.
    pub run_name_key: Option<String>,
    /// Fail the trial on a non-zero training exit instead of extracting.
    pub abort_on_training_failure: bool,
}

impl TrialContext {
    pub fn new(
        study_name: impl Into<String>,
        params: OptimizeParams,
        objectives: Vec<NamedMetricTag>,
    ) -> Self {
        Self {
            study_name: study_name.into(),
            params,
            objectives,
            n_trials: 10,
            run_name_key: None,
            abort_on_training_failure: false,
        }
    }

    pub fn with_trials(mut self, n: usize) -> Self {
        self.n_trials = n;
        self
    }

    pub fn with_run_name_key(mut self, key: Option<String>) -> Self {
        self.run_name_key = key;
        self
    }

    pub fn with_abort_on_training_failure(mut self, abort: bool) -> Self {
        self.abort_on_training_failure = abort;
        self
    }

    pub fn objective_names(&self) -> Vec<&str> {
        self.objectives.iter().map(|o| o.name.as_str()).collect()
    }

    pub fn run_name(&self, trial_number: usize) -> String {
        format!("{}_trial_{trial_number}", self.study_name)
    }
}

/// Direction vector in objective order. Every objective must have a goal.
pub fn directions(ctx: &TrialContext) -> Result<Vec<GoalDirection>, ConfigError> {
    if ctx.objectives.is_empty() {
        return Err(ConfigError::Invalid {
            message: "no objectives configured".to_string(),
        });
    }
    ctx.objectives
        .iter()
        .map(|o| match o.metric.goal {
            GoalDirection::Unset => Err(ConfigError::UnsetObjectiveDirection {
                objective: o.name.clone(),
            }),
            goal => Ok(goal),
        })
        .collect()
}

/// Create a study whose directions match `ctx`'s objectives.
pub fn create_study(ctx: &TrialContext, strategy: Box<dyn SearchStrategy>) -> Result<Study, ConfigError> {
    Study::new(
        ctx.study_name.clone(),
        SearchSpace::from_params(&ctx.params),
        directions(ctx)?,
        strategy,
    )
}

/// Evaluate one assignment and return its objective values in objective
/// order.
pub fn run_trial<R: TrialRunner + ?Sized>(
    ctx: &TrialContext,
    runner: &mut R,
    trial_number: usize,
    assignment: &Assignment,
) -> TuneResult<Vec<f64>> {
    let mut changes: Vec<(String, String)> = assignment
        .iter()
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect();
    if let Some(key) = &ctx.run_name_key {
        changes.push((key.clone(), ctx.run_name(trial_number)));
    }
    runner.patch(&changes)?;

    match runner.train()? {
        InvocationOutcome::Success => {}
        InvocationOutcome::Failed { code } => {
            if ctx.abort_on_training_failure {
                return Err(TrialError::TrainingFailed { code }.into());
            }
            warn!("Trial {} training failed; extracting metrics anyway", trial_number);
        }
        InvocationOutcome::NotFound { path } => {
            if ctx.abort_on_training_failure {
                return Err(TrialError::TrainingInvocation {
                    path,
                    message: "interpreter or script not found".to_string(),
                }
                .into());
            }
            warn!("Trial {} trainer not found at {}; extracting metrics anyway", trial_number, path);
        }
    }

    let values = runner.extract(&ctx.objectives)?;
    if values.len() != ctx.objectives.len() {
        return Err(TrialError::ObjectiveDimensionMismatch {
            expected: ctx.objectives.len(),
            got: values.len(),
        }
        .into());
    }
    Ok(values)
}

/// Drives a study for a fixed trial budget, one trial at a time.
pub struct TrialOrchestrator<R: TrialRunner> {
    runner: R,
}

impl<R: TrialRunner> TrialOrchestrator<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn into_runner(self) -> R {
        self.runner
    }

    /// Run `ctx.n_trials` ask/tell cycles. The first failing trial is recorded
    /// on the study and then ends the whole run.
    pub fn run(&mut self, study: &mut Study, ctx: &TrialContext) -> TuneResult<StudySummary> {
        let expected = directions(ctx)?;
        if study.directions() != expected.as_slice() {
            return Err(TuneError::Validation(format!(
                "study directions {:?} do not match objectives {:?}",
                study.directions(),
                ctx.objective_names()
            )));
        }

        info!(
            "Starting study '{}' with {} trials (strategy: {}, objectives: {:?})",
            study.name(),
            ctx.n_trials,
            study.strategy_name(),
            ctx.objective_names()
        );
        study.mark_running();

        for _ in 0..ctx.n_trials {
            let mut trial = match study.ask() {
                Ok(trial) => trial,
                Err(e) => {
                    error!("Study '{}' could not suggest a trial: {}", study.name(), e);
                    study.mark_failed(e.to_string());
                    return Err(e);
                }
            };
            trial.mark_running();
            info!("Trial {} params: {:?}", trial.trial_number, trial.parameters);

            let number = trial.trial_number;
            let told = match run_trial(ctx, &mut self.runner, number, &trial.parameters) {
                Ok(values) => {
                    info!("Trial {} values: {:?}", number, values);
                    study.tell(trial, Ok(values)).map_err(TuneError::from)
                }
                Err(e) => {
                    let message = e.to_string();
                    study
                        .tell(trial, Err(message))
                        .map_err(TuneError::from)
                        .and(Err(e))
                }
            };
            if let Err(e) = told {
                error!("Trial {} failed: {}", number, e);
                study.mark_failed(e.to_string());
                return Err(e);
            }
        }

        study.mark_completed();
        info!("Study '{}' completed", study.name());
        Ok(study.summary())
    }
}
