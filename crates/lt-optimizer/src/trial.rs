//! Studies, trials and the ask/tell cycle.

use chrono::{DateTime, Utc};
use lt_types::{ConfigError, GoalDirection, TrialError, TuneError, TuneResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::pareto::pareto_front_indices;
use crate::search::{Assignment, SearchSpace, SearchStrategy};

/// Unique study identifier.
pub type StudyId = Uuid;

/// Lifecycle state for a study.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StudyState {
    Pending,
    Running,
    Completed,
    Failed,
}

// ---------------------------------------------------------------------------
// Individual trial
// ---------------------------------------------------------------------------

/// A single trial: one suggested assignment evaluated by one training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trial {
    pub id: Uuid,
    pub study_id: StudyId,
    pub trial_number: usize,
    pub parameters: Assignment,
    pub status: TrialStatus,
    pub values: Option<Vec<f64>>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl Trial {
    pub fn new(study_id: StudyId, trial_number: usize, parameters: Assignment) -> Self {
        Self {
            id: Uuid::new_v4(),
            study_id,
            trial_number,
            parameters,
            status: TrialStatus::Pending,
            values: None,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            error: None,
        }
    }

    pub fn mark_running(&mut self) {
        self.status = TrialStatus::Running;
        self.started_at = Some(Utc::now());
    }

    pub fn mark_completed(&mut self, values: Vec<f64>) {
        self.status = TrialStatus::Completed;
        self.finished_at = Some(Utc::now());
        self.values = Some(values);
    }

    pub fn mark_failed(&mut self, error: String) {
        self.status = TrialStatus::Failed;
        self.finished_at = Some(Utc::now());
        self.error = Some(error);
    }

    pub fn duration_seconds(&self) -> Option<i64> {
        Some((self.finished_at? - self.started_at?).num_seconds())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrialStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

// ---------------------------------------------------------------------------
// Study
// ---------------------------------------------------------------------------

/// A multi-objective study. Owns the search strategy and the trial history;
/// the direction vector is fixed at creation.
pub struct Study {
    id: StudyId,
    name: String,
    space: SearchSpace,
    directions: Vec<GoalDirection>,
    strategy: Box<dyn SearchStrategy>,
    trials: Vec<Trial>,
    state: StudyState,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    error: Option<String>,
}

impl Study {
    pub fn new(
        name: impl Into<String>,
        space: SearchSpace,
        directions: Vec<GoalDirection>,
        strategy: Box<dyn SearchStrategy>,
    ) -> Result<Self, ConfigError> {
        if directions.is_empty() {
            return Err(ConfigError::Invalid {
                message: "a study needs at least one objective direction".to_string(),
            });
        }
        if directions.contains(&GoalDirection::Unset) {
            return Err(ConfigError::Invalid {
                message: "study directions must be minimize or maximize".to_string(),
            });
        }
        if space.is_empty() {
            return Err(ConfigError::Invalid {
                message: "a study needs at least one parameter".to_string(),
            });
        }

        Ok(Self {
            id: Uuid::new_v4(),
            name: name.into(),
            space,
            directions,
            strategy,
            trials: Vec::new(),
            state: StudyState::Pending,
            started_at: None,
            finished_at: None,
            error: None,
        })
    }

    pub fn id(&self) -> StudyId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn directions(&self) -> &[GoalDirection] {
        &self.directions
    }

    pub fn state(&self) -> StudyState {
        self.state
    }

    pub fn strategy_name(&self) -> &str {
        self.strategy.name()
    }

    /// Trials told so far, in trial-number order.
    pub fn trials(&self) -> &[Trial] {
        &self.trials
    }

    /// Ask the strategy for the next trial. Every parameter of the search
    /// space gets a value inside its boundary.
    pub fn ask(&mut self) -> TuneResult<Trial> {
        let suggested = self.strategy.suggest();

        let mut parameters = Assignment::new();
        for def in &self.space.parameters {
            let value = suggested.get(&def.name).ok_or_else(|| {
                TuneError::Internal(format!(
                    "strategy '{}' suggested no value for {}",
                    self.strategy.name(),
                    def.name
                ))
            })?;
            if !def.boundary.contains(value) {
                return Err(TuneError::Internal(format!(
                    "strategy '{}' suggested {value} for {} outside [{}, {}]",
                    self.strategy.name(),
                    def.name,
                    def.boundary.min_value,
                    def.boundary.max_value
                )));
            }
            parameters.insert(def.name.clone(), value);
        }

        Ok(Trial::new(self.id, self.trials.len(), parameters))
    }

    /// Report the outcome of a trial obtained from [`ask`](Self::ask).
    ///
    /// A successful result must carry exactly one value per direction.
    pub fn tell(&mut self, mut trial: Trial, result: Result<Vec<f64>, String>) -> Result<(), TrialError> {
        match result {
            Ok(values) => {
                if values.len() != self.directions.len() {
                    let err = TrialError::ObjectiveDimensionMismatch {
                        expected: self.directions.len(),
                        got: values.len(),
                    };
                    trial.mark_failed(err.to_string());
                    self.trials.push(trial);
                    return Err(err);
                }
                self.strategy.report(&trial.parameters, &values, &self.directions);
                trial.mark_completed(values);
            }
            Err(reason) => trial.mark_failed(reason),
        }
        self.trials.push(trial);
        Ok(())
    }

    /// Completed trials on the Pareto front.
    pub fn best_trials(&self) -> Vec<&Trial> {
        let completed: Vec<&Trial> = self
            .trials
            .iter()
            .filter(|t| t.status == TrialStatus::Completed)
            .collect();
        let values: Vec<Vec<f64>> = completed
            .iter()
            .map(|t| t.values.clone().unwrap_or_default())
            .collect();

        pareto_front_indices(&values, &self.directions)
            .into_iter()
            .map(|i| completed[i])
            .collect()
    }

    pub fn mark_running(&mut self) {
        self.state = StudyState::Running;
        self.started_at = Some(Utc::now());
    }

    pub fn mark_completed(&mut self) {
        self.state = StudyState::Completed;
        self.finished_at = Some(Utc::now());
    }

    pub fn mark_failed(&mut self, error: String) {
        self.state = StudyState::Failed;
        self.finished_at = Some(Utc::now());
        self.error = Some(error);
    }

    pub fn summary(&self) -> StudySummary {
        StudySummary {
            id: self.id,
            name: self.name.clone(),
            strategy: self.strategy.name().to_string(),
            directions: self.directions.clone(),
            state: self.state,
            trials_completed: self.count(TrialStatus::Completed),
            trials_failed: self.count(TrialStatus::Failed),
            best_trials: self.best_trials().into_iter().cloned().collect(),
            trials: self.trials.clone(),
            started_at: self.started_at,
            finished_at: self.finished_at,
            error: self.error.clone(),
        }
    }

    fn count(&self, status: TrialStatus) -> usize {
        self.trials.iter().filter(|t| t.status == status).count()
    }
}

impl std::fmt::Debug for Study {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Study")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("strategy", &self.strategy.name())
            .field("directions", &self.directions)
            .field("trials", &self.trials.len())
            .field("state", &self.state)
            .finish()
    }
}

/// Serializable snapshot of a study.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudySummary {
    pub id: StudyId,
    pub name: String,
    pub strategy: String,
    pub directions: Vec<GoalDirection>,
    pub state: StudyState,
    pub trials_completed: usize,
    pub trials_failed: usize,
    pub best_trials: Vec<Trial>,
    pub trials: Vec<Trial>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}
