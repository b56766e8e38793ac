//! # lt-optimizer
//!
//! Ask/tell search and trial orchestration for Logtune.
//!
//! Provides search space definitions built from the declared parameters,
//! simple search strategies (grid, random, explore/exploit), multi-objective
//! studies with Pareto-front tracking, and the sequential trial loop that
//! drives an external trainer through a [`TrialRunner`].

mod orchestrator;
mod pareto;
mod search;
mod trial;

pub use orchestrator::{create_study, directions, run_trial, TrialContext, TrialOrchestrator, TrialRunner};
pub use pareto::{dominates, pareto_front_indices};
pub use search::{
    strategy_from_name, Assignment, BayesianSearch, GridSearch, ParameterDef, RandomSearch,
    SearchSpace, SearchStrategy, StrategyOptions,
};
pub use trial::{Study, StudyId, StudyState, StudySummary, Trial, TrialStatus};
