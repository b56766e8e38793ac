//! Search space definitions and ask/tell search strategies.

use lt_types::{Boundary, ConfigError, GoalDirection, OptimizeParams};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::pareto::pareto_front_indices;

/// A single parameter dimension in the search space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDef {
    /// Config key the suggested value is written under (e.g. "LEARNING_RATE").
    pub name: String,
    pub boundary: Boundary,
}

/// The full search space: an ordered list of parameter definitions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchSpace {
    pub parameters: Vec<ParameterDef>,
}

impl SearchSpace {
    pub fn new() -> Self {
        Self {
            parameters: Vec::new(),
        }
    }

    /// One dimension per declared parameter, keyed by its config name.
    pub fn from_params(params: &OptimizeParams) -> Self {
        Self {
            parameters: params
                .params()
                .map(|p| ParameterDef {
                    name: p.name.clone(),
                    boundary: p.boundary,
                })
                .collect(),
        }
    }

    pub fn add_float(mut self, name: impl Into<String>, low: f64, high: f64) -> Self {
        self.parameters.push(ParameterDef {
            name: name.into(),
            boundary: Boundary {
                min_value: low,
                max_value: high,
            },
        });
        self
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }
}

/// A concrete parameter assignment, in search-space order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    values: Vec<(String, f64)>,
}

impl Assignment {
    pub fn new() -> Self {
        Self { values: Vec::new() }
    }

    /// Set `name`, replacing an earlier value in place.
    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        let name = name.into();
        match self.values.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.values.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(n, v)| (n.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Search strategies
// ---------------------------------------------------------------------------

/// Ask/tell contract between a study and its optimizer.
pub trait SearchStrategy: Send {
    /// Propose the next parameter assignment.
    fn suggest(&mut self) -> Assignment;

    /// Report a completed trial so adaptive strategies can learn.
    fn report(&mut self, _params: &Assignment, _values: &[f64], _directions: &[GoalDirection]) {}

    /// Human-readable strategy name.
    fn name(&self) -> &str;
}

/// Knobs shared by the built-in strategies.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyOptions {
    pub seed: Option<u64>,
    pub exploration_weight: f64,
    pub grid_steps: usize,
}

impl Default for StrategyOptions {
    fn default() -> Self {
        Self {
            seed: None,
            exploration_weight: 0.3,
            grid_steps: 5,
        }
    }
}

/// Build one of the built-in strategies: "grid", "random" or "bayesian".
pub fn strategy_from_name(
    name: &str,
    space: SearchSpace,
    options: &StrategyOptions,
) -> Result<Box<dyn SearchStrategy>, ConfigError> {
    match name.to_ascii_lowercase().as_str() {
        "grid" => Ok(Box::new(GridSearch::new(space, options.grid_steps))),
        "random" => Ok(Box::new(RandomSearch::new(space, options.seed))),
        "bayesian" => {
            if !(0.0..=1.0).contains(&options.exploration_weight) {
                return Err(ConfigError::Invalid {
                    message: format!(
                        "exploration weight {} is outside [0, 1]",
                        options.exploration_weight
                    ),
                });
            }
            Ok(Box::new(BayesianSearch::new(
                space,
                options.exploration_weight,
                options.seed,
            )))
        }
        other => Err(ConfigError::Invalid {
            message: format!("unknown search strategy '{other}' (expected grid, random or bayesian)"),
        }),
    }
}

fn make_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}

fn sample_uniform(rng: &mut StdRng, boundary: &Boundary) -> f64 {
    if boundary.min_value == boundary.max_value {
        boundary.min_value
    } else {
        rng.random_range(boundary.min_value..=boundary.max_value)
    }
}

// ---- Grid search ----

/// Evenly spaced grid over every dimension. Restarts from the first point
/// once the grid is exhausted.
#[derive(Debug, Clone)]
pub struct GridSearch {
    cursor: usize,
    combos: Vec<Assignment>,
}

impl GridSearch {
    pub fn new(space: SearchSpace, steps: usize) -> Self {
        let combos = Self::build_grid(&space, steps);
        Self { cursor: 0, combos }
    }

    pub fn grid_size(&self) -> usize {
        self.combos.len()
    }

    fn build_grid(space: &SearchSpace, steps: usize) -> Vec<Assignment> {
        let steps = steps.max(2);
        let mut result = vec![Assignment::new()];

        for param in &space.parameters {
            let b = &param.boundary;
            let axis: Vec<f64> = if b.min_value == b.max_value {
                vec![b.min_value]
            } else {
                (0..steps)
                    .map(|i| {
                        let t = i as f64 / (steps - 1) as f64;
                        b.clamp(b.min_value + t * b.width())
                    })
                    .collect()
            };

            // Cartesian product
            let mut next = Vec::with_capacity(result.len() * axis.len());
            for existing in &result {
                for value in &axis {
                    let mut combo = existing.clone();
                    combo.insert(param.name.clone(), *value);
                    next.push(combo);
                }
            }
            result = next;
        }

        result
    }
}

impl SearchStrategy for GridSearch {
    fn suggest(&mut self) -> Assignment {
        if self.combos.is_empty() {
            return Assignment::new();
        }
        let combo = self.combos[self.cursor % self.combos.len()].clone();
        self.cursor += 1;
        combo
    }

    fn name(&self) -> &str {
        "grid"
    }
}

// ---- Random search ----

/// Independent uniform sampling inside each boundary.
#[derive(Debug, Clone)]
pub struct RandomSearch {
    space: SearchSpace,
    rng: StdRng,
}

impl RandomSearch {
    pub fn new(space: SearchSpace, seed: Option<u64>) -> Self {
        Self {
            space,
            rng: make_rng(seed),
        }
    }

    fn sample_one(&mut self) -> Assignment {
        let mut params = Assignment::new();
        for param in &self.space.parameters {
            params.insert(param.name.clone(), sample_uniform(&mut self.rng, &param.boundary));
        }
        params
    }
}

impl SearchStrategy for RandomSearch {
    fn suggest(&mut self) -> Assignment {
        self.sample_one()
    }

    fn name(&self) -> &str {
        "random"
    }
}

// ---- Bayesian search ----

/// Explore/exploit search driven by observed results.
///
/// With probability `exploration_weight` (and always before the first
/// report) it samples uniformly. Otherwise it perturbs a random point of the
/// current Pareto front by up to 10% of each dimension's width.
#[derive(Debug, Clone)]
pub struct BayesianSearch {
    space: SearchSpace,
    observations: Vec<(Assignment, Vec<f64>)>,
    directions: Vec<GoalDirection>,
    exploration_weight: f64,
    rng: StdRng,
}

impl BayesianSearch {
    pub fn new(space: SearchSpace, exploration_weight: f64, seed: Option<u64>) -> Self {
        Self {
            space,
            observations: Vec::new(),
            directions: Vec::new(),
            exploration_weight,
            rng: make_rng(seed),
        }
    }

    fn explore(&mut self) -> Assignment {
        let mut params = Assignment::new();
        for param in &self.space.parameters {
            params.insert(param.name.clone(), sample_uniform(&mut self.rng, &param.boundary));
        }
        params
    }

    fn exploit(&mut self) -> Assignment {
        let values: Vec<Vec<f64>> = self.observations.iter().map(|(_, v)| v.clone()).collect();
        let front = pareto_front_indices(&values, &self.directions);
        if front.is_empty() {
            return self.explore();
        }
        let pick = front[self.rng.random_range(0..front.len())];
        let base = self.observations[pick].0.clone();

        let mut perturbed = Assignment::new();
        for param in &self.space.parameters {
            let b = &param.boundary;
            let value = match base.get(&param.name) {
                Some(v) if b.width() > 0.0 => {
                    let noise = self.rng.random_range(-0.1..0.1) * b.width();
                    b.clamp(v + noise)
                }
                Some(v) => b.clamp(v),
                None => sample_uniform(&mut self.rng, b),
            };
            perturbed.insert(param.name.clone(), value);
        }
        perturbed
    }
}

impl SearchStrategy for BayesianSearch {
    fn suggest(&mut self) -> Assignment {
        if self.observations.is_empty() || self.rng.random::<f64>() < self.exploration_weight {
            self.explore()
        } else {
            self.exploit()
        }
    }

    fn report(&mut self, params: &Assignment, values: &[f64], directions: &[GoalDirection]) {
        if self.directions.is_empty() {
            self.directions = directions.to_vec();
        }
        self.observations.push((params.clone(), values.to_vec()));
    }

    fn name(&self) -> &str {
        "bayesian"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_space() -> SearchSpace {
        SearchSpace::new()
            .add_float("MARGIN", 0.1, 1.0)
            .add_float("LEARNING_RATE", 1e-5, 1e-2)
    }

    fn assert_in_space(space: &SearchSpace, params: &Assignment) {
        assert_eq!(params.len(), space.len());
        for def in &space.parameters {
            let v = params.get(&def.name).unwrap();
            assert!(def.boundary.contains(v), "{} out of bounds: {v}", def.name);
        }
    }

    #[test]
    fn grid_search_covers_cartesian_product_then_wraps() {
        let space = SearchSpace::new().add_float("a", 0.0, 1.0).add_float("b", 10.0, 20.0);
        let mut gs = GridSearch::new(space, 3);
        assert_eq!(gs.grid_size(), 9);

        let first: Vec<Assignment> = (0..9).map(|_| gs.suggest()).collect();
        assert_eq!(first[0].get("a"), Some(0.0));
        assert_eq!(first[0].get("b"), Some(10.0));
        assert_eq!(first[8].get("a"), Some(1.0));
        assert_eq!(first[8].get("b"), Some(20.0));

        // Exhausted grid starts over.
        assert_eq!(gs.suggest(), first[0]);
    }

    #[test]
    fn grid_search_collapses_degenerate_dimensions() {
        let space = SearchSpace::new().add_float("fixed", 0.5, 0.5).add_float("x", 0.0, 1.0);
        let gs = GridSearch::new(space, 4);
        assert_eq!(gs.grid_size(), 4);
    }

    #[test]
    fn random_search_respects_bounds() {
        let space = sample_space();
        let mut rs = RandomSearch::new(space.clone(), Some(7));
        for _ in 0..200 {
            assert_in_space(&space, &rs.suggest());
        }
    }

    #[test]
    fn seeded_random_search_is_reproducible() {
        let mut a = RandomSearch::new(sample_space(), Some(42));
        let mut b = RandomSearch::new(sample_space(), Some(42));
        for _ in 0..10 {
            assert_eq!(a.suggest(), b.suggest());
        }
    }

    #[test]
    fn bayesian_search_exploits_after_reports() {
        let space = SearchSpace::new().add_float("LR", 0.0, 1.0);
        // exploration_weight=0 → always exploit after the first report
        let mut bs = BayesianSearch::new(space, 0.0, Some(1));
        let directions = [GoalDirection::Minimize];

        let mut best = Assignment::new();
        best.insert("LR", 0.5);
        bs.report(&best, &[0.1], &directions);
        let mut worse = Assignment::new();
        worse.insert("LR", 0.95);
        bs.report(&worse, &[0.9], &directions);

        for _ in 0..50 {
            let v = bs.suggest().get("LR").unwrap();
            assert!((0.4..=0.6).contains(&v), "expected perturbation around 0.5, got {v}");
        }
    }

    #[test]
    fn bayesian_search_explores_before_reports() {
        let space = sample_space();
        let mut bs = BayesianSearch::new(space.clone(), 0.3, None);
        for _ in 0..20 {
            assert_in_space(&space, &bs.suggest());
        }
    }

    #[test]
    fn strategy_factory() {
        let options = StrategyOptions::default();
        for name in ["grid", "random", "Bayesian"] {
            let strategy = strategy_from_name(name, sample_space(), &options).unwrap();
            assert_eq!(strategy.name(), name.to_ascii_lowercase());
        }
        assert!(strategy_from_name("annealing", sample_space(), &options).is_err());

        let bad = StrategyOptions {
            exploration_weight: 1.5,
            ..StrategyOptions::default()
        };
        assert!(strategy_from_name("bayesian", sample_space(), &bad).is_err());
    }

    #[test]
    fn assignment_keeps_insertion_order() {
        let mut a = Assignment::new();
        a.insert("b", 1.0);
        a.insert("a", 2.0);
        a.insert("b", 3.0);
        let pairs: Vec<_> = a.iter().collect();
        assert_eq!(pairs, vec![("b", 3.0), ("a", 2.0)]);
    }

    #[test]
    fn search_space_from_declared_params() {
        let params = OptimizeParams::new(vec![
            (
                "margin".to_string(),
                lt_types::Param {
                    name: "MARGIN".to_string(),
                    boundary: Boundary::new(0.1, 1.0).unwrap(),
                },
            ),
            (
                "learning_rate".to_string(),
                lt_types::Param {
                    name: "LR".to_string(),
                    boundary: Boundary::new(1e-4, 1e-2).unwrap(),
                },
            ),
        ])
        .unwrap();
        let space = SearchSpace::from_params(&params);
        let names: Vec<_> = space.parameters.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["MARGIN", "LR"]);
    }
}
