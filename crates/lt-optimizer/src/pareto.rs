//! Pareto dominance for multi-objective results.

use lt_types::GoalDirection;

/// Returns `true` if `a` Pareto-dominates `b`: at least as good in every
/// objective and strictly better in one. Objectives whose direction is
/// [`GoalDirection::Unset`] never decide dominance.
pub fn dominates(a: &[f64], b: &[f64], directions: &[GoalDirection]) -> bool {
    debug_assert_eq!(a.len(), b.len());
    debug_assert_eq!(a.len(), directions.len());

    let mut strictly_better = false;
    for ((&av, &bv), dir) in a.iter().zip(b.iter()).zip(directions.iter()) {
        let (better, worse) = match dir {
            GoalDirection::Minimize => (av < bv, av > bv),
            GoalDirection::Maximize => (av > bv, av < bv),
            GoalDirection::Unset => (false, false),
        };
        if worse {
            return false;
        }
        if better {
            strictly_better = true;
        }
    }
    strictly_better
}

/// Indices of the non-dominated solutions, in input order.
pub fn pareto_front_indices(solutions: &[Vec<f64>], directions: &[GoalDirection]) -> Vec<usize> {
    (0..solutions.len())
        .filter(|&i| {
            !solutions
                .iter()
                .enumerate()
                .any(|(j, other)| j != i && dominates(other, &solutions[i], directions))
        })
        .collect()
}
