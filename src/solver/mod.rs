//! Solver boundary for mixed-integer models.
//!
//! A [`MipSolver`] receives an abstract [`MipModel`] and returns a
//! [`SolverOutcome`]. Any MIP or CP backend can sit behind the trait; the
//! crate ships [`RouteEnumerationSolver`], an exact backend for small
//! CVRPTW instances.

mod enumeration;

pub use enumeration::{EnumerationConfig, RouteEnumerationSolver};

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::formulation::{Assignment, MipModel};

/// Status of the solver after execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolveStatus {
    /// Proven optimal solution found.
    Optimal,
    /// Feasible (but not necessarily optimal) solution found.
    Feasible,
    /// No feasible solution exists, or none was found in time.
    Infeasible,
    /// The objective is unbounded.
    Unbounded,
    /// The backend failed or refused the model.
    Error,
}

impl SolveStatus {
    /// Whether this status carries a solution.
    pub fn has_solution(self) -> bool {
        matches!(self, SolveStatus::Optimal | SolveStatus::Feasible)
    }
}

/// Result of one solver call.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverOutcome {
    /// Solver status.
    pub status: SolveStatus,
    /// Objective value reported by the backend, if any.
    pub objective_value: Option<f64>,
    /// Value of every model variable, if a solution was found.
    pub assignment: Option<Assignment>,
    /// Wall-clock time spent in the backend.
    pub solve_time: Duration,
}

impl SolverOutcome {
    /// Creates an outcome without a solution.
    pub fn empty(status: SolveStatus) -> Self {
        Self {
            status,
            objective_value: None,
            assignment: None,
            solve_time: Duration::ZERO,
        }
    }

    /// Creates an outcome carrying an assignment.
    pub fn with_solution(status: SolveStatus, objective_value: f64, assignment: Assignment) -> Self {
        Self {
            status,
            objective_value: Some(objective_value),
            assignment: Some(assignment),
            solve_time: Duration::ZERO,
        }
    }

    /// Sets the measured solve time.
    pub fn timed(mut self, solve_time: Duration) -> Self {
        self.solve_time = solve_time;
        self
    }

    /// Whether a feasible solution was found.
    pub fn is_solution_found(&self) -> bool {
        self.status.has_solution() && self.assignment.is_some()
    }
}

/// Solver configuration.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use u_cvrptw::solver::SolverConfig;
///
/// let config = SolverConfig::default().with_time_limit(Duration::from_secs(30));
/// assert_eq!(config.time_limit, Some(Duration::from_secs(30)));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Maximum wall-clock time for the backend call; `None` means unlimited.
    pub time_limit: Option<Duration>,
}

impl SolverConfig {
    /// Sets the time limit.
    pub fn with_time_limit(mut self, time_limit: Duration) -> Self {
        self.time_limit = Some(time_limit);
        self
    }
}

/// Trait for MIP solver implementations.
///
/// Implementors wrap an external solver or provide their own search. The
/// objective and its direction are part of the model. A backend reports
/// failures through [`SolveStatus`] rather than panicking.
pub trait MipSolver {
    /// Solves the model and returns the outcome.
    fn solve(&self, model: &MipModel, config: &SolverConfig) -> SolverOutcome;
}
