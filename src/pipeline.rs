//! One-call solve: instance → model → backend → routes → verified solution.

use tracing::{info, instrument};

use crate::distance::DistanceMatrix;
use crate::error::{ExtractionError, SolveError};
use crate::evaluation::RouteEvaluator;
use crate::extraction::{ExtractionConfig, SolutionExtractor};
use crate::formulation::{FormulationBuilder, FormulationConfig};
use crate::models::{ProblemInstance, Solution};
use crate::solver::{MipSolver, SolverConfig};

/// Solves CVRPTW instances exactly through a [`MipSolver`] backend.
///
/// Each call to [`solve`](Self::solve) computes the distance matrix, builds
/// a fresh formulation, calls the backend once, extracts the routes and
/// verifies them independently of the model.
///
/// # Examples
///
/// ```
/// use u_cvrptw::distance::DistanceMatrix;
/// use u_cvrptw::models::{Node, ProblemInstance, TimeWindow, VehicleFleet};
/// use u_cvrptw::pipeline::CvrptwSolver;
/// use u_cvrptw::solver::RouteEnumerationSolver;
///
/// let tw = TimeWindow::new(0.0, 100.0).unwrap();
/// let nodes = vec![
///     Node::depot(0.0, 0.0, 100.0),
///     Node::new(1, 10.0, 0.0, 1.0, tw, 0.0),
///     Node::new(2, 10.0, 10.0, 1.0, tw, 0.0),
///     Node::new(3, 0.0, 10.0, 1.0, tw, 0.0),
/// ];
/// let instance = ProblemInstance::new(nodes, VehicleFleet::new(1, 10.0)).unwrap();
/// let distances = DistanceMatrix::from_nodes(instance.nodes());
///
/// let solver = CvrptwSolver::new(RouteEnumerationSolver::new(&instance, &distances));
/// let solution = solver.solve(&instance).unwrap();
/// assert_eq!(solution.num_routes(), 1);
/// assert!((solution.total_distance() - 40.0).abs() < 1e-9);
/// ```
pub struct CvrptwSolver<S> {
    solver: S,
    formulation: FormulationConfig,
    solver_config: SolverConfig,
    extraction: ExtractionConfig,
}

impl<S: MipSolver> CvrptwSolver<S> {
    /// Wraps a backend with default settings.
    pub fn new(solver: S) -> Self {
        Self {
            solver,
            formulation: FormulationConfig::default(),
            solver_config: SolverConfig::default(),
            extraction: ExtractionConfig::default(),
        }
    }

    /// Sets the formulation options.
    pub fn with_formulation_config(mut self, config: FormulationConfig) -> Self {
        self.formulation = config;
        self
    }

    /// Sets the backend options.
    pub fn with_solver_config(mut self, config: SolverConfig) -> Self {
        self.solver_config = config;
        self
    }

    /// Sets the extraction tolerances.
    pub fn with_extraction_config(mut self, config: ExtractionConfig) -> Self {
        self.extraction = config;
        self
    }

    /// Solves an instance.
    ///
    /// # Errors
    ///
    /// - [`SolveError::NoSolution`] if the backend returns no solution;
    /// - [`SolveError::Formulation`] if the model fails validation;
    /// - [`SolveError::Extraction`] if the assignment is inconsistent or the
    ///   extracted routes violate the instance.
    #[instrument(
        skip_all,
        level = "debug",
        fields(nodes = instance.num_nodes(), vehicles = instance.fleet_size())
    )]
    pub fn solve(&self, instance: &ProblemInstance) -> Result<Solution, SolveError> {
        let distances = DistanceMatrix::from_nodes(instance.nodes());
        let formulation = FormulationBuilder::new(instance, &distances)
            .with_config(self.formulation)
            .build()?;

        let outcome = self.solver.solve(formulation.model(), &self.solver_config);
        info!(
            status = ?outcome.status,
            objective = ?outcome.objective_value,
            elapsed_ms = outcome.solve_time.as_millis() as u64,
            "solver finished"
        );

        let solution = SolutionExtractor::new(instance, &distances, formulation.layout())
            .with_config(self.extraction)
            .extract(&outcome)?;

        let violations = RouteEvaluator::new(instance, &distances).check_solution(&solution);
        if !violations.is_empty() {
            return Err(ExtractionError::InvalidSolution(violations).into());
        }

        info!(
            routes = solution.num_routes(),
            distance = solution.total_distance(),
            "solution verified"
        );
        Ok(solution)
    }
}
