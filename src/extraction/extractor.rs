//! Assignment → routes.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::distance::DistanceMatrix;
use crate::error::{ExtractionError, SolveError};
use crate::formulation::{Assignment, VarLayout};
use crate::models::{ProblemInstance, Route, Solution, Visit};
use crate::solver::{SolveStatus, SolverOutcome};

/// Tolerances used when reading a solver assignment.
///
/// # Examples
///
/// ```
/// use u_cvrptw::extraction::ExtractionConfig;
///
/// let config = ExtractionConfig::default().with_objective_tolerance(1e-4);
/// assert_eq!(config.arc_threshold, 0.5);
/// assert_eq!(config.objective_tolerance, 1e-4);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// An arc is used iff its value exceeds this threshold.
    pub arc_threshold: f64,
    /// Largest distance of an arc value from 0 or 1.
    pub integrality_tolerance: f64,
    /// Relative tolerance between extracted and reported objective.
    pub objective_tolerance: f64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            arc_threshold: 0.5,
            integrality_tolerance: 1e-4,
            objective_tolerance: 1e-6,
        }
    }
}

impl ExtractionConfig {
    /// Sets the arc threshold.
    pub fn with_arc_threshold(mut self, threshold: f64) -> Self {
        self.arc_threshold = threshold;
        self
    }

    /// Sets the integrality tolerance.
    pub fn with_integrality_tolerance(mut self, tol: f64) -> Self {
        self.integrality_tolerance = tol;
        self
    }

    /// Sets the relative objective tolerance.
    pub fn with_objective_tolerance(mut self, tol: f64) -> Self {
        self.objective_tolerance = tol;
        self
    }
}

/// Reconstructs vehicle routes from the arc variables of an assignment.
///
/// For every vehicle the extractor follows the unique used arc leaving the
/// depot until it returns. Anything the formulation should have ruled out
/// (fractional arcs, branching or open walks, customers served twice or on
/// a depot-free cycle, uncovered customers, an objective that disagrees
/// with the routes) is reported as an [`ExtractionError`].
///
/// Extraction only reads its inputs, so extracting the same assignment twice
/// yields identical solutions.
pub struct SolutionExtractor<'a> {
    instance: &'a ProblemInstance,
    distances: &'a DistanceMatrix,
    layout: VarLayout,
    config: ExtractionConfig,
}

impl<'a> SolutionExtractor<'a> {
    /// Creates an extractor for models with the given layout.
    pub fn new(instance: &'a ProblemInstance, distances: &'a DistanceMatrix, layout: &VarLayout) -> Self {
        Self {
            instance,
            distances,
            layout: *layout,
            config: ExtractionConfig::default(),
        }
    }

    /// Overrides the tolerances.
    pub fn with_config(mut self, config: ExtractionConfig) -> Self {
        self.config = config;
        self
    }

    /// Converts a solver outcome into a [`Solution`].
    ///
    /// # Errors
    ///
    /// [`SolveError::NoSolution`] if the status carries no solution or the
    /// backend returned no assignment; [`SolveError::Extraction`] for any
    /// inconsistency in the assignment.
    pub fn extract(&self, outcome: &SolverOutcome) -> Result<Solution, SolveError> {
        let status = outcome.status;
        let assignment = match &outcome.assignment {
            Some(assignment) if status.has_solution() => assignment,
            _ => return Err(SolveError::NoSolution { status }),
        };
        Ok(self.extract_routes(status, assignment, outcome.objective_value)?)
    }

    /// Builds routes from raw variable values.
    ///
    /// When `reported_objective` is `None` the solution's objective is the
    /// extracted distance.
    pub fn extract_routes(
        &self,
        status: SolveStatus,
        assignment: &Assignment,
        reported_objective: Option<f64>,
    ) -> Result<Solution, ExtractionError> {
        if assignment.len() != self.layout.num_variables() {
            return Err(ExtractionError::AssignmentSize {
                expected: self.layout.num_variables(),
                actual: assignment.len(),
            });
        }
        self.check_integrality(assignment)?;

        let n = self.layout.num_nodes();
        let mut served_by: Vec<Option<usize>> = vec![None; n];
        let mut routes = Vec::new();

        for k in 0..self.layout.num_vehicles() {
            let Some(route) = self.trace_route(assignment, k)? else {
                continue;
            };
            for c in route.customer_ids() {
                if let Some(first) = served_by[c] {
                    return Err(ExtractionError::DuplicateCustomer {
                        customer: c,
                        first,
                        second: k,
                    });
                }
                served_by[c] = Some(k);
            }
            routes.push(route);
        }

        for k in 0..self.layout.num_vehicles() {
            for c in (1..n).filter(|&c| served_by[c] != Some(k)) {
                let entered = (0..n).any(|i| self.is_used(assignment, i, c, k));
                if entered {
                    return Err(ExtractionError::DetachedSubtour {
                        vehicle: k,
                        customer: c,
                    });
                }
            }
        }
        if let Some(c) = (1..n).find(|&c| served_by[c].is_none()) {
            return Err(ExtractionError::UncoveredCustomer(c));
        }

        let extracted: f64 = routes.iter().map(Route::total_distance).sum();
        if let Some(reported) = reported_objective {
            let tol = self.config.objective_tolerance * reported.abs().max(1.0);
            if (extracted - reported).abs() > tol {
                return Err(ExtractionError::ObjectiveMismatch {
                    extracted,
                    reported,
                });
            }
        }

        debug!(
            routes = routes.len(),
            distance = extracted,
            ?status,
            "extracted routes"
        );
        Ok(Solution::new(
            status,
            reported_objective.unwrap_or(extracted),
            routes,
        ))
    }

    fn check_integrality(&self, assignment: &Assignment) -> Result<(), ExtractionError> {
        let tol = self.config.integrality_tolerance;
        for k in 0..self.layout.num_vehicles() {
            for (from, to) in self.layout.arcs() {
                let Some(x) = self.layout.arc(from, to, k) else { continue };
                let value = assignment.value(x);
                if value.abs() > tol && (value - 1.0).abs() > tol {
                    return Err(ExtractionError::FractionalArc {
                        vehicle: k,
                        from,
                        to,
                        value,
                    });
                }
            }
        }
        Ok(())
    }

    fn is_used(&self, assignment: &Assignment, i: usize, j: usize, k: usize) -> bool {
        self.layout
            .arc(i, j, k)
            .is_some_and(|x| assignment.value(x) > self.config.arc_threshold)
    }

    fn successors(&self, assignment: &Assignment, i: usize, k: usize) -> Vec<usize> {
        (0..self.layout.num_nodes())
            .filter(|&j| self.is_used(assignment, i, j, k))
            .collect()
    }

    /// Walks vehicle `k` from the depot; `None` if the vehicle is unused.
    fn trace_route(&self, assignment: &Assignment, k: usize) -> Result<Option<Route>, ExtractionError> {
        let departures = self.successors(assignment, 0, k);
        match departures.len() {
            0 => return Ok(None),
            1 => {}
            count => return Err(ExtractionError::MultipleDepartures { vehicle: k, count }),
        }

        let mut path = vec![0];
        let mut on_route = vec![false; self.layout.num_nodes()];
        let mut current = 0;
        loop {
            let next = match self.successors(assignment, current, k).as_slice() {
                [] => {
                    return Err(ExtractionError::RouteNotClosed {
                        vehicle: k,
                        node: current,
                    })
                }
                [next] => *next,
                _ => {
                    return Err(ExtractionError::BranchingRoute {
                        vehicle: k,
                        node: current,
                    })
                }
            };
            path.push(next);
            if next == 0 {
                break;
            }
            if on_route[next] {
                return Err(ExtractionError::RepeatedNode {
                    vehicle: k,
                    node: next,
                });
            }
            on_route[next] = true;
            current = next;
        }

        if path.len() <= 2 {
            return Ok(None);
        }

        let mut route = Route::new(k);
        let mut load = 0.0;
        for &node_id in &path {
            load += self.instance.node(node_id).demand();
            route.push_visit(Visit {
                node_id,
                arrival_time: assignment.value(self.layout.arrival(node_id, k)),
                load_after: load,
            });
        }
        route.set_total_distance(self.distances.path_length(&path));
        Ok(Some(route))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formulation::FormulationBuilder;
    use crate::models::{Node, TimeWindow, VehicleFleet};
    use crate::solver::{MipSolver, RouteEnumerationSolver, SolverConfig};
    use proptest::prelude::*;

    fn square(fleet: usize) -> ProblemInstance {
        let tw = TimeWindow::new(0.0, 100.0).expect("valid");
        let nodes = vec![
            Node::depot(0.0, 0.0, 100.0),
            Node::new(1, 10.0, 0.0, 1.0, tw, 0.0),
            Node::new(2, 10.0, 10.0, 1.0, tw, 0.0),
            Node::new(3, 0.0, 10.0, 1.0, tw, 0.0),
        ];
        ProblemInstance::new(nodes, VehicleFleet::new(fleet, 10.0)).expect("valid")
    }

    /// Sets `x` along each walk; arrival of the `p`-th stop is `10·p`.
    fn with_walks(layout: &VarLayout, walks: &[(usize, Vec<usize>)]) -> Assignment {
        let mut a = Assignment::zeros(layout.num_variables());
        for (k, walk) in walks {
            let k = *k;
            for (p, pair) in walk.windows(2).enumerate() {
                a.set(layout.arc(pair[0], pair[1], k).expect("arc"), 1.0);
                if pair[1] != 0 {
                    a.set(layout.arrival(pair[1], k), 10.0 * (p + 1) as f64);
                }
            }
        }
        a
    }

    fn extract(
        inst: &ProblemInstance,
        walks: &[(usize, Vec<usize>)],
        reported: Option<f64>,
    ) -> Result<Solution, ExtractionError> {
        let dm = DistanceMatrix::from_nodes(inst.nodes());
        let layout = VarLayout::new(inst.num_nodes(), inst.fleet_size(), false);
        let a = with_walks(&layout, walks);
        SolutionExtractor::new(inst, &dm, &layout).extract_routes(SolveStatus::Optimal, &a, reported)
    }

    #[test]
    fn test_single_closed_route() {
        let inst = square(1);
        let sol = extract(&inst, &[(0, vec![0, 1, 2, 3, 0])], Some(40.0)).expect("extracts");
        assert_eq!(sol.num_routes(), 1);
        let route = &sol.routes()[0];
        assert_eq!(route.node_ids(), vec![0, 1, 2, 3, 0]);
        assert_eq!(route.arrival_times(), vec![0.0, 10.0, 20.0, 30.0, 0.0]);
        assert_eq!(route.total_load(), 3.0);
        assert!((sol.total_distance() - 40.0).abs() < 1e-9);
        assert_eq!(sol.objective_value(), 40.0);
    }

    #[test]
    fn test_unused_vehicles_skipped() {
        let inst = square(3);
        let sol = extract(&inst, &[(1, vec![0, 3, 2, 1, 0])], None).expect("extracts");
        assert_eq!(sol.num_routes(), 1);
        assert_eq!(sol.routes()[0].vehicle_id(), 1);
        assert!(sol.route_of(0).is_none());
        assert!((sol.objective_value() - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_open_route() {
        let inst = square(1);
        let err = extract(&inst, &[(0, vec![0, 1, 2])], None).unwrap_err();
        assert_eq!(err, ExtractionError::RouteNotClosed { vehicle: 0, node: 2 });
    }

    #[test]
    fn test_duplicate_customer() {
        let inst = square(2);
        let err = extract(&inst, &[(0, vec![0, 1, 2, 3, 0]), (1, vec![0, 1, 0])], None).unwrap_err();
        assert_eq!(
            err,
            ExtractionError::DuplicateCustomer {
                customer: 1,
                first: 0,
                second: 1
            }
        );
    }

    #[test]
    fn test_detached_subtour() {
        let inst = square(1);
        let err = extract(&inst, &[(0, vec![0, 1, 0]), (0, vec![2, 3, 2])], None).unwrap_err();
        assert_eq!(err, ExtractionError::DetachedSubtour { vehicle: 0, customer: 2 });
    }

    #[test]
    fn test_uncovered_customer() {
        let inst = square(1);
        let err = extract(&inst, &[(0, vec![0, 1, 2, 0])], None).unwrap_err();
        assert_eq!(err, ExtractionError::UncoveredCustomer(3));
    }

    #[test]
    fn test_branching_and_repeated() {
        let inst = square(1);
        let err = extract(&inst, &[(0, vec![0, 1, 2, 0]), (0, vec![1, 3, 0])], None).unwrap_err();
        assert_eq!(err, ExtractionError::BranchingRoute { vehicle: 0, node: 1 });

        let err = extract(&inst, &[(0, vec![0, 1, 2, 3, 1])], None).unwrap_err();
        assert_eq!(err, ExtractionError::RepeatedNode { vehicle: 0, node: 1 });
    }

    #[test]
    fn test_multiple_departures() {
        let inst = square(1);
        let err = extract(&inst, &[(0, vec![0, 1, 0]), (0, vec![0, 2, 3, 0])], None).unwrap_err();
        assert_eq!(err, ExtractionError::MultipleDepartures { vehicle: 0, count: 2 });
    }

    #[test]
    fn test_fractional_arc() {
        let inst = square(1);
        let dm = DistanceMatrix::from_nodes(inst.nodes());
        let layout = VarLayout::new(4, 1, false);
        let mut a = with_walks(&layout, &[(0, vec![0, 1, 2, 3, 0])]);
        a.set(layout.arc(1, 3, 0).expect("arc"), 0.3);
        let err = SolutionExtractor::new(&inst, &dm, &layout)
            .extract_routes(SolveStatus::Optimal, &a, None)
            .unwrap_err();
        assert!(matches!(
            err,
            ExtractionError::FractionalArc { vehicle: 0, from: 1, to: 3, .. }
        ));

        // near-integral values are accepted within tolerance
        a.set(layout.arc(1, 3, 0).expect("arc"), 1e-6);
        a.set(layout.arc(0, 1, 0).expect("arc"), 1.0 - 1e-6);
        assert!(SolutionExtractor::new(&inst, &dm, &layout)
            .extract_routes(SolveStatus::Optimal, &a, None)
            .is_ok());
    }

    #[test]
    fn test_objective_mismatch() {
        let inst = square(1);
        let err = extract(&inst, &[(0, vec![0, 1, 2, 3, 0])], Some(39.0)).unwrap_err();
        assert!(matches!(
            err,
            ExtractionError::ObjectiveMismatch { reported, .. } if reported == 39.0
        ));
        // relative tolerance
        assert!(extract(&inst, &[(0, vec![0, 1, 2, 3, 0])], Some(40.0 + 1e-8)).is_ok());
    }

    #[test]
    fn test_assignment_size() {
        let inst = square(1);
        let dm = DistanceMatrix::from_nodes(inst.nodes());
        let layout = VarLayout::new(4, 1, false);
        let err = SolutionExtractor::new(&inst, &dm, &layout)
            .extract_routes(SolveStatus::Optimal, &Assignment::zeros(3), None)
            .unwrap_err();
        assert_eq!(
            err,
            ExtractionError::AssignmentSize {
                expected: layout.num_variables(),
                actual: 3
            }
        );
    }

    #[test]
    fn test_extract_outcome_statuses() {
        let inst = square(1);
        let dm = DistanceMatrix::from_nodes(inst.nodes());
        let layout = VarLayout::new(4, 1, false);
        let extractor = SolutionExtractor::new(&inst, &dm, &layout);

        let err = extractor
            .extract(&SolverOutcome::empty(SolveStatus::Infeasible))
            .unwrap_err();
        assert_eq!(err, SolveError::NoSolution { status: SolveStatus::Infeasible });

        let err = extractor
            .extract(&SolverOutcome::empty(SolveStatus::Optimal))
            .unwrap_err();
        assert_eq!(err, SolveError::NoSolution { status: SolveStatus::Optimal });

        let a = with_walks(&layout, &[(0, vec![0, 3, 2, 1, 0])]);
        let outcome = SolverOutcome::with_solution(SolveStatus::Feasible, 40.0, a);
        let sol = extractor.extract(&outcome).expect("extracts");
        assert_eq!(sol.status(), SolveStatus::Feasible);
        assert!(!sol.is_optimal());
    }

    #[test]
    fn test_extraction_is_idempotent() {
        let inst = square(2);
        let dm = DistanceMatrix::from_nodes(inst.nodes());
        let f = FormulationBuilder::new(&inst, &dm).build().expect("builds");
        let outcome = RouteEnumerationSolver::new(&inst, &dm).solve(f.model(), &SolverConfig::default());
        let extractor = SolutionExtractor::new(&inst, &dm, f.layout());
        let first = extractor.extract(&outcome).expect("extracts");
        let second = extractor.extract(&outcome).expect("extracts");
        assert_eq!(first, second);
        assert_eq!(first.num_served(), 3);
    }

    proptest! {
        #[test]
        fn prop_extracts_any_tour(order in Just(vec![1usize, 2, 3]).prop_shuffle()) {
            let inst = square(1);
            let dm = DistanceMatrix::from_nodes(inst.nodes());
            let mut walk = vec![0];
            walk.extend(&order);
            walk.push(0);
            let sol = extract(&inst, &[(0, walk.clone())], Some(dm.path_length(&walk)))
                .expect("extracts");
            prop_assert_eq!(sol.routes()[0].customer_ids(), order);
        }
    }
}
