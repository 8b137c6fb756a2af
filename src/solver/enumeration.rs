//! Exact route enumeration backend for small CVRPTW models.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{MipSolver, SolveStatus, SolverConfig, SolverOutcome};
use crate::distance::DistanceMatrix;
use crate::formulation::{Assignment, Direction, MipModel, Sense, VarId, VarLayout};
use crate::models::ProblemInstance;

const FEASIBILITY_TOL: f64 = 1e-6;

/// Configuration of [`RouteEnumerationSolver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnumerationConfig {
    /// Largest number of customers the solver accepts.
    pub max_customers: usize,
}

impl Default for EnumerationConfig {
    fn default() -> Self {
        Self { max_customers: 9 }
    }
}

impl EnumerationConfig {
    /// Sets the customer limit.
    pub fn with_max_customers(mut self, max_customers: usize) -> Self {
        self.max_customers = max_customers;
        self
    }
}

/// Exact solver for CVRPTW models of small instances.
///
/// Enumerates sets of routes depth-first, vehicle by vehicle, pruning on
/// capacity, time windows and the incumbent distance. Each complete
/// candidate fixes the arc variables; the continuous variables then take
/// the least values allowed by their bounds and the big-M rows, found by
/// longest-path propagation. A route set is rejected only when no such
/// values exist, and accepted only if the model itself reports no
/// violation, so the returned values are feasible for the exact model
/// handed to [`solve`](MipSolver::solve), whatever its big-M or subtour
/// options.
///
/// Vehicles are interchangeable: routes are assigned to vehicles `0, 1, …`
/// in increasing order of their first customer.
///
/// # Examples
///
/// ```
/// use u_cvrptw::distance::DistanceMatrix;
/// use u_cvrptw::formulation::FormulationBuilder;
/// use u_cvrptw::models::{Node, ProblemInstance, TimeWindow, VehicleFleet};
/// use u_cvrptw::solver::{MipSolver, RouteEnumerationSolver, SolveStatus, SolverConfig};
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
/// let formulation = FormulationBuilder::new(&instance, &distances).build().unwrap();
///
/// let solver = RouteEnumerationSolver::new(&instance, &distances);
/// let outcome = solver.solve(formulation.model(), &SolverConfig::default());
/// assert_eq!(outcome.status, SolveStatus::Optimal);
/// assert!((outcome.objective_value.unwrap() - 40.0).abs() < 1e-9);
/// ```
pub struct RouteEnumerationSolver<'a> {
    instance: &'a ProblemInstance,
    distances: &'a DistanceMatrix,
    config: EnumerationConfig,
}

impl<'a> RouteEnumerationSolver<'a> {
    /// Creates a solver bound to an instance and its distances.
    pub fn new(instance: &'a ProblemInstance, distances: &'a DistanceMatrix) -> Self {
        Self {
            instance,
            distances,
            config: EnumerationConfig::default(),
        }
    }

    /// Overrides the configuration.
    pub fn with_config(mut self, config: EnumerationConfig) -> Self {
        self.config = config;
        self
    }
}

impl MipSolver for RouteEnumerationSolver<'_> {
    fn solve(&self, model: &MipModel, config: &SolverConfig) -> SolverOutcome {
        let start = Instant::now();
        let num_customers = self.instance.num_customers();
        if num_customers > self.config.max_customers {
            warn!(
                customers = num_customers,
                limit = self.config.max_customers,
                "instance too large for route enumeration"
            );
            return SolverOutcome::empty(SolveStatus::Error);
        }
        if model.objective().direction != Direction::Minimize || model.validate().is_err() {
            warn!(model = model.name(), "model rejected by route enumeration");
            return SolverOutcome::empty(SolveStatus::Error);
        }
        let Some(layout) = VarLayout::matching(
            self.instance.num_nodes(),
            self.instance.fleet_size(),
            model.num_variables(),
        ) else {
            warn!(
                variables = model.num_variables(),
                "model does not match the instance dimensions"
            );
            return SolverOutcome::empty(SolveStatus::Error);
        };

        let Some(rows) = difference_rows(model) else {
            warn!(model = model.name(), "continuous rows are not difference constraints");
            return SolverOutcome::empty(SolveStatus::Error);
        };

        let mut search = Search::new(self.instance, self.distances, model, layout, rows);
        search.deadline = config.time_limit.map(|limit| start + limit);
        search.explore();

        debug!(
            nodes = search.explored,
            candidates = search.candidates,
            rejected = search.rejected,
            "route enumeration finished"
        );

        let outcome = match (search.best.take(), search.timed_out) {
            (Some(best), false) => {
                SolverOutcome::with_solution(SolveStatus::Optimal, best.objective, best.assignment)
            }
            (Some(best), true) => {
                warn!(objective = best.objective, "time limit reached, returning incumbent");
                SolverOutcome::with_solution(SolveStatus::Feasible, best.objective, best.assignment)
            }
            (None, true) => {
                warn!("time limit reached before a feasible solution was found");
                SolverOutcome::empty(SolveStatus::Infeasible)
            }
            (None, false) => SolverOutcome::empty(SolveStatus::Infeasible),
        };
        outcome.timed(start.elapsed())
    }
}

struct Incumbent {
    distance: f64,
    objective: f64,
    assignment: Assignment,
}

/// Depth-first search state.
struct Search<'s> {
    instance: &'s ProblemInstance,
    distances: &'s DistanceMatrix,
    model: &'s MipModel,
    layout: VarLayout,
    rows: Vec<DifferenceRow>,
    continuous: Vec<VarId>,
    deadline: Option<Instant>,
    timed_out: bool,

    routes: Vec<Vec<usize>>,
    current: Vec<usize>,
    visited: Vec<bool>,
    served: usize,
    time: f64,
    load: f64,
    cost: f64,

    best: Option<Incumbent>,
    explored: usize,
    candidates: usize,
    rejected: usize,
}

impl<'s> Search<'s> {
    fn new(
        instance: &'s ProblemInstance,
        distances: &'s DistanceMatrix,
        model: &'s MipModel,
        layout: VarLayout,
        rows: Vec<DifferenceRow>,
    ) -> Self {
        let continuous = (0..model.num_variables())
            .map(VarId)
            .filter(|&var| !model.variable(var).is_binary())
            .collect();
        Self {
            instance,
            distances,
            model,
            layout,
            rows,
            continuous,
            deadline: None,
            timed_out: false,
            routes: Vec::new(),
            current: Vec::new(),
            visited: vec![false; instance.num_nodes()],
            served: 0,
            time: instance.depot().ready_time(),
            load: 0.0,
            cost: 0.0,
            best: None,
            explored: 0,
            candidates: 0,
            rejected: 0,
        }
    }

    fn bound(&self) -> f64 {
        self.best.as_ref().map_or(f64::INFINITY, |b| b.distance)
    }

    fn expired(&mut self) -> bool {
        if !self.timed_out {
            if let Some(deadline) = self.deadline {
                self.timed_out = Instant::now() >= deadline;
            }
        }
        self.timed_out
    }

    fn explore(&mut self) {
        if self.expired() {
            return;
        }
        self.explored += 1;
        let all_served = self.served == self.instance.num_customers();
        let last = self.current.last().copied().unwrap_or(0);

        if self.current.is_empty() {
            if all_served {
                self.offer(self.cost);
                return;
            }
        } else {
            let closed = self.cost + self.distances.get(last, 0);
            if all_served {
                self.offer(closed);
                return;
            }
            if self.routes.len() + 1 < self.layout.num_vehicles() && closed < self.bound() {
                self.open_next_route(closed);
            }
        }
        self.extend(last);
    }

    fn open_next_route(&mut self, closed: f64) {
        let saved = (self.time, self.load, self.cost);
        let route = std::mem::take(&mut self.current);
        self.routes.push(route);
        self.time = self.instance.depot().ready_time();
        self.load = 0.0;
        self.cost = closed;

        self.explore();

        self.current = self.routes.pop().unwrap_or_default();
        (self.time, self.load, self.cost) = saved;
    }

    fn extend(&mut self, last: usize) {
        // identical vehicles: a new route must start after the previous one's first customer
        let min_first = if self.current.is_empty() {
            self.routes.last().and_then(|r| r.first()).copied().unwrap_or(0)
        } else {
            0
        };
        let capacity = self.instance.capacity();
        let depart = self.time + self.instance.node(last).service_time();

        for c in (min_first + 1)..self.instance.num_nodes() {
            if self.visited[c] {
                continue;
            }
            let node = self.instance.node(c);
            let load = self.load + node.demand();
            if load > capacity + FEASIBILITY_TOL {
                continue;
            }
            let arrival = (depart + self.distances.get(last, c)).max(node.ready_time());
            if arrival > node.due_date() + FEASIBILITY_TOL {
                continue;
            }
            let cost = self.cost + self.distances.get(last, c);
            if cost >= self.bound() {
                continue;
            }

            let saved = (self.time, self.load, self.cost);
            self.visited[c] = true;
            self.served += 1;
            self.current.push(c);
            (self.time, self.load, self.cost) = (arrival, load, cost);

            self.explore();

            self.current.pop();
            self.served -= 1;
            self.visited[c] = false;
            (self.time, self.load, self.cost) = saved;

            if self.timed_out {
                return;
            }
        }
    }

    fn offer(&mut self, distance: f64) {
        if distance >= self.bound() {
            return;
        }
        self.candidates += 1;
        let mut routes = self.routes.clone();
        if !self.current.is_empty() {
            routes.push(self.current.clone());
        }
        let assignment = match self.assignment(&routes) {
            Some(assignment) if self.model.is_feasible(&assignment, FEASIBILITY_TOL) => assignment,
            _ => {
                self.rejected += 1;
                return;
            }
        };
        let objective = self.model.objective_value(&assignment);
        self.best = Some(Incumbent {
            distance,
            objective,
            assignment,
        });
    }

    /// Full variable values for a set of routes, route `r` on vehicle `r`.
    ///
    /// Fixes the arc variables, then gives every continuous variable its
    /// least value under the difference rows. `None` if no such values exist.
    fn assignment(&self, routes: &[Vec<usize>]) -> Option<Assignment> {
        let layout = &self.layout;
        let mut values = Assignment::zeros(layout.num_variables());
        for (k, route) in routes.iter().enumerate() {
            let mut prev = 0;
            for &c in route.iter().chain(std::iter::once(&0)) {
                if let Some(x) = layout.arc(prev, c, k) {
                    values.set(x, 1.0);
                }
                prev = c;
            }
        }
        self.propagate(&mut values).then_some(values)
    }

    /// Longest-path relaxation of the difference rows from the lower bounds.
    ///
    /// Returns `false` when a value is pushed past its upper bound or the
    /// rows keep tightening after every chain has been relaxed, which means
    /// a positive cycle.
    fn propagate(&self, values: &mut Assignment) -> bool {
        for &var in &self.continuous {
            values.set(var, self.model.variable(var).lower);
        }
        for _ in 0..=self.continuous.len() {
            let mut changed = false;
            for row in &self.rows {
                let required = values.value(row.tail) + row.offset(values);
                if required > values.value(row.head) {
                    if required > self.model.variable(row.head).upper + FEASIBILITY_TOL {
                        return false;
                    }
                    values.set(row.head, required);
                    changed = true;
                }
            }
            if !changed {
                return true;
            }
        }
        false
    }
}

/// A row `head − tail ≥ rhs − Σ coef·binary` once normalized.
#[derive(Debug, Clone, PartialEq)]
struct DifferenceRow {
    head: VarId,
    tail: VarId,
    rhs: f64,
    binaries: Vec<(VarId, f64)>,
}

impl DifferenceRow {
    /// Lower bound on `head − tail` for the current binary values.
    fn offset(&self, values: &Assignment) -> f64 {
        self.rhs
            - self
                .binaries
                .iter()
                .map(|&(var, coef)| coef * values.value(var))
                .sum::<f64>()
    }
}

/// Rows over continuous variables, each as a [`DifferenceRow`].
///
/// `None` if some row over continuous variables is not of the form
/// `a − b (≥ | ≤) rhs` plus binary terms.
fn difference_rows(model: &MipModel) -> Option<Vec<DifferenceRow>> {
    let mut rows = Vec::new();
    for constraint in model.constraints() {
        let (continuous, binaries): (Vec<(VarId, f64)>, Vec<(VarId, f64)>) = constraint
            .expr
            .terms()
            .iter()
            .copied()
            .partition(|&(var, _)| !model.variable(var).is_binary());
        if continuous.is_empty() {
            continue;
        }
        let sign = match constraint.sense {
            Sense::GreaterEqual => 1.0,
            Sense::LessEqual => -1.0,
            Sense::Equal => return None,
        };
        let (head, tail) = match continuous[..] {
            [(a, ca), (b, cb)] if sign * ca == 1.0 && sign * cb == -1.0 => (a, b),
            [(a, ca), (b, cb)] if sign * ca == -1.0 && sign * cb == 1.0 => (b, a),
            _ => return None,
        };
        rows.push(DifferenceRow {
            head,
            tail,
            rhs: sign * (constraint.rhs - constraint.expr.constant()),
            binaries: binaries.into_iter().map(|(var, coef)| (var, sign * coef)).collect(),
        });
    }
    Some(rows)
}
