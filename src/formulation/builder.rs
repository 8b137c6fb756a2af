//! Arc-based CVRPTW formulation with big-M propagation constraints.
//!
//! # Model
//!
//! For nodes `0..n` (0 = depot), vehicles `0..K` and arcs `(i, j)`, `i ≠ j`:
//!
//! ```text
//! min  Σ d(i,j)·x[i,j,k]
//! s.t. Σ_{i,k} x[i,j,k] = 1                                  ∀ customer j
//!      Σ_i x[i,h,k] − Σ_j x[h,j,k] = 0                        ∀ h, k
//!      Σ_j x[0,j,k] ≤ 1                                       ∀ k
//!      load[j,k] ≥ load[i,k] + q_j − M_load·(1 − x[i,j,k])     ∀ (i,j), j ≠ 0, k
//!      t[j,k] ≥ t[i,k] + s_i + d(i,j) − M_time·(1 − x[i,j,k])  ∀ (i,j), j ≠ 0, k
//!      load[0,k] = 0,  0 ≤ load[i,k] ≤ Q,  e_i ≤ t[i,k] ≤ l_i
//! ```
//!
//! # Subtours
//!
//! Flow conservation alone admits cycles that never touch the depot. Summing
//! the propagation constraints around such a cycle shows it is infeasible
//! unless every node on it has zero demand, zero service time and zero
//! distance to the next one, i.e. co-located "free" customers. The builder
//! warns when such customers exist; [`SubtourElimination::Mtz`] removes the
//! gap with explicit ordering constraints.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::expr::{Constraint, ConstraintFamily, LinearExpr, Sense, Variable};
use super::layout::VarLayout;
use super::model::MipModel;
use crate::distance::DistanceMatrix;
use crate::error::FormulationError;
use crate::models::ProblemInstance;

/// How big-M constants of the time propagation are chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BigMPolicy {
    /// `M_load = capacity`, `M_time = max(due_date)` for every arc.
    #[default]
    Global,
    /// Per-arc `M_ij = max(0, due_i + s_i + d(i,j) − ready_j)`, the smallest
    /// constant that never cuts a feasible schedule. `M_load = capacity`.
    PerArc,
}

/// Whether depot-free cycles are excluded explicitly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubtourElimination {
    /// Rely on load and time propagation only.
    #[default]
    PropagationOnly,
    /// Add Miller–Tucker–Zemlin ordering variables and constraints.
    Mtz,
}

/// Formulation options.
///
/// # Examples
///
/// ```
/// use u_cvrptw::formulation::{BigMPolicy, FormulationConfig, SubtourElimination};
///
/// let config = FormulationConfig::default()
///     .with_big_m(BigMPolicy::PerArc)
///     .with_subtour_elimination(SubtourElimination::Mtz);
/// assert_eq!(config.big_m, BigMPolicy::PerArc);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormulationConfig {
    /// Big-M selection for time propagation.
    pub big_m: BigMPolicy,
    /// Subtour handling.
    pub subtour_elimination: SubtourElimination,
}

impl FormulationConfig {
    /// Sets the big-M policy.
    pub fn with_big_m(mut self, big_m: BigMPolicy) -> Self {
        self.big_m = big_m;
        self
    }

    /// Sets the subtour handling.
    pub fn with_subtour_elimination(mut self, subtour: SubtourElimination) -> Self {
        self.subtour_elimination = subtour;
        self
    }
}

/// Global big-M constants of a formulation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BigM {
    /// Load constant (vehicle capacity).
    pub load: f64,
    /// Time constant (latest due date).
    pub time: f64,
}

/// A built CVRPTW model together with its variable layout.
#[derive(Debug, Clone)]
pub struct Formulation {
    model: MipModel,
    layout: VarLayout,
    big_m: BigM,
    config: FormulationConfig,
}

impl Formulation {
    /// The abstract optimization model.
    pub fn model(&self) -> &MipModel {
        &self.model
    }

    /// Variable positions.
    pub fn layout(&self) -> &VarLayout {
        &self.layout
    }

    /// Global big-M constants.
    pub fn big_m(&self) -> BigM {
        self.big_m
    }

    /// Options the model was built with.
    pub fn config(&self) -> FormulationConfig {
        self.config
    }

    /// Splits into model and layout.
    pub fn into_parts(self) -> (MipModel, VarLayout) {
        (self.model, self.layout)
    }
}

/// Builds the [`Formulation`] of a [`ProblemInstance`].
///
/// The builder only borrows its inputs; every call to
/// [`build`](Self::build) produces a fresh, independent model.
///
/// # Examples
///
/// ```
/// use u_cvrptw::distance::DistanceMatrix;
/// use u_cvrptw::formulation::{ConstraintFamily, FormulationBuilder};
/// use u_cvrptw::models::{Node, ProblemInstance, TimeWindow, VehicleFleet};
///
/// let tw = TimeWindow::new(0.0, 100.0).unwrap();
/// let nodes = vec![
///     Node::depot(0.0, 0.0, 100.0),
///     Node::new(1, 10.0, 0.0, 1.0, tw, 0.0),
///     Node::new(2, 0.0, 10.0, 1.0, tw, 0.0),
/// ];
/// let instance = ProblemInstance::new(nodes, VehicleFleet::new(2, 10.0)).unwrap();
/// let distances = DistanceMatrix::from_nodes(instance.nodes());
///
/// let formulation = FormulationBuilder::new(&instance, &distances).build().unwrap();
/// let model = formulation.model();
/// assert_eq!(model.num_binary(), 3 * 2 * 2);
/// assert_eq!(model.constraints_of(ConstraintFamily::CustomerAssignment).count(), 2);
/// ```
pub struct FormulationBuilder<'a> {
    instance: &'a ProblemInstance,
    distances: &'a DistanceMatrix,
    config: FormulationConfig,
}

impl<'a> FormulationBuilder<'a> {
    /// Creates a builder with the default configuration.
    pub fn new(instance: &'a ProblemInstance, distances: &'a DistanceMatrix) -> Self {
        Self {
            instance,
            distances,
            config: FormulationConfig::default(),
        }
    }

    /// Overrides the configuration.
    pub fn with_config(mut self, config: FormulationConfig) -> Self {
        self.config = config;
        self
    }

    /// Builds variables, objective and constraints.
    ///
    /// # Errors
    ///
    /// Returns [`FormulationError::DistanceSizeMismatch`] if the matrix does
    /// not match the instance, or any error of [`MipModel::validate`].
    pub fn build(&self) -> Result<Formulation, FormulationError> {
        let n = self.instance.num_nodes();
        if self.distances.size() != n {
            return Err(FormulationError::DistanceSizeMismatch {
                matrix: self.distances.size(),
                nodes: n,
            });
        }
        let with_order = self.config.subtour_elimination == SubtourElimination::Mtz;
        let layout = VarLayout::new(n, self.instance.fleet_size(), with_order);
        let big_m = BigM {
            load: self.instance.capacity(),
            time: self.instance.max_due_date(),
        };

        let mut model = MipModel::minimize("cvrptw");
        self.add_variables(&mut model, &layout);
        model.set_objective(self.objective(&layout));
        self.add_customer_assignment(&mut model, &layout);
        self.add_flow_conservation(&mut model, &layout);
        self.add_depot_departure(&mut model, &layout);
        self.add_load_propagation(&mut model, &layout, big_m.load);
        self.add_time_propagation(&mut model, &layout, big_m.time);
        if with_order {
            self.add_subtour_elimination(&mut model, &layout);
        } else {
            self.warn_free_cycles();
        }
        model.validate()?;

        debug!(
            variables = model.num_variables(),
            binaries = model.num_binary(),
            constraints = model.num_constraints(),
            big_m_load = big_m.load,
            big_m_time = big_m.time,
            policy = ?self.config.big_m,
            "built CVRPTW formulation"
        );

        Ok(Formulation {
            model,
            layout,
            big_m,
            config: self.config,
        })
    }

    fn add_variables(&self, model: &mut MipModel, layout: &VarLayout) {
        let capacity = self.instance.capacity();
        for k in 0..layout.num_vehicles() {
            for (i, j) in layout.arcs() {
                let id = model.add_variable(Variable::binary(format!("x_{i}_{j}_{k}")));
                debug_assert_eq!(Some(id), layout.arc(i, j, k));
            }
        }
        for k in 0..layout.num_vehicles() {
            for i in 0..layout.num_nodes() {
                let upper = if i == 0 { 0.0 } else { capacity };
                let id = model.add_variable(Variable::continuous(format!("load_{i}_{k}"), 0.0, upper));
                debug_assert_eq!(id, layout.load(i, k));
            }
        }
        for k in 0..layout.num_vehicles() {
            for node in self.instance.nodes() {
                let i = node.id();
                let var = Variable::continuous(
                    format!("arrival_{i}_{k}"),
                    node.ready_time(),
                    node.due_date(),
                );
                let id = model.add_variable(var);
                debug_assert_eq!(id, layout.arrival(i, k));
            }
        }
        if layout.has_order() {
            let positions = self.instance.num_customers() as f64;
            for k in 0..layout.num_vehicles() {
                for c in 1..layout.num_nodes() {
                    let id = model.add_variable(Variable::continuous(
                        format!("order_{c}_{k}"),
                        1.0,
                        positions,
                    ));
                    debug_assert_eq!(Some(id), layout.order(c, k));
                }
            }
        }
    }

    fn objective(&self, layout: &VarLayout) -> LinearExpr {
        (0..layout.num_vehicles())
            .flat_map(|k| layout.arcs().map(move |(i, j)| (i, j, k)))
            .filter_map(|(i, j, k)| {
                layout
                    .arc(i, j, k)
                    .map(|var| (var, self.distances.get(i, j)))
            })
            .collect()
    }

    fn add_customer_assignment(&self, model: &mut MipModel, layout: &VarLayout) {
        let n = layout.num_nodes();
        for j in 1..n {
            let expr = (0..layout.num_vehicles())
                .flat_map(|k| (0..n).filter_map(move |i| layout.arc(i, j, k)))
                .map(|var| (var, 1.0))
                .collect();
            model.add_constraint(Constraint::new(
                format!("assign_{j}"),
                ConstraintFamily::CustomerAssignment,
                expr,
                Sense::Equal,
                1.0,
            ));
        }
    }

    fn add_flow_conservation(&self, model: &mut MipModel, layout: &VarLayout) {
        let n = layout.num_nodes();
        for k in 0..layout.num_vehicles() {
            for h in 0..n {
                let inflow = (0..n).filter_map(|i| layout.arc(i, h, k)).map(|v| (v, 1.0));
                let outflow = (0..n).filter_map(|j| layout.arc(h, j, k)).map(|v| (v, -1.0));
                model.add_constraint(Constraint::new(
                    format!("flow_{h}_{k}"),
                    ConstraintFamily::FlowConservation,
                    inflow.chain(outflow).collect(),
                    Sense::Equal,
                    0.0,
                ));
            }
        }
    }

    fn add_depot_departure(&self, model: &mut MipModel, layout: &VarLayout) {
        for k in 0..layout.num_vehicles() {
            let expr = (1..layout.num_nodes())
                .filter_map(|j| layout.arc(0, j, k))
                .map(|v| (v, 1.0))
                .collect();
            model.add_constraint(Constraint::new(
                format!("depart_{k}"),
                ConstraintFamily::DepotDeparture,
                expr,
                Sense::LessEqual,
                1.0,
            ));
        }
    }

    /// `load[j] − load[i] − M·x ≥ q_j − M`
    fn add_load_propagation(&self, model: &mut MipModel, layout: &VarLayout, big_m: f64) {
        for k in 0..layout.num_vehicles() {
            for (i, j) in layout.arcs().filter(|&(_, j)| j != 0) {
                let Some(x) = layout.arc(i, j, k) else { continue };
                let expr = LinearExpr::new()
                    .with_term(layout.load(j, k), 1.0)
                    .with_term(layout.load(i, k), -1.0)
                    .with_term(x, -big_m);
                model.add_constraint(Constraint::new(
                    format!("load_{i}_{j}_{k}"),
                    ConstraintFamily::LoadPropagation,
                    expr,
                    Sense::GreaterEqual,
                    self.instance.node(j).demand() - big_m,
                ));
            }
        }
    }

    /// `t[j] − t[i] − M·x ≥ s_i + d(i,j) − M`
    fn add_time_propagation(&self, model: &mut MipModel, layout: &VarLayout, global_m: f64) {
        let mut loose_arcs = 0usize;
        for (i, j) in layout.arcs().filter(|&(_, j)| j != 0) {
            let travel = self.instance.node(i).service_time() + self.distances.get(i, j);
            let tight = self.tight_time_m(i, j, travel);
            let big_m = match self.config.big_m {
                BigMPolicy::Global => {
                    if tight > global_m {
                        loose_arcs += 1;
                    }
                    global_m
                }
                BigMPolicy::PerArc => tight,
            };
            for k in 0..layout.num_vehicles() {
                let Some(x) = layout.arc(i, j, k) else { continue };
                let expr = LinearExpr::new()
                    .with_term(layout.arrival(j, k), 1.0)
                    .with_term(layout.arrival(i, k), -1.0)
                    .with_term(x, -big_m);
                model.add_constraint(Constraint::new(
                    format!("time_{i}_{j}_{k}"),
                    ConstraintFamily::TimePropagation,
                    expr,
                    Sense::GreaterEqual,
                    travel - big_m,
                ));
            }
        }
        if loose_arcs > 0 {
            warn!(
                arcs = loose_arcs,
                big_m = global_m,
                "global time big-M is below the per-arc bound on some arcs; feasible schedules may be cut"
            );
        }
    }

    fn tight_time_m(&self, i: usize, j: usize, travel: f64) -> f64 {
        let due_i = self.instance.node(i).due_date();
        let ready_j = self.instance.node(j).ready_time();
        (due_i + travel - ready_j).max(0.0)
    }

    /// `order[j] − order[i] − N·x ≥ 1 − N` over customer arcs.
    fn add_subtour_elimination(&self, model: &mut MipModel, layout: &VarLayout) {
        let positions = self.instance.num_customers() as f64;
        for k in 0..layout.num_vehicles() {
            for (i, j) in layout.arcs().filter(|&(i, j)| i != 0 && j != 0) {
                let (Some(x), Some(oi), Some(oj)) =
                    (layout.arc(i, j, k), layout.order(i, k), layout.order(j, k))
                else {
                    continue;
                };
                let expr = LinearExpr::new()
                    .with_term(oj, 1.0)
                    .with_term(oi, -1.0)
                    .with_term(x, -positions);
                model.add_constraint(Constraint::new(
                    format!("mtz_{i}_{j}_{k}"),
                    ConstraintFamily::SubtourElimination,
                    expr,
                    Sense::GreaterEqual,
                    1.0 - positions,
                ));
            }
        }
    }

    fn warn_free_cycles(&self) {
        let free: Vec<_> = self
            .instance
            .customers()
            .iter()
            .filter(|c| c.demand() == 0.0 && c.service_time() == 0.0)
            .collect();
        let co_located = free.iter().enumerate().any(|(a, ca)| {
            free[a + 1..]
                .iter()
                .any(|cb| self.distances.get(ca.id(), cb.id()) == 0.0)
        });
        if co_located {
            warn!("co-located customers without demand or service time can form depot-free subtours; consider SubtourElimination::Mtz");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formulation::Assignment;
    use crate::models::{Node, TimeWindow, VehicleFleet};

    fn window(ready: f64, due: f64) -> TimeWindow {
        TimeWindow::new(ready, due).expect("valid")
    }

    fn square(fleet: usize) -> ProblemInstance {
        let tw = window(0.0, 100.0);
        let nodes = vec![
            Node::depot(0.0, 0.0, 100.0),
            Node::new(1, 10.0, 0.0, 1.0, tw, 0.0),
            Node::new(2, 10.0, 10.0, 1.0, tw, 0.0),
            Node::new(3, 0.0, 10.0, 1.0, tw, 0.0),
        ];
        ProblemInstance::new(nodes, VehicleFleet::new(fleet, 10.0)).expect("valid")
    }

    fn build(instance: &ProblemInstance, config: FormulationConfig) -> Formulation {
        let dm = DistanceMatrix::from_nodes(instance.nodes());
        FormulationBuilder::new(instance, &dm)
            .with_config(config)
            .build()
            .expect("builds")
    }

    /// Assignment for the tour 0 → 1 → 2 → 3 → 0 on vehicle 0.
    fn tour_assignment(f: &Formulation) -> Assignment {
        let layout = f.layout();
        let mut a = Assignment::zeros(layout.num_variables());
        let tour = [0, 1, 2, 3, 0];
        for w in tour.windows(2) {
            a.set(layout.arc(w[0], w[1], 0).expect("arc"), 1.0);
        }
        for k in 0..layout.num_vehicles() {
            for c in 1..4 {
                a.set(layout.load(c, k), 10.0);
            }
        }
        for (pos, c) in [1, 2, 3].into_iter().enumerate() {
            a.set(layout.load(c, 0), (pos + 1) as f64);
            a.set(layout.arrival(c, 0), 10.0 * (pos + 1) as f64);
            if let Some(o) = layout.order(c, 0) {
                a.set(o, (pos + 1) as f64);
            }
        }
        for k in 0..layout.num_vehicles() {
            for c in 1..4 {
                if let Some(o) = layout.order(c, k) {
                    if k > 0 {
                        a.set(o, 1.0);
                    }
                }
            }
        }
        a
    }

    #[test]
    fn test_family_counts() {
        let inst = square(2);
        let f = build(&inst, FormulationConfig::default());
        let m = f.model();
        let (n, k) = (4, 2);
        assert_eq!(m.num_binary(), n * (n - 1) * k);
        assert_eq!(m.num_variables(), n * (n - 1) * k + 2 * n * k);
        assert_eq!(m.constraints_of(ConstraintFamily::CustomerAssignment).count(), n - 1);
        assert_eq!(m.constraints_of(ConstraintFamily::FlowConservation).count(), n * k);
        assert_eq!(m.constraints_of(ConstraintFamily::DepotDeparture).count(), k);
        // arcs (i, j) with j != depot: n·(n−1) − (n−1)
        let propagated = (n - 1) * (n - 1) * k;
        assert_eq!(m.constraints_of(ConstraintFamily::LoadPropagation).count(), propagated);
        assert_eq!(m.constraints_of(ConstraintFamily::TimePropagation).count(), propagated);
        assert_eq!(m.constraints_of(ConstraintFamily::SubtourElimination).count(), 0);
    }

    #[test]
    fn test_no_self_loops() {
        let f = build(&square(1), FormulationConfig::default());
        assert!(f
            .model()
            .variables()
            .iter()
            .all(|v| !v.name.starts_with("x_") || {
                let parts: Vec<&str> = v.name.split('_').collect();
                parts[1] != parts[2]
            }));
    }

    #[test]
    fn test_big_m_constants() {
        let f = build(&square(1), FormulationConfig::default());
        assert_eq!(f.big_m(), BigM { load: 10.0, time: 100.0 });

        let m = f.model();
        let load = m
            .constraints()
            .iter()
            .find(|c| c.name == "load_0_1_0")
            .expect("exists");
        assert_eq!(load.rhs, 1.0 - 10.0);
        assert_eq!(load.sense, Sense::GreaterEqual);

        let time = m
            .constraints()
            .iter()
            .find(|c| c.name == "time_1_2_0")
            .expect("exists");
        assert!((time.rhs - (10.0 - 100.0)).abs() < 1e-12);
    }

    #[test]
    fn test_per_arc_big_m() {
        let f = build(&square(1), FormulationConfig::default().with_big_m(BigMPolicy::PerArc));
        let time = f
            .model()
            .constraints()
            .iter()
            .find(|c| c.name == "time_1_2_0")
            .expect("exists");
        // M = due_1 + s_1 + d(1,2) − ready_2 = 100 + 0 + 10 − 0
        let m = 110.0;
        assert!((time.rhs - (10.0 - m)).abs() < 1e-12);
    }

    #[test]
    fn test_variable_bounds() {
        let f = build(&square(1), FormulationConfig::default());
        let m = f.model();
        let layout = f.layout();
        let depot_load = m.variable(layout.load(0, 0));
        assert_eq!((depot_load.lower, depot_load.upper), (0.0, 0.0));
        let load = m.variable(layout.load(2, 0));
        assert_eq!((load.lower, load.upper), (0.0, 10.0));
        let arrival = m.variable(layout.arrival(3, 0));
        assert_eq!((arrival.lower, arrival.upper), (0.0, 100.0));
    }

    #[test]
    fn test_objective_matches_tour_length() {
        let inst = square(1);
        let f = build(&inst, FormulationConfig::default());
        let a = tour_assignment(&f);
        assert!(f.model().is_feasible(&a, 1e-9));
        assert!((f.model().objective_value(&a) - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_mtz_accepts_tour() {
        let inst = square(2);
        let f = build(
            &inst,
            FormulationConfig::default().with_subtour_elimination(SubtourElimination::Mtz),
        );
        assert_eq!(
            f.model().constraints_of(ConstraintFamily::SubtourElimination).count(),
            3 * 2 * 2
        );
        assert!(f.layout().has_order());
        let a = tour_assignment(&f);
        assert!(f.model().is_feasible(&a, 1e-9));
    }

    #[test]
    fn test_rejects_two_visits() {
        let inst = square(1);
        let f = build(&inst, FormulationConfig::default());
        let layout = f.layout();
        let mut a = tour_assignment(&f);
        // enter customer 2 a second time from the depot
        a.set(layout.arc(0, 2, 0).expect("arc"), 1.0);
        assert!(!f.model().is_feasible(&a, 1e-9));
    }

    #[test]
    fn test_rejects_late_arrival() {
        let inst = square(1);
        let f = build(&inst, FormulationConfig::default());
        let layout = f.layout();
        let mut a = tour_assignment(&f);
        // customer 3 cannot be served before customer 2 plus travel
        a.set(layout.arrival(3, 0), 15.0);
        assert!(!f.model().is_feasible(&a, 1e-9));
    }

    #[test]
    fn test_rejects_overload() {
        let tw = window(0.0, 100.0);
        let nodes = vec![
            Node::depot(0.0, 0.0, 100.0),
            Node::new(1, 10.0, 0.0, 6.0, tw, 0.0),
            Node::new(2, 0.0, 10.0, 6.0, tw, 0.0),
        ];
        let inst = ProblemInstance::new(nodes, VehicleFleet::new(1, 10.0)).expect("valid");
        let f = build(&inst, FormulationConfig::default());
        let layout = *f.layout();
        let mut a = Assignment::zeros(layout.num_variables());
        for w in [0, 1, 2, 0].windows(2) {
            a.set(layout.arc(w[0], w[1], 0).expect("arc"), 1.0);
        }
        // the best load values still exceed capacity on the second stop
        a.set(layout.load(1, 0), 6.0);
        a.set(layout.load(2, 0), 10.0);
        a.set(layout.arrival(1, 0), 10.0);
        a.set(layout.arrival(2, 0), 30.0);
        assert!(!f.model().is_feasible(&a, 1e-9));
    }

    #[test]
    fn test_distance_size_mismatch() {
        let inst = square(1);
        let dm = DistanceMatrix::new(2);
        let err = FormulationBuilder::new(&inst, &dm).build().unwrap_err();
        assert_eq!(err, FormulationError::DistanceSizeMismatch { matrix: 2, nodes: 4 });
    }

    #[test]
    fn test_builds_are_independent() {
        let inst = square(2);
        let dm = DistanceMatrix::from_nodes(inst.nodes());
        let builder = FormulationBuilder::new(&inst, &dm);
        let a = builder.build().expect("builds");
        let b = builder.build().expect("builds");
        assert_eq!(a.model(), b.model());
        assert_eq!(a.config(), FormulationConfig::default());
    }
}
