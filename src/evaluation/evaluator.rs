//! Route evaluator that computes timing, load and feasibility.

use crate::distance::DistanceMatrix;
use crate::models::{ProblemInstance, Route, Solution, Violation, ViolationType, Visit};

const EPS: f64 = 1e-6;

/// Evaluates routes against an instance, independently of the model.
///
/// [`build_route`](Self::build_route) computes the earliest schedule of a
/// customer sequence; [`check_solution`](Self::check_solution) verifies an
/// extracted [`Solution`] (coverage, capacity, windows, schedule
/// consistency, fleet size).
///
/// In both cases the two depot entries of a route carry the vehicle's
/// departure time, matching the single `arrival[depot,k]` variable.
///
/// # Examples
///
/// ```
/// use u_cvrptw::distance::DistanceMatrix;
/// use u_cvrptw::evaluation::RouteEvaluator;
/// use u_cvrptw::models::{Node, ProblemInstance, TimeWindow, VehicleFleet};
///
/// let tw = TimeWindow::new(0.0, 100.0).unwrap();
/// let nodes = vec![
///     Node::depot(0.0, 0.0, 100.0),
///     Node::new(1, 3.0, 4.0, 10.0, tw, 5.0),
///     Node::new(2, 6.0, 8.0, 20.0, tw, 5.0),
/// ];
/// let instance = ProblemInstance::new(nodes, VehicleFleet::new(1, 100.0)).unwrap();
/// let dm = DistanceMatrix::from_nodes(instance.nodes());
///
/// let evaluator = RouteEvaluator::new(&instance, &dm);
/// let (route, violations) = evaluator.build_route(0, &[1, 2]);
/// assert_eq!(route.node_ids(), vec![0, 1, 2, 0]);
/// assert!(violations.is_empty());
/// ```
pub struct RouteEvaluator<'a> {
    instance: &'a ProblemInstance,
    distances: &'a DistanceMatrix,
}

impl<'a> RouteEvaluator<'a> {
    /// Creates a new evaluator for the given instance.
    pub fn new(instance: &'a ProblemInstance, distances: &'a DistanceMatrix) -> Self {
        Self {
            instance,
            distances,
        }
    }

    /// Builds the earliest-start schedule of `depot → customers… → depot`.
    ///
    /// Returns the route and any capacity or time-window violations.
    pub fn build_route(&self, vehicle_id: usize, customer_ids: &[usize]) -> (Route, Vec<Violation>) {
        let mut route = Route::new(vehicle_id);
        let mut violations = Vec::new();
        let depot = self.instance.depot();
        let departure = depot.ready_time();
        let mut time = departure;
        let mut load = 0.0;
        let mut prev = 0;

        route.push_visit(Visit {
            node_id: 0,
            arrival_time: departure,
            load_after: 0.0,
        });

        for &cid in customer_ids {
            let prev_node = self.instance.node(prev);
            let customer = self.instance.node(cid);
            let earliest = time + prev_node.service_time() + self.distances.get(prev, cid);
            let arrival = earliest.max(customer.ready_time());
            if customer.time_window().is_violated(arrival) {
                violations.push(Violation::new(ViolationType::TimeWindowViolated {
                    node_id: cid,
                    arrival,
                    due: customer.due_date(),
                }));
            }
            load += customer.demand();
            route.push_visit(Visit {
                node_id: cid,
                arrival_time: arrival,
                load_after: load,
            });
            time = arrival;
            prev = cid;
        }

        route.push_visit(Visit {
            node_id: 0,
            arrival_time: departure,
            load_after: load,
        });
        let ids = route.node_ids();
        route.set_total_distance(self.distances.path_length(&ids));

        if load > self.instance.capacity() + EPS {
            violations.push(Violation::new(ViolationType::CapacityExceeded {
                vehicle_id,
                load,
                capacity: self.instance.capacity(),
            }));
        }

        (route, violations)
    }

    /// Checks an extracted solution against the instance.
    pub fn check_solution(&self, solution: &Solution) -> Vec<Violation> {
        let mut violations = Vec::new();
        let fleet_size = self.instance.fleet_size();
        let mut served = vec![0usize; self.instance.num_nodes()];

        if solution.num_routes() > fleet_size {
            violations.push(Violation::new(ViolationType::FleetExceeded {
                vehicle_id: solution.num_routes(),
                fleet_size,
            }));
        }

        for route in solution.routes() {
            let vehicle_id = route.vehicle_id();
            if vehicle_id >= fleet_size {
                violations.push(Violation::new(ViolationType::FleetExceeded {
                    vehicle_id,
                    fleet_size,
                }));
            }
            if !route.is_closed() {
                violations.push(Violation::new(ViolationType::RouteNotClosed { vehicle_id }));
            }
            let mut load = 0.0;
            for visit in route.customer_visits() {
                if let Some(count) = served.get_mut(visit.node_id) {
                    *count += 1;
                }
                load += self.instance.node(visit.node_id).demand();
            }
            if load > self.instance.capacity() + EPS {
                violations.push(Violation::new(ViolationType::CapacityExceeded {
                    vehicle_id,
                    load,
                    capacity: self.instance.capacity(),
                }));
            }
            self.check_schedule(route, &mut violations);
        }

        for (customer_id, &count) in served.iter().enumerate().skip(1) {
            match count {
                0 => violations.push(Violation::new(ViolationType::MissingCustomer { customer_id })),
                1 => {}
                _ => violations.push(Violation::new(ViolationType::DuplicateCustomer { customer_id })),
            }
        }

        violations
    }

    fn check_schedule(&self, route: &Route, violations: &mut Vec<Violation>) {
        let visits = route.visits();
        for visit in visits {
            let node = self.instance.node(visit.node_id);
            if visit.arrival_time < node.ready_time() - EPS {
                violations.push(Violation::new(ViolationType::EarlyArrival {
                    node_id: visit.node_id,
                    arrival: visit.arrival_time,
                    ready: node.ready_time(),
                }));
            }
            if visit.arrival_time > node.due_date() + EPS {
                violations.push(Violation::new(ViolationType::TimeWindowViolated {
                    node_id: visit.node_id,
                    arrival: visit.arrival_time,
                    due: node.due_date(),
                }));
            }
        }
        // the return leg is not time-constrained
        for pair in visits.windows(2).filter(|w| w[1].node_id != 0) {
            let (prev, next) = (&pair[0], &pair[1]);
            let earliest = prev.arrival_time
                + self.instance.node(prev.node_id).service_time()
                + self.distances.get(prev.node_id, next.node_id);
            if next.arrival_time < earliest - EPS {
                violations.push(Violation::new(ViolationType::InconsistentSchedule {
                    vehicle_id: route.vehicle_id(),
                    node_id: next.node_id,
                    arrival: next.arrival_time,
                    earliest,
                }));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Node, TimeWindow, VehicleFleet};
    use crate::solver::SolveStatus;

    fn window(ready: f64, due: f64) -> TimeWindow {
        TimeWindow::new(ready, due).expect("valid")
    }

    fn setup(capacity: f64) -> (ProblemInstance, DistanceMatrix) {
        let tw = window(0.0, 200.0);
        let nodes = vec![
            Node::depot(0.0, 0.0, 200.0),
            Node::new(1, 3.0, 4.0, 10.0, tw, 5.0),
            Node::new(2, 6.0, 8.0, 20.0, tw, 5.0),
            Node::new(3, 0.0, 10.0, 15.0, window(50.0, 200.0), 5.0),
        ];
        let inst = ProblemInstance::new(nodes, VehicleFleet::new(2, capacity)).expect("valid");
        let dm = DistanceMatrix::from_nodes(inst.nodes());
        (inst, dm)
    }

    #[test]
    fn test_build_route_single() {
        let (inst, dm) = setup(50.0);
        let eval = RouteEvaluator::new(&inst, &dm);
        let (route, violations) = eval.build_route(0, &[1]);
        assert!(violations.is_empty());
        assert_eq!(route.node_ids(), vec![0, 1, 0]);
        assert!((route.total_distance() - 10.0).abs() < 1e-10);
        assert_eq!(route.total_load(), 10.0);
    }

    #[test]
    fn test_build_route_waits_for_window() {
        let (inst, dm) = setup(50.0);
        let eval = RouteEvaluator::new(&inst, &dm);
        let (route, violations) = eval.build_route(0, &[1, 3]);
        assert!(violations.is_empty());
        // arrival at 1 = 5, leave at 10, reach 3 at ~16.7, wait until 50
        assert_eq!(route.arrival_times(), vec![0.0, 5.0, 50.0, 0.0]);
    }

    #[test]
    fn test_build_route_timing_chain() {
        let (inst, dm) = setup(50.0);
        let eval = RouteEvaluator::new(&inst, &dm);
        let (route, _) = eval.build_route(0, &[1, 2]);
        let v = route.visits();
        let expected = v[1].arrival_time + 5.0 + dm.get(1, 2);
        assert!((v[2].arrival_time - expected).abs() < 1e-10);
    }

    #[test]
    fn test_build_route_capacity_violated() {
        let (inst, dm) = setup(25.0);
        let eval = RouteEvaluator::new(&inst, &dm);
        let (_, violations) = eval.build_route(1, &[1, 2]);
        assert_eq!(violations.len(), 1);
        assert!(matches!(
            violations[0].kind,
            ViolationType::CapacityExceeded { vehicle_id: 1, .. }
        ));
    }

    #[test]
    fn test_check_valid_solution() {
        let (inst, dm) = setup(50.0);
        let eval = RouteEvaluator::new(&inst, &dm);
        let (r0, _) = eval.build_route(0, &[1, 3]);
        let (r1, _) = eval.build_route(1, &[2]);
        let total = r0.total_distance() + r1.total_distance();
        let sol = Solution::new(SolveStatus::Optimal, total, vec![r0, r1]);
        assert!(eval.check_solution(&sol).is_empty());
    }

    #[test]
    fn test_check_missing_and_duplicate() {
        let (inst, dm) = setup(50.0);
        let eval = RouteEvaluator::new(&inst, &dm);
        let (r0, _) = eval.build_route(0, &[1]);
        let (r1, _) = eval.build_route(1, &[1, 2]);
        let sol = Solution::new(SolveStatus::Feasible, 0.0, vec![r0, r1]);
        let violations = eval.check_solution(&sol);
        assert!(violations.contains(&Violation::new(ViolationType::DuplicateCustomer {
            customer_id: 1
        })));
        assert!(violations.contains(&Violation::new(ViolationType::MissingCustomer {
            customer_id: 3
        })));
    }

    #[test]
    fn test_check_inconsistent_schedule() {
        let (inst, dm) = setup(50.0);
        let eval = RouteEvaluator::new(&inst, &dm);
        let mut route = Route::new(0);
        for (node_id, arrival_time) in [(0, 0.0), (1, 5.0), (2, 6.0), (3, 60.0), (0, 0.0)] {
            route.push_visit(Visit {
                node_id,
                arrival_time,
                load_after: 0.0,
            });
        }
        let sol = Solution::new(SolveStatus::Optimal, 0.0, vec![route]);
        let violations = eval.check_solution(&sol);
        assert_eq!(violations.len(), 1);
        assert!(matches!(
            violations[0].kind,
            ViolationType::InconsistentSchedule { node_id: 2, .. }
        ));
    }

    #[test]
    fn test_check_fleet_and_windows() {
        let (inst, dm) = setup(50.0);
        let eval = RouteEvaluator::new(&inst, &dm);
        let mut route = Route::new(5);
        for (node_id, arrival_time) in [(0, 0.0), (3, 40.0), (1, 250.0), (2, 270.0), (0, 0.0)] {
            route.push_visit(Visit {
                node_id,
                arrival_time,
                load_after: 0.0,
            });
        }
        let sol = Solution::new(SolveStatus::Optimal, 0.0, vec![route]);
        let violations = eval.check_solution(&sol);
        assert!(violations
            .iter()
            .any(|v| matches!(v.kind, ViolationType::FleetExceeded { vehicle_id: 5, .. })));
        assert!(violations
            .iter()
            .any(|v| matches!(v.kind, ViolationType::EarlyArrival { node_id: 3, .. })));
        assert!(violations
            .iter()
            .any(|v| matches!(v.kind, ViolationType::TimeWindowViolated { node_id: 1, .. })));
    }
}
