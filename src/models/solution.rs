//! Solution and violation types.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::Route;
use crate::solver::SolveStatus;

/// A kind of constraint violation found in an extracted solution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ViolationType {
    /// Route does not start and end at the depot.
    RouteNotClosed {
        /// Vehicle driving the route.
        vehicle_id: usize,
    },
    /// Customer served by no route.
    MissingCustomer {
        /// Customer id.
        customer_id: usize,
    },
    /// Customer served more than once.
    DuplicateCustomer {
        /// Customer id.
        customer_id: usize,
    },
    /// Route load above vehicle capacity.
    CapacityExceeded {
        /// Vehicle driving the route.
        vehicle_id: usize,
        /// Load of the route.
        load: f64,
        /// Vehicle capacity.
        capacity: f64,
    },
    /// Service starts before the window opens.
    EarlyArrival {
        /// Node id.
        node_id: usize,
        /// Recorded arrival time.
        arrival: f64,
        /// Window opening.
        ready: f64,
    },
    /// Service starts after the window closes.
    TimeWindowViolated {
        /// Node id.
        node_id: usize,
        /// Recorded arrival time.
        arrival: f64,
        /// Window closing.
        due: f64,
    },
    /// Arrival earlier than the predecessor's service and travel allow.
    InconsistentSchedule {
        /// Vehicle driving the route.
        vehicle_id: usize,
        /// Node whose arrival is too early.
        node_id: usize,
        /// Recorded arrival time.
        arrival: f64,
        /// Earliest arrival implied by the predecessor.
        earliest: f64,
    },
    /// More routes (or a vehicle id) than the fleet provides.
    FleetExceeded {
        /// Offending vehicle id or route count.
        vehicle_id: usize,
        /// Fleet size.
        fleet_size: usize,
    },
}

/// A constraint violation in a solution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    /// The type of violation.
    pub kind: ViolationType,
}

impl Violation {
    /// Creates a new violation.
    pub fn new(kind: ViolationType) -> Self {
        Self { kind }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ViolationType::RouteNotClosed { vehicle_id } => {
                write!(f, "route of vehicle {vehicle_id} is not closed at the depot")
            }
            ViolationType::MissingCustomer { customer_id } => {
                write!(f, "customer {customer_id} is not served")
            }
            ViolationType::DuplicateCustomer { customer_id } => {
                write!(f, "customer {customer_id} is served more than once")
            }
            ViolationType::CapacityExceeded {
                vehicle_id,
                load,
                capacity,
            } => write!(
                f,
                "vehicle {vehicle_id} carries {load}, capacity is {capacity}"
            ),
            ViolationType::EarlyArrival {
                node_id,
                arrival,
                ready,
            } => write!(f, "node {node_id} served at {arrival}, before {ready}"),
            ViolationType::TimeWindowViolated {
                node_id,
                arrival,
                due,
            } => write!(f, "node {node_id} served at {arrival}, after {due}"),
            ViolationType::InconsistentSchedule {
                vehicle_id,
                node_id,
                arrival,
                earliest,
            } => write!(
                f,
                "vehicle {vehicle_id} reaches node {node_id} at {arrival}, earliest possible is {earliest}"
            ),
            ViolationType::FleetExceeded {
                vehicle_id,
                fleet_size,
            } => write!(f, "vehicle {vehicle_id} exceeds fleet of {fleet_size}"),
        }
    }
}

/// Routes reconstructed from a solver assignment.
///
/// Only vehicles that leave the depot have a route; routes are ordered by
/// vehicle id.
///
/// # Examples
///
/// ```
/// use u_cvrptw::models::{Route, Solution};
/// use u_cvrptw::solver::SolveStatus;
///
/// let sol = Solution::new(SolveStatus::Optimal, 0.0, Vec::<Route>::new());
/// assert!(sol.is_optimal());
/// assert_eq!(sol.num_routes(), 0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Solution {
    status: SolveStatus,
    objective_value: f64,
    routes: Vec<Route>,
}

impl Solution {
    /// Creates a solution from extracted routes.
    pub fn new(status: SolveStatus, objective_value: f64, routes: Vec<Route>) -> Self {
        Self {
            status,
            objective_value,
            routes,
        }
    }

    /// Status reported by the solver (`Optimal` or `Feasible`).
    pub fn status(&self) -> SolveStatus {
        self.status
    }

    /// Returns `true` if the solver proved optimality.
    pub fn is_optimal(&self) -> bool {
        self.status == SolveStatus::Optimal
    }

    /// Objective value reported by the solver.
    pub fn objective_value(&self) -> f64 {
        self.objective_value
    }

    /// Routes of used vehicles.
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Route of the given vehicle, if it is used.
    pub fn route_of(&self, vehicle_id: usize) -> Option<&Route> {
        self.routes.iter().find(|r| r.vehicle_id() == vehicle_id)
    }

    /// Number of routes (vehicles used).
    pub fn num_routes(&self) -> usize {
        self.routes.len()
    }

    /// Total travelled distance across all routes.
    pub fn total_distance(&self) -> f64 {
        self.routes.iter().map(|r| r.total_distance()).sum()
    }

    /// Total number of customers served.
    pub fn num_served(&self) -> usize {
        self.routes.iter().map(|r| r.customer_ids().len()).sum()
    }

    /// Serializes the solution for external sinks (plotting, persistence).
    #[cfg(feature = "json")]
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Visit;

    fn route(vehicle_id: usize, customers: &[usize], distance: f64) -> Route {
        let mut r = Route::new(vehicle_id);
        r.push_visit(Visit {
            node_id: 0,
            arrival_time: 0.0,
            load_after: 0.0,
        });
        for (i, &c) in customers.iter().enumerate() {
            r.push_visit(Visit {
                node_id: c,
                arrival_time: (i + 1) as f64,
                load_after: (i + 1) as f64,
            });
        }
        r.push_visit(Visit {
            node_id: 0,
            arrival_time: 0.0,
            load_after: customers.len() as f64,
        });
        r.set_total_distance(distance);
        r
    }

    #[test]
    fn test_solution_with_routes() {
        let sol = Solution::new(
            SolveStatus::Feasible,
            130.0,
            vec![route(0, &[1], 50.0), route(2, &[2, 3], 80.0)],
        );
        assert!(!sol.is_optimal());
        assert_eq!(sol.status(), SolveStatus::Feasible);
        assert_eq!(sol.num_routes(), 2);
        assert_eq!(sol.num_served(), 3);
        assert!((sol.total_distance() - 130.0).abs() < 1e-10);
        assert_eq!(sol.route_of(2).map(|r| r.customer_ids()), Some(vec![2, 3]));
        assert!(sol.route_of(1).is_none());
    }

    #[test]
    fn test_violation_display() {
        let v = Violation::new(ViolationType::CapacityExceeded {
            vehicle_id: 0,
            load: 250.0,
            capacity: 200.0,
        });
        assert_eq!(v.to_string(), "vehicle 0 carries 250, capacity is 200");
    }

    #[test]
    fn test_solution_serializes() {
        let sol = Solution::new(SolveStatus::Optimal, 10.0, vec![route(0, &[1], 10.0)]);
        let json = serde_json::to_string(&sol).expect("serializable");
        assert!(json.contains("\"Optimal\""));
        let back: Solution = serde_json::from_str(&json).expect("deserializable");
        assert_eq!(back, sol);
    }

    #[cfg(feature = "json")]
    #[test]
    fn test_to_json_export() {
        let sol = Solution::new(
            SolveStatus::Optimal,
            80.0,
            vec![route(0, &[1], 30.0), route(1, &[2, 3], 50.0)],
        );
        let json = sol.to_json().expect("serializable");
        assert!(json.contains('\n'));
        assert!(json.contains("\"routes\""));
        assert!(json.contains("\"objective_value\""));
        let back: Solution = serde_json::from_str(&json).expect("deserializable");
        assert_eq!(back, sol);
        assert_eq!(back.route_of(1).map(|r| r.customer_ids()), Some(vec![2, 3]));
    }
}
