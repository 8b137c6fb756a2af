//! Validated routing instance.

use serde::Serialize;

use super::{Node, TimeWindow, VehicleFleet};
use crate::error::InstanceError;

/// An immutable CVRPTW instance: nodes (depot first) and a vehicle fleet.
///
/// All structural feasibility checks run in [`ProblemInstance::new`], so an
/// instance that exists is one the formulation can be built for.
///
/// # Examples
///
/// ```
/// use u_cvrptw::models::{Node, ProblemInstance, TimeWindow, VehicleFleet};
///
/// let tw = TimeWindow::new(0.0, 100.0).unwrap();
/// let nodes = vec![
///     Node::depot(0.0, 0.0, 100.0),
///     Node::new(1, 3.0, 4.0, 10.0, tw, 5.0),
///     Node::new(2, 6.0, 8.0, 20.0, tw, 5.0),
/// ];
/// let instance = ProblemInstance::new(nodes, VehicleFleet::new(2, 30.0)).unwrap();
/// assert_eq!(instance.num_customers(), 2);
/// assert_eq!(instance.total_demand(), 30.0);
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct ProblemInstance {
    nodes: Vec<Node>,
    fleet: VehicleFleet,
}

impl ProblemInstance {
    /// Creates and validates an instance.
    ///
    /// # Errors
    ///
    /// Returns an [`InstanceError`] if the fleet is empty or has no usable
    /// capacity, if node data is malformed, if a customer's demand exceeds
    /// the capacity, if the depot window does not cover every other window,
    /// or if a customer cannot be reached from the depot before its due date.
    pub fn new(nodes: Vec<Node>, fleet: VehicleFleet) -> Result<Self, InstanceError> {
        let instance = Self { nodes, fleet };
        instance.validate()?;
        Ok(instance)
    }

    fn validate(&self) -> Result<(), InstanceError> {
        if self.fleet.size() == 0 {
            return Err(InstanceError::EmptyFleet);
        }
        let capacity = self.fleet.capacity();
        if !capacity.is_finite() || capacity <= 0.0 {
            return Err(InstanceError::InvalidCapacity(capacity));
        }
        let depot = self.nodes.first().ok_or(InstanceError::MissingDepot)?;

        for (position, node) in self.nodes.iter().enumerate() {
            if node.id() != position {
                return Err(InstanceError::NodeIdMismatch {
                    position,
                    id: node.id(),
                });
            }
            let fields = [
                ("x", node.x()),
                ("y", node.y()),
                ("demand", node.demand()),
                ("service_time", node.service_time()),
            ];
            for (field, value) in fields {
                if !value.is_finite() {
                    return Err(InstanceError::NonFiniteValue {
                        node: position,
                        field,
                    });
                }
            }
            for (field, value) in [("demand", node.demand()), ("service_time", node.service_time())] {
                if value < 0.0 {
                    return Err(InstanceError::NegativeValue {
                        node: position,
                        field,
                        value,
                    });
                }
            }
            let tw = node.time_window();
            if TimeWindow::new(tw.ready(), tw.due()).is_none() {
                return Err(InstanceError::InvalidTimeWindow {
                    node: position,
                    ready: tw.ready(),
                    due: tw.due(),
                });
            }
        }

        if depot.demand() != 0.0 {
            return Err(InstanceError::DepotHasDemand(depot.demand()));
        }

        let depot_window = depot.time_window();
        for customer in self.customers() {
            if customer.demand() > capacity {
                return Err(InstanceError::DemandExceedsCapacity {
                    node: customer.id(),
                    demand: customer.demand(),
                    capacity,
                });
            }
            if !depot_window.covers(customer.time_window()) {
                return Err(InstanceError::DepotWindowTooNarrow {
                    node: customer.id(),
                    ready: customer.ready_time(),
                    due: customer.due_date(),
                    depot_ready: depot_window.ready(),
                    depot_due: depot_window.due(),
                });
            }
            let earliest =
                depot.ready_time() + depot.service_time() + depot.distance_to(customer);
            if earliest > customer.due_date() {
                return Err(InstanceError::UnreachableCustomer {
                    node: customer.id(),
                    earliest,
                    due: customer.due_date(),
                });
            }
        }
        Ok(())
    }

    /// All nodes, depot first.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// The depot (node 0).
    pub fn depot(&self) -> &Node {
        &self.nodes[0]
    }

    /// Customer nodes (everything except the depot).
    pub fn customers(&self) -> &[Node] {
        &self.nodes[1..]
    }

    /// Node by id.
    ///
    /// # Panics
    ///
    /// Panics if `id` is out of range.
    pub fn node(&self, id: usize) -> &Node {
        &self.nodes[id]
    }

    /// Number of nodes including the depot.
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Number of customers (excluding the depot).
    pub fn num_customers(&self) -> usize {
        self.nodes.len() - 1
    }

    /// The vehicle fleet.
    pub fn fleet(&self) -> &VehicleFleet {
        &self.fleet
    }

    /// Vehicle capacity.
    pub fn capacity(&self) -> f64 {
        self.fleet.capacity()
    }

    /// Number of available vehicles.
    pub fn fleet_size(&self) -> usize {
        self.fleet.size()
    }

    /// Latest due date over all nodes.
    pub fn max_due_date(&self) -> f64 {
        self.nodes
            .iter()
            .map(Node::due_date)
            .fold(f64::NEG_INFINITY, f64::max)
    }

    /// Sum of all customer demands.
    pub fn total_demand(&self) -> f64 {
        self.customers().iter().map(Node::demand).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(ready: f64, due: f64) -> TimeWindow {
        TimeWindow::new(ready, due).expect("valid")
    }

    fn nodes() -> Vec<Node> {
        vec![
            Node::depot(0.0, 0.0, 100.0),
            Node::new(1, 3.0, 4.0, 10.0, window(0.0, 50.0), 5.0),
            Node::new(2, 6.0, 8.0, 20.0, window(10.0, 100.0), 5.0),
        ]
    }

    #[test]
    fn test_valid_instance() {
        let inst = ProblemInstance::new(nodes(), VehicleFleet::new(2, 30.0)).expect("valid");
        assert_eq!(inst.num_nodes(), 3);
        assert_eq!(inst.num_customers(), 2);
        assert_eq!(inst.fleet_size(), 2);
        assert_eq!(inst.capacity(), 30.0);
        assert_eq!(inst.max_due_date(), 100.0);
        assert_eq!(inst.total_demand(), 30.0);
        assert_eq!(inst.depot().id(), 0);
        assert_eq!(inst.node(2).demand(), 20.0);
    }

    #[test]
    fn test_depot_covers_horizon() {
        let inst = ProblemInstance::new(nodes(), VehicleFleet::new(1, 30.0)).expect("valid");
        assert_eq!(inst.depot().demand(), 0.0);
        assert_eq!(inst.depot().ready_time(), 0.0);
        assert!(inst.depot().due_date() >= inst.max_due_date());
    }

    #[test]
    fn test_empty_fleet() {
        let err = ProblemInstance::new(nodes(), VehicleFleet::new(0, 30.0)).unwrap_err();
        assert_eq!(err, InstanceError::EmptyFleet);
    }

    #[test]
    fn test_invalid_capacity() {
        let err = ProblemInstance::new(nodes(), VehicleFleet::new(1, 0.0)).unwrap_err();
        assert_eq!(err, InstanceError::InvalidCapacity(0.0));
        let err = ProblemInstance::new(nodes(), VehicleFleet::new(1, f64::NAN)).unwrap_err();
        assert!(matches!(err, InstanceError::InvalidCapacity(_)));
    }

    #[test]
    fn test_missing_depot() {
        let err = ProblemInstance::new(vec![], VehicleFleet::new(1, 10.0)).unwrap_err();
        assert_eq!(err, InstanceError::MissingDepot);
    }

    #[test]
    fn test_demand_exceeds_capacity() {
        let err = ProblemInstance::new(nodes(), VehicleFleet::new(3, 15.0)).unwrap_err();
        assert!(matches!(
            err,
            InstanceError::DemandExceedsCapacity { node: 2, .. }
        ));
    }

    #[test]
    fn test_depot_with_demand() {
        let mut n = nodes();
        n[0] = Node::new(0, 0.0, 0.0, 1.0, window(0.0, 100.0), 0.0);
        let err = ProblemInstance::new(n, VehicleFleet::new(1, 30.0)).unwrap_err();
        assert_eq!(err, InstanceError::DepotHasDemand(1.0));
    }

    #[test]
    fn test_depot_window_too_narrow() {
        let mut n = nodes();
        n[0] = Node::depot(0.0, 0.0, 80.0);
        let err = ProblemInstance::new(n, VehicleFleet::new(1, 30.0)).unwrap_err();
        assert!(matches!(
            err,
            InstanceError::DepotWindowTooNarrow { node: 2, .. }
        ));
    }

    #[test]
    fn test_unreachable_customer() {
        let mut n = nodes();
        // depot -> 1 takes 5.0, window closes at 3.0
        n[1] = Node::new(1, 3.0, 4.0, 10.0, window(0.0, 3.0), 5.0);
        let err = ProblemInstance::new(n, VehicleFleet::new(1, 30.0)).unwrap_err();
        assert_eq!(
            err,
            InstanceError::UnreachableCustomer {
                node: 1,
                earliest: 5.0,
                due: 3.0
            }
        );
    }

    #[test]
    fn test_id_mismatch() {
        let mut n = nodes();
        n.swap(1, 2);
        let err = ProblemInstance::new(n, VehicleFleet::new(1, 30.0)).unwrap_err();
        assert_eq!(err, InstanceError::NodeIdMismatch { position: 1, id: 2 });
    }

    #[test]
    fn test_negative_and_non_finite() {
        let mut n = nodes();
        n[1] = Node::new(1, 3.0, 4.0, -1.0, window(0.0, 50.0), 5.0);
        let err = ProblemInstance::new(n, VehicleFleet::new(1, 30.0)).unwrap_err();
        assert!(matches!(
            err,
            InstanceError::NegativeValue { node: 1, field: "demand", .. }
        ));

        let mut n = nodes();
        n[2] = Node::new(2, f64::NAN, 8.0, 1.0, window(0.0, 50.0), 5.0);
        let err = ProblemInstance::new(n, VehicleFleet::new(1, 30.0)).unwrap_err();
        assert_eq!(err, InstanceError::NonFiniteValue { node: 2, field: "x" });
    }

    #[test]
    fn test_depot_only() {
        let inst = ProblemInstance::new(vec![Node::depot(0.0, 0.0, 10.0)], VehicleFleet::new(1, 1.0))
            .expect("valid");
        assert_eq!(inst.num_customers(), 0);
        assert!(inst.customers().is_empty());
        assert_eq!(inst.total_demand(), 0.0);
    }
}
