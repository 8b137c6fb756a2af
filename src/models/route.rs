//! Route and visit types.

use serde::{Deserialize, Serialize};

/// A single stop of a route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Visit {
    /// Node visited (0 = depot).
    pub node_id: usize,
    /// Service start read from the solver's arrival-time variable.
    pub arrival_time: f64,
    /// Cumulative load after serving this node.
    pub load_after: f64,
}

/// A closed tour of one vehicle: `depot → c1 → … → cm → depot`.
///
/// Unlike a customer-only sequence, the depot is stored at both ends so
/// that `node_ids()` and `arrival_times()` can be consumed as parallel
/// sequences.
///
/// # Examples
///
/// ```
/// use u_cvrptw::models::{Route, Visit};
///
/// let mut route = Route::new(0);
/// route.push_visit(Visit { node_id: 0, arrival_time: 0.0, load_after: 0.0 });
/// route.push_visit(Visit { node_id: 3, arrival_time: 10.0, load_after: 4.0 });
/// route.push_visit(Visit { node_id: 0, arrival_time: 0.0, load_after: 4.0 });
/// assert_eq!(route.node_ids(), vec![0, 3, 0]);
/// assert_eq!(route.customer_ids(), vec![3]);
/// assert!(route.is_closed());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    vehicle_id: usize,
    visits: Vec<Visit>,
    total_distance: f64,
    total_load: f64,
}

impl Route {
    /// Creates an empty route for the given vehicle.
    pub fn new(vehicle_id: usize) -> Self {
        Self {
            vehicle_id,
            visits: Vec::new(),
            total_distance: 0.0,
            total_load: 0.0,
        }
    }

    /// Appends a stop to the end of this route.
    pub fn push_visit(&mut self, visit: Visit) {
        self.total_load = visit.load_after;
        self.visits.push(visit);
    }

    /// Vehicle driving this route.
    pub fn vehicle_id(&self) -> usize {
        self.vehicle_id
    }

    /// All stops in order, depot at both ends.
    pub fn visits(&self) -> &[Visit] {
        &self.visits
    }

    /// Number of stops including both depot visits.
    pub fn len(&self) -> usize {
        self.visits.len()
    }

    /// Returns `true` if this route has no stops.
    pub fn is_empty(&self) -> bool {
        self.visits.is_empty()
    }

    /// Node ids in visit order, depot at both ends.
    pub fn node_ids(&self) -> Vec<usize> {
        self.visits.iter().map(|v| v.node_id).collect()
    }

    /// Arrival times parallel to [`node_ids`](Self::node_ids).
    pub fn arrival_times(&self) -> Vec<f64> {
        self.visits.iter().map(|v| v.arrival_time).collect()
    }

    /// Customer ids in visit order (depot stripped).
    pub fn customer_ids(&self) -> Vec<usize> {
        self.visits
            .iter()
            .map(|v| v.node_id)
            .filter(|&id| id != 0)
            .collect()
    }

    /// Customer stops in visit order (depot stripped).
    pub fn customer_visits(&self) -> impl Iterator<Item = &Visit> {
        self.visits.iter().filter(|v| v.node_id != 0)
    }

    /// Returns `true` if the route starts and ends at the depot and serves
    /// at least one customer.
    pub fn is_closed(&self) -> bool {
        self.visits.len() > 2
            && self.visits.first().map(|v| v.node_id) == Some(0)
            && self.visits.last().map(|v| v.node_id) == Some(0)
    }

    /// Travelled distance of this route.
    pub fn total_distance(&self) -> f64 {
        self.total_distance
    }

    /// Total load delivered by this route.
    pub fn total_load(&self) -> f64 {
        self.total_load
    }

    /// Sets the travelled distance (used by the extractor).
    pub fn set_total_distance(&mut self, d: f64) {
        self.total_distance = d;
    }
}
