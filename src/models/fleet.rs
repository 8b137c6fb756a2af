//! Homogeneous vehicle fleet.

use serde::{Deserialize, Serialize};

/// A fleet of identical vehicles sharing one depot.
///
/// Vehicles are optional: a solution may leave some of them idle.
///
/// # Examples
///
/// ```
/// use u_cvrptw::models::VehicleFleet;
///
/// let fleet = VehicleFleet::new(25, 200.0);
/// assert_eq!(fleet.size(), 25);
/// assert_eq!(fleet.capacity(), 200.0);
/// assert_eq!(fleet.vehicle_ids().count(), 25);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VehicleFleet {
    size: usize,
    capacity: f64,
}

impl VehicleFleet {
    /// Creates a fleet of `size` vehicles with the given capacity.
    ///
    /// Validity (`size ≥ 1`, positive capacity) is checked when the fleet
    /// is attached to a [`ProblemInstance`](super::ProblemInstance).
    pub fn new(size: usize, capacity: f64) -> Self {
        Self { size, capacity }
    }

    /// Number of vehicles.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Capacity of every vehicle.
    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    /// Vehicle indices `0..size`.
    pub fn vehicle_ids(&self) -> std::ops::Range<usize> {
        0..self.size
    }
}
