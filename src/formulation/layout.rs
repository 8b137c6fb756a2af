//! Index arithmetic mapping CVRPTW variables to model positions.

use serde::{Deserialize, Serialize};

use super::VarId;

/// Position of every CVRPTW variable inside a [`MipModel`](super::MipModel).
///
/// Variables are laid out in blocks:
///
/// 1. `x[i,j,k]` for `k` in vehicles, `i` in nodes, `j ≠ i` in nodes;
/// 2. `load[i,k]` for `k`, `i`;
/// 3. `arrival[i,k]` for `k`, `i`;
/// 4. optionally `order[c,k]` for `k`, customers `c`.
///
/// The layout is pure arithmetic on `(nodes, vehicles)`, so any component
/// that knows the instance dimensions can address a model without access
/// to the builder.
///
/// # Examples
///
/// ```
/// use u_cvrptw::formulation::VarLayout;
///
/// let layout = VarLayout::new(4, 2, false);
/// assert_eq!(layout.num_arc_vars(), 4 * 3 * 2);
/// assert!(layout.arc(1, 1, 0).is_none());
/// assert_eq!(layout.num_variables(), 24 + 8 + 8);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VarLayout {
    num_nodes: usize,
    num_vehicles: usize,
    with_order: bool,
}

impl VarLayout {
    /// Creates the layout for `num_nodes` nodes (depot included) and
    /// `num_vehicles` vehicles.
    pub fn new(num_nodes: usize, num_vehicles: usize, with_order: bool) -> Self {
        Self {
            num_nodes,
            num_vehicles,
            with_order,
        }
    }

    /// Recovers the layout of a model with `num_variables` variables, if the
    /// count matches one of the two possible layouts.
    pub fn matching(num_nodes: usize, num_vehicles: usize, num_variables: usize) -> Option<Self> {
        [false, true]
            .into_iter()
            .map(|with_order| Self::new(num_nodes, num_vehicles, with_order))
            .find(|layout| layout.num_variables() == num_variables)
    }

    /// Number of nodes, depot included.
    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    /// Number of vehicles.
    pub fn num_vehicles(&self) -> usize {
        self.num_vehicles
    }

    /// Whether MTZ ordering variables are present.
    pub fn has_order(&self) -> bool {
        self.with_order
    }

    fn arcs_per_vehicle(&self) -> usize {
        self.num_nodes * self.num_nodes.saturating_sub(1)
    }

    /// Number of `x` variables.
    pub fn num_arc_vars(&self) -> usize {
        self.arcs_per_vehicle() * self.num_vehicles
    }

    fn node_block(&self) -> usize {
        self.num_nodes * self.num_vehicles
    }

    fn order_block(&self) -> usize {
        if self.with_order {
            self.num_nodes.saturating_sub(1) * self.num_vehicles
        } else {
            0
        }
    }

    /// Total number of variables.
    pub fn num_variables(&self) -> usize {
        self.num_arc_vars() + 2 * self.node_block() + self.order_block()
    }

    /// `x[i,j,k]`, or `None` for the self-loop `i == j`.
    ///
    /// # Panics
    ///
    /// Panics in debug builds if an index is out of range.
    pub fn arc(&self, i: usize, j: usize, k: usize) -> Option<VarId> {
        debug_assert!(i < self.num_nodes && j < self.num_nodes && k < self.num_vehicles);
        if i == j {
            return None;
        }
        let column = if j > i { j - 1 } else { j };
        let per_node = self.num_nodes - 1;
        Some(VarId(k * self.arcs_per_vehicle() + i * per_node + column))
    }

    /// `load[i,k]`.
    pub fn load(&self, i: usize, k: usize) -> VarId {
        debug_assert!(i < self.num_nodes && k < self.num_vehicles);
        VarId(self.num_arc_vars() + k * self.num_nodes + i)
    }

    /// `arrival[i,k]`.
    pub fn arrival(&self, i: usize, k: usize) -> VarId {
        debug_assert!(i < self.num_nodes && k < self.num_vehicles);
        VarId(self.num_arc_vars() + self.node_block() + k * self.num_nodes + i)
    }

    /// `order[c,k]` for a customer `c ≥ 1`, when ordering variables exist.
    pub fn order(&self, c: usize, k: usize) -> Option<VarId> {
        if !self.with_order || c == 0 {
            return None;
        }
        debug_assert!(c < self.num_nodes && k < self.num_vehicles);
        let per_vehicle = self.num_nodes - 1;
        Some(VarId(
            self.num_arc_vars() + 2 * self.node_block() + k * per_vehicle + (c - 1),
        ))
    }

    /// All arcs `(i, j)` with `i ≠ j`, in layout order.
    pub fn arcs(&self) -> impl Iterator<Item = (usize, usize)> {
        let n = self.num_nodes;
        (0..n).flat_map(move |i| (0..n).filter(move |&j| j != i).map(move |j| (i, j)))
    }
}
