//! Error types shared across the crate.

use thiserror::Error;

use crate::solver::SolveStatus;

/// An instance that cannot be modeled, detected before any model is built.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InstanceError {
    #[error("instance has no nodes; the depot must be node 0")]
    MissingDepot,

    #[error("fleet size must be at least 1")]
    EmptyFleet,

    #[error("vehicle capacity must be positive and finite, got {0}")]
    InvalidCapacity(f64),

    #[error("node at position {position} has id {id}; ids must equal their position")]
    NodeIdMismatch { position: usize, id: usize },

    #[error("node {node}: field `{field}` is not a finite value")]
    NonFiniteValue { node: usize, field: &'static str },

    #[error("node {node}: field `{field}` must be non-negative, got {value}")]
    NegativeValue {
        node: usize,
        field: &'static str,
        value: f64,
    },

    #[error("depot must have zero demand, got {0}")]
    DepotHasDemand(f64),

    #[error("node {node}: time window [{ready}, {due}] is empty")]
    InvalidTimeWindow { node: usize, ready: f64, due: f64 },

    #[error("customer {node}: demand {demand} exceeds vehicle capacity {capacity}")]
    DemandExceedsCapacity {
        node: usize,
        demand: f64,
        capacity: f64,
    },

    #[error("node {node}: window [{ready}, {due}] is not covered by the depot window [{depot_ready}, {depot_due}]")]
    DepotWindowTooNarrow {
        node: usize,
        ready: f64,
        due: f64,
        depot_ready: f64,
        depot_due: f64,
    },

    #[error("customer {node}: earliest arrival {earliest} is after its due date {due}")]
    UnreachableCustomer { node: usize, earliest: f64, due: f64 },
}

/// Failure to read a Solomon instance file.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to read instance: {0}")]
    Io(#[from] std::io::Error),

    #[error("missing `{0}` section")]
    MissingSection(&'static str),

    #[error("no `fleet_size capacity` line after the VEHICLE marker")]
    MissingVehicleLine,

    #[error("line {line}: {reason}")]
    InvalidRow { line: usize, reason: String },

    #[error("{} is not a directory", .0.display())]
    NotADirectory(std::path::PathBuf),

    #[error("no node rows after the CUSTOMER marker")]
    NoCustomers,

    #[error(transparent)]
    Instance(#[from] InstanceError),
}

/// A structurally invalid optimization model.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormulationError {
    #[error("distance matrix has size {matrix}, instance has {nodes} nodes")]
    DistanceSizeMismatch { matrix: usize, nodes: usize },

    #[error("constraint `{constraint}` references unknown variable {var}")]
    UnknownVariable { constraint: String, var: usize },

    #[error("variable `{name}` has bounds [{lower}, {upper}]")]
    InvalidBounds { name: String, lower: f64, upper: f64 },

    #[error("constraint `{0}` has a non-finite coefficient")]
    NonFiniteCoefficient(String),
}

/// An assignment that violates an invariant the formulation guarantees.
///
/// These indicate a formulation or solver-adapter defect and are kept
/// distinct from [`SolveError::NoSolution`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExtractionError {
    #[error("assignment has {actual} values, the model has {expected} variables")]
    AssignmentSize { expected: usize, actual: usize },

    #[error("arc ({from}, {to}) of vehicle {vehicle} has fractional value {value}")]
    FractionalArc {
        vehicle: usize,
        from: usize,
        to: usize,
        value: f64,
    },

    #[error("vehicle {vehicle} leaves the depot {count} times")]
    MultipleDepartures { vehicle: usize, count: usize },

    #[error("route of vehicle {vehicle} stops at node {node} without returning to the depot")]
    RouteNotClosed { vehicle: usize, node: usize },

    #[error("route of vehicle {vehicle} branches at node {node}")]
    BranchingRoute { vehicle: usize, node: usize },

    #[error("route of vehicle {vehicle} revisits node {node}")]
    RepeatedNode { vehicle: usize, node: usize },

    #[error("customer {customer} is served by vehicles {first} and {second}")]
    DuplicateCustomer {
        customer: usize,
        first: usize,
        second: usize,
    },

    #[error("customer {customer} lies on a subtour of vehicle {vehicle} that does not touch the depot")]
    DetachedSubtour { vehicle: usize, customer: usize },

    #[error("customer {0} is not served by any route")]
    UncoveredCustomer(usize),

    #[error("extracted distance {extracted} differs from reported objective {reported}")]
    ObjectiveMismatch { extracted: f64, reported: f64 },

    #[error("extracted solution violates {} constraint(s): {}", .0.len(), .0.first().map(|v| v.to_string()).unwrap_or_default())]
    InvalidSolution(Vec<crate::models::Violation>),
}

/// Failure of a complete solve attempt.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SolveError {
    #[error("no solution found (solver status: {status:?})")]
    NoSolution { status: SolveStatus },

    #[error(transparent)]
    Formulation(#[from] FormulationError),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),
}
