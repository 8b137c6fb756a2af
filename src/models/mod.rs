//! Domain model types for the CVRPTW.
//!
//! Nodes with demands and time windows, a homogeneous vehicle fleet, the
//! validated problem instance, and the routes and solutions reconstructed
//! from a solver assignment.

mod fleet;
mod instance;
mod node;
mod route;
mod solution;

pub use fleet::VehicleFleet;
pub use instance::ProblemInstance;
pub use node::{Node, TimeWindow};
pub use route::{Route, Visit};
pub use solution::{Solution, Violation, ViolationType};
