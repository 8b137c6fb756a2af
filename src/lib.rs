//! # u-cvrptw
//!
//! Exact modeling of the capacitated vehicle routing problem with time
//! windows (CVRPTW) as a mixed-integer linear program.
//!
//! An instance is turned into an arc-based three-index formulation with
//! big-M load and time propagation, handed to any [`solver::MipSolver`]
//! backend, and the returned assignment is read back into closed routes
//! with their schedules.
//!
//! ## Modules
//!
//! - [`models`] — Domain model types (Node, TimeWindow, VehicleFleet, ProblemInstance, Route, Solution)
//! - [`distance`] — Euclidean distance matrix
//! - [`formulation`] — MIP model layer and the CVRPTW formulation builder
//! - [`solver`] — Solver boundary and an exact route enumeration backend
//! - [`extraction`] — Assignment → routes, with consistency checks
//! - [`evaluation`] — Independent verification of routes and solutions
//! - [`io`] — Solomon benchmark reader
//! - [`pipeline`] — One-call solve from instance to verified solution
//! - [`error`] — Error types

pub mod distance;
pub mod error;
pub mod evaluation;
pub mod extraction;
pub mod formulation;
pub mod io;
pub mod models;
pub mod pipeline;
pub mod solver;
