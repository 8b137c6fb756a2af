//! Mathematical formulation of the CVRPTW.
//!
//! # Key Components
//!
//! - **Model layer**: [`Variable`], [`LinearExpr`], [`Constraint`],
//!   [`MipModel`], [`Assignment`] — a solver-independent MIP representation
//! - **Layout**: [`VarLayout`] — where `x`, `load`, `arrival` and `order`
//!   variables sit inside a model
//! - **Builder**: [`FormulationBuilder`] — instance → [`Formulation`]
//!
//! # References
//!
//! Toth & Vigo (2014), "Vehicle Routing: Problems, Methods, and
//! Applications", ch. 5 (VRPTW three-index formulation).
//!
//! Miller, Tucker & Zemlin (1960), "Integer Programming Formulation of
//! Traveling Salesman Problems", *J. ACM* 7(4).

mod builder;
mod expr;
mod layout;
mod model;

pub use builder::{
    BigM, BigMPolicy, Formulation, FormulationBuilder, FormulationConfig, SubtourElimination,
};
pub use expr::{Constraint, ConstraintFamily, LinearExpr, Sense, VarId, VarKind, Variable};
pub use layout::VarLayout;
pub use model::{Assignment, Direction, MipModel, ModelViolation, Objective};
