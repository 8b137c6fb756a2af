//! Model-independent verification of routes and solutions.

mod evaluator;

pub use evaluator::RouteEvaluator;
