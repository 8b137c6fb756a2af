//! Distance matrix for routing instances.
//!
//! Provides the symmetric Euclidean matrix that the formulation uses both as
//! arc cost and as travel time.

mod matrix;

pub use matrix::DistanceMatrix;
