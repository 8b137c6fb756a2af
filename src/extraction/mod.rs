//! Conversion of solver assignments into routes and schedules.

mod extractor;

pub use extractor::{ExtractionConfig, SolutionExtractor};
