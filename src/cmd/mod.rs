//! Command-line entry points.

pub mod dashboard;
pub mod extract;
pub mod schema;
