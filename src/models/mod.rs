//! Core data models for the stats pipeline.

mod aggregate;
mod ids;
mod instant;
mod ranking;
mod stat_entry;

pub use aggregate::*;
pub use ids::*;
pub use instant::*;
pub use ranking::*;
pub use stat_entry::*;
