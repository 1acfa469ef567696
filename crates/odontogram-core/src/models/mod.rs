//! Domain models for dental charting.

mod chart;
mod dentition;
mod patient;
mod tooth;
mod treatment;

pub use chart::*;
pub use dentition::*;
pub use patient::*;
pub use tooth::*;
pub use treatment::*;

use thiserror::Error;

/// Malformed input rejected while building a model value.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{0}")]
pub struct ValidationError(pub String);
