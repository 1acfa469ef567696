//! Export functionality for billing reconciliation.

mod billing;

pub use billing::*;
