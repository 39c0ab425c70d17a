//! Inspection engine module.
//!
//! Provides check resolution, evaluation and report aggregation.

pub mod inspector;
pub mod report;
