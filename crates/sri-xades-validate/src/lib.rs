#![forbid(unsafe_code)]

//! Structural validation of XAdES-BES signed documents.
//!
//! This is linting, not verification: mandatory elements must be present
//! for a report to be valid, missing XAdES properties and formatting issues
//! are warnings, and no digest or signature is recomputed.

pub mod report;
pub mod validate;

pub use report::ValidationReport;
pub use validate::validate;
