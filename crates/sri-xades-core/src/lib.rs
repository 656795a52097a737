#![forbid(unsafe_code)]

//! Core types for the SRI XAdES-BES signing workspace.
//!
//! Holds the shared error taxonomy plus the namespace, element name and
//! algorithm URI constants every other crate agrees on.

pub mod algorithm;
pub mod error;
pub mod ns;

pub use error::{Error, Result};
