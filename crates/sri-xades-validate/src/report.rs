#![forbid(unsafe_code)]

//! The validation report.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Outcome of a structural check: verdict, errors, warnings and facts.
///
/// Only errors make a report invalid. The JSON form is
/// `{"valid": bool, "errors": [..], "warnings": [..], "info": {..}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    valid: bool,
    errors: Vec<String>,
    warnings: Vec<String>,
    info: BTreeMap<String, String>,
}

impl Default for ValidationReport {
    fn default() -> Self {
        Self::new()
    }
}

impl ValidationReport {
    /// An empty, valid report.
    pub fn new() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
            info: BTreeMap::new(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn info(&self) -> &BTreeMap<String, String> {
        &self.info
    }

    /// Record an error; the report becomes invalid.
    pub fn add_error(&mut self, message: impl Into<String>) {
        self.valid = false;
        self.errors.push(message.into());
    }

    pub fn add_warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn set_info(&mut self, key: &str, value: impl ToString) {
        self.info.insert(key.to_owned(), value.to_string());
    }

    /// Pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(60);
        writeln!(f, "{rule}")?;
        writeln!(f, "XAdES-BES STRUCTURE REPORT")?;
        writeln!(f, "{rule}")?;
        if self.valid {
            writeln!(f, "VALID: the basic structure is correct")?;
        } else {
            writeln!(f, "INVALID: errors were found")?;
        }

        if !self.errors.is_empty() {
            writeln!(f, "\nErrors:")?;
            for error in &self.errors {
                writeln!(f, "  x {error}")?;
            }
        }
        if !self.warnings.is_empty() {
            writeln!(f, "\nWarnings:")?;
            for warning in &self.warnings {
                writeln!(f, "  ! {warning}")?;
            }
        }
        if !self.info.is_empty() {
            writeln!(f, "\nInfo:")?;
            for (key, value) in &self.info {
                writeln!(f, "  - {key}: {value}")?;
            }
        }

        writeln!(f, "\n{rule}")?;
        writeln!(
            f,
            "Note: structural check only; digests and the signature value are not verified."
        )?;
        write!(f, "{rule}")
    }
}
