//! Small validation helpers shared across configuration sections.

use crate::core::errors::{DiagnosisError, Result};

/// Validate that a value lies in the closed unit interval `[0.0, 1.0]`.
pub fn validate_unit_range(value: f64, field: &str) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(DiagnosisError::invalid_field(
            format!("{field} must be in [0, 1], got {value}"),
            field,
        ));
    }
    Ok(())
}

/// Validate that a value is strictly greater than zero.
pub fn validate_positive(value: f64, field: &str) -> Result<()> {
    if value <= 0.0 {
        return Err(DiagnosisError::invalid_field(
            format!("{field} must be greater than 0"),
            field,
        ));
    }
    Ok(())
}

/// Validate that a `usize` is strictly greater than zero.
pub fn validate_positive_usize(value: usize, field: &str) -> Result<()> {
    if value == 0 {
        return Err(DiagnosisError::invalid_field(
            format!("{field} must be greater than 0"),
            field,
        ));
    }
    Ok(())
}
