//! Configuration validation for Folio services.
//!
//! Provides validation logic for configuration fields to ensure
//! all required values are present and within valid ranges.

use thiserror::Error;

/// Configuration validation error.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Configuration conflict: {reason}")]
    Conflict { reason: String },

    #[error("Multiple validation errors: {0:?}")]
    Multiple(Vec<ValidationError>),
}

impl ValidationError {
    /// Number of individual problems carried by this error.
    pub fn count(&self) -> usize {
        match self {
            Self::Multiple(errors) => errors.iter().map(Self::count).sum(),
            _ => 1,
        }
    }
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Trait for validatable configuration sections.
pub trait Validate {
    /// Validate this configuration section.
    fn validate(&self) -> ValidationResult<()>;
}

/// Collects validation failures so that every problem is reported at once.
#[derive(Debug, Default)]
pub struct ValidationCollector {
    errors: Vec<ValidationError>,
}

impl ValidationCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of a nested validation.
    pub fn check(&mut self, result: ValidationResult<()>) {
        if let Err(e) = result {
            self.errors.push(e);
        }
    }

    /// Record a failure unless `ok` holds.
    pub fn ensure(&mut self, ok: bool, field: impl Into<String>, reason: impl Into<String>) {
        if !ok {
            self.errors.push(ValidationError::InvalidValue {
                field: field.into(),
                reason: reason.into(),
            });
        }
    }

    pub fn push(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    /// Finish: no errors → Ok, one → that error, several → `Multiple`.
    pub fn finish(mut self) -> ValidationResult<()> {
        if self.errors.is_empty() {
            Ok(())
        } else if self.errors.len() == 1 {
            Err(self.errors.remove(0))
        } else {
            Err(ValidationError::Multiple(self.errors))
        }
    }
}

/// Check that `value` lies strictly inside (0, 1).
pub fn validate_open_fraction(value: f64, field: &str) -> ValidationResult<()> {
    if value.is_finite() && value > 0.0 && value < 1.0 {
        Ok(())
    } else {
        Err(ValidationError::InvalidValue {
            field: field.into(),
            reason: format!("must be within (0, 1), got {}", value),
        })
    }
}

/// Check that `value` lies inside [0, 1].
pub fn validate_unit_interval(value: f64, field: &str) -> ValidationResult<()> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::InvalidValue {
            field: field.into(),
            reason: format!("must be within [0, 1], got {}", value),
        })
    }
}
