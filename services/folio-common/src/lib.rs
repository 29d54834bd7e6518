//! Folio Common - Shared types, utilities, and configuration for the Folio services.
//!
//! This crate provides:
//! - Configuration directory resolution and layered JSON loading
//! - Configuration validation
//! - Error types and handling utilities
//! - Logging setup and structured logging helpers

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod logging;
pub mod validation;

pub use config::ObservabilityConfig;
pub use error::{Error, Result, ResultExt};
pub use validation::{Validate, ValidationError, ValidationResult};

