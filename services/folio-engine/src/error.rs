//! Engine error types.
//!
//! Only terminal outcomes are errors. Missing data, empty strict tiers and
//! degenerate weight sums are recovered where they occur and show up as data
//! on the pools and portfolio instead.

use thiserror::Error;

use folio_common::validation::ValidationError;

use crate::portfolio::Sleeve;
use crate::profile::{MixType, RiskProfile};

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Error, Debug)]
pub enum EngineError {
    /// Fewer than the required number of assets survived construction.
    #[error(
        "Insufficient assets for {profile} {mix}{}: accepted {accepted}, required {required} ({reason})",
        sleeve_suffix(.sleeve)
    )]
    Infeasible {
        profile: RiskProfile,
        mix: MixType,
        sleeve: Option<Sleeve>,
        accepted: usize,
        required: usize,
        reason: String,
    },

    #[error("Invalid engine configuration: {0}")]
    InvalidConfig(#[from] ValidationError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The leveraged-name pattern failed to compile
    #[error("Invalid name pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// A fund keyword list failed to build into a matcher
    #[error("Invalid fund keywords: {0}")]
    Keywords(#[from] aho_corasick::BuildError),
}

fn sleeve_suffix(sleeve: &Option<Sleeve>) -> String {
    match sleeve {
        Some(s) => format!(" ({} sleeve)", s),
        None => String::new(),
    }
}

impl EngineError {
    pub fn is_infeasible(&self) -> bool {
        matches!(self, Self::Infeasible { .. })
    }

    /// Process exit code for this error when surfaced by the binary.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Infeasible { .. } => 3,
            Self::InvalidConfig(_) | Self::Pattern(_) | Self::Keywords(_) => 78,
            Self::InvalidInput(_) => 64,
        }
    }
}
