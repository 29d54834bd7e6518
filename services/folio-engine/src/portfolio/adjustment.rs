//! Forced include: reserve a fixed weight for one externally chosen asset.
//!
//! ```text
//!   before:  a 0.25 │ b 0.25 │ c 0.25 │ d 0.25
//!   f = 0.10
//!   after:   a 0.225│ b 0.225│ c 0.225│ d 0.225│ X 0.10
//! ```
//!
//! An existing entry for the same identifier is replaced in place and keeps
//! its hybrid sleeve. The other holdings are rescaled from their own total.
//! Calling it again with the same asset therefore yields the same weights.

use std::sync::Arc;

use folio_common::validation::validate_open_fraction;

use super::types::{Holding, Origin, Portfolio};
use crate::asset::AssetRecord;
use crate::error::Result;

#[derive(Debug, Clone, Copy)]
pub struct ForcedInclude {
    fraction: f64,
}

impl ForcedInclude {
    /// `fraction` must lie in (0, 1).
    pub fn new(fraction: f64) -> Result<Self> {
        validate_open_fraction(fraction, "forced_include_fraction")?;
        Ok(Self { fraction })
    }

    pub fn fraction(&self) -> f64 {
        self.fraction
    }

    /// Return a new portfolio holding `asset` at the reserved fraction.
    pub fn apply(&self, portfolio: &Portfolio, asset: Arc<AssetRecord>) -> Result<Portfolio> {
        let existing = portfolio.holdings().iter().position(|h| h.asset.id == asset.id);
        let others_total: f64 = portfolio
            .holdings()
            .iter()
            .filter(|h| h.asset.id != asset.id)
            .map(|h| h.weight)
            .sum();

        let forced_weight = if others_total > 0.0 { self.fraction } else { 1.0 };
        let forced = Holding {
            asset: Arc::clone(&asset),
            weight: forced_weight,
            sleeve: None,
            origin: Origin::Forced,
        };

        let mut holdings: Vec<Holding> = portfolio
            .holdings()
            .iter()
            .map(|h| {
                if h.asset.id == asset.id {
                    Holding {
                        sleeve: h.sleeve,
                        ..forced.clone()
                    }
                } else {
                    let mut scaled = h.clone();
                    scaled.weight = if others_total > 0.0 {
                        h.weight / others_total * (1.0 - self.fraction)
                    } else {
                        0.0
                    };
                    scaled
                }
            })
            .collect();
        if existing.is_none() {
            holdings.push(forced);
        }

        tracing::info!(
            id = %asset.id,
            fraction = forced_weight,
            replaced = existing.is_some(),
            "Forced include applied"
        );

        portfolio.with_holdings(holdings)
    }
}
