//! Concentration scoring.

use serde::Serialize;
use std::collections::BTreeMap;

use super::config::HhiCeilings;
use super::types::Portfolio;

/// Herfindahl-Hirschman Index: the sum of squared weights.
///
/// For a normalized, non-empty weight vector the result lies in (0, 1].
pub fn hhi(weights: &[f64]) -> f64 {
    weights.iter().map(|w| w * w).sum()
}

/// HHI rescaled to [0, 1], where 0 is equal weighting over `n` holdings.
pub fn normalized_hhi(hhi: f64, n: usize) -> f64 {
    if n <= 1 {
        return 1.0;
    }
    let floor = 1.0 / n as f64;
    ((hhi - floor) / (1.0 - floor)).clamp(0.0, 1.0)
}

/// Advisory concentration check of a finished portfolio.
#[derive(Debug, Clone, Serialize)]
pub struct ConcentrationReview {
    pub hhi: f64,
    pub normalized_hhi: f64,
    /// Advisory ceiling for the portfolio's risk profile
    pub ceiling: f64,
    pub within_limit: bool,
    /// `1 / HHI`
    pub effective_holdings: f64,
    pub largest_weight: f64,
    /// Total weight per sector label
    pub sector_weights: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Default)]
pub struct ConcentrationAuditor {
    ceilings: HhiCeilings,
}

impl ConcentrationAuditor {
    pub fn new(ceilings: HhiCeilings) -> Self {
        Self { ceilings }
    }

    pub fn review(&self, portfolio: &Portfolio) -> ConcentrationReview {
        let weights = portfolio.weights();
        let score = hhi(&weights);
        let ceiling = self.ceilings.ceiling(portfolio.risk_profile());

        let mut sector_weights = BTreeMap::new();
        for holding in portfolio.holdings() {
            *sector_weights
                .entry(holding.asset.sector_label().to_string())
                .or_insert(0.0) += holding.weight;
        }

        let review = ConcentrationReview {
            hhi: score,
            normalized_hhi: normalized_hhi(score, weights.len()),
            ceiling,
            within_limit: score <= ceiling,
            effective_holdings: if score > 0.0 { 1.0 / score } else { 0.0 },
            largest_weight: weights.iter().copied().fold(0.0, f64::max),
            sector_weights,
        };

        if !review.within_limit {
            tracing::warn!(
                profile = %portfolio.risk_profile(),
                hhi = review.hhi,
                ceiling,
                "Portfolio concentration above advisory ceiling"
            );
        }
        review
    }
}
