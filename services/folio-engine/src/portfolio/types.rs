//! Portfolio value types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

use super::concentration::hhi;
use crate::asset::AssetRecord;
use crate::error::{EngineError, Result};
use crate::profile::{MixType, RiskProfile};
use crate::screener::pool::{FundCategory, PoolKind};

/// Tolerance on the total weight of a portfolio.
pub const WEIGHT_TOLERANCE: f64 = 1e-6;

// ============================================================================
// Sleeve
// ============================================================================

/// Sub-portfolio of a hybrid mix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sleeve {
    /// Fund core
    Core,
    /// Equity satellite
    Satellite,
}

impl std::fmt::Display for Sleeve {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Core => write!(f, "core"),
            Self::Satellite => write!(f, "satellite"),
        }
    }
}

// ============================================================================
// Holding
// ============================================================================

/// Where a holding came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum Origin {
    /// Selected from a pool; `matched < conditions` marks a relaxed fit
    Pool {
        kind: PoolKind,
        matched: usize,
        conditions: usize,
    },
    /// Inserted by forced include
    Forced,
}

impl Origin {
    pub fn is_relaxed(&self) -> bool {
        matches!(self, Self::Pool { matched, conditions, .. } if matched < conditions)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Holding {
    pub asset: Arc<AssetRecord>,
    pub weight: f64,
    /// Set for hybrid portfolios
    pub sleeve: Option<Sleeve>,
    pub origin: Origin,
}

impl Holding {
    pub fn id(&self) -> &str {
        &self.asset.id
    }
}

/// A fund slot that could not be filled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryShortfall {
    pub category: FundCategory,
    pub requested: usize,
    pub taken: usize,
}

// ============================================================================
// Portfolio
// ============================================================================

/// Weighted holdings with their concentration score.
///
/// Weights are non-negative and sum to 1.0; the HHI is recomputed from them
/// whenever a new value is assembled.
#[derive(Debug, Clone, Serialize)]
pub struct Portfolio {
    build_id: String,
    risk_profile: RiskProfile,
    mix: MixType,
    holdings: Vec<Holding>,
    hhi: f64,
    shortfalls: Vec<CategoryShortfall>,
    weighting_fallback: bool,
    /// Selected candidates that risk scoring left out
    dropped: Vec<String>,
    generated_at: DateTime<Utc>,
}

impl Portfolio {
    /// Validate and normalize `holdings` into a portfolio.
    pub fn assemble(
        build_id: impl Into<String>,
        risk_profile: RiskProfile,
        mix: MixType,
        holdings: Vec<Holding>,
        shortfalls: Vec<CategoryShortfall>,
        weighting_fallback: bool,
    ) -> Result<Self> {
        let mut portfolio = Self {
            build_id: build_id.into(),
            risk_profile,
            mix,
            holdings: Vec::new(),
            hhi: 0.0,
            shortfalls,
            weighting_fallback,
            dropped: Vec::new(),
            generated_at: Utc::now(),
        };
        portfolio.set_holdings(holdings)?;
        Ok(portfolio)
    }

    /// Same metadata, new holdings.
    pub(crate) fn with_holdings(&self, holdings: Vec<Holding>) -> Result<Self> {
        let mut next = self.clone();
        next.generated_at = Utc::now();
        next.set_holdings(holdings)?;
        Ok(next)
    }

    /// Record candidates the weighting step left out.
    pub(crate) fn with_dropped(mut self, dropped: Vec<String>) -> Self {
        self.dropped = dropped;
        self.dropped.retain(|id| !self.holdings.iter().any(|h| h.asset.id == *id));
        self
    }

    fn set_holdings(&mut self, mut holdings: Vec<Holding>) -> Result<()> {
        if holdings.is_empty() {
            return Err(EngineError::InvalidInput(
                "a portfolio needs at least one holding".into(),
            ));
        }
        if let Some(bad) = holdings.iter().find(|h| !(h.weight.is_finite() && h.weight >= 0.0)) {
            return Err(EngineError::InvalidInput(format!(
                "holding {} has invalid weight {}",
                bad.id(),
                bad.weight
            )));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = holdings.iter().find(|h| !seen.insert(h.asset.id.clone())) {
            return Err(EngineError::InvalidInput(format!(
                "holding {} appears more than once",
                dup.id()
            )));
        }

        let total: f64 = holdings.iter().map(|h| h.weight).sum();
        if !(total.is_finite() && total > 0.0) {
            return Err(EngineError::InvalidInput(format!(
                "holding weights sum to {}",
                total
            )));
        }
        for h in &mut holdings {
            h.weight /= total;
        }

        self.hhi = hhi(&holdings.iter().map(|h| h.weight).collect::<Vec<_>>());
        self.dropped.retain(|id| !holdings.iter().any(|h| h.asset.id == *id));
        self.holdings = holdings;
        Ok(())
    }

    pub fn build_id(&self) -> &str {
        &self.build_id
    }

    pub fn risk_profile(&self) -> RiskProfile {
        self.risk_profile
    }

    pub fn mix(&self) -> MixType {
        self.mix
    }

    pub fn holdings(&self) -> &[Holding] {
        &self.holdings
    }

    pub fn weights(&self) -> Vec<f64> {
        self.holdings.iter().map(|h| h.weight).collect()
    }

    pub fn hhi(&self) -> f64 {
        self.hhi
    }

    pub fn shortfalls(&self) -> &[CategoryShortfall] {
        &self.shortfalls
    }

    /// Some weighting step substituted equal weights.
    pub fn weighting_fallback(&self) -> bool {
        self.weighting_fallback
    }

    pub fn dropped(&self) -> &[String] {
        &self.dropped
    }

    pub fn generated_at(&self) -> DateTime<Utc> {
        self.generated_at
    }

    pub fn get(&self, id: &str) -> Option<&Holding> {
        self.holdings.iter().find(|h| h.asset.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn total_weight(&self) -> f64 {
        self.holdings.iter().map(|h| h.weight).sum()
    }

    /// Total weight of one hybrid sleeve.
    pub fn sleeve_weight(&self, sleeve: Sleeve) -> f64 {
        self.holdings
            .iter()
            .filter(|h| h.sleeve == Some(sleeve))
            .map(|h| h.weight)
            .sum()
    }

    /// Any holding came from a relaxed (closest-fit) pool.
    pub fn has_relaxed_holdings(&self) -> bool {
        self.holdings.iter().any(|h| h.origin.is_relaxed())
    }

    pub fn len(&self) -> usize {
        self.holdings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.holdings.is_empty()
    }
}
