//! Weighting strategies.
//!
//! Every strategy produces raw non-negative scores that are divided by their
//! own sum, so outcomes always total 1.0. A sum that is zero or not finite
//! falls back to equal weights and is flagged on the outcome.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use folio_common::validation::{ValidationCollector, ValidationResult};

use super::config::WeightingConfig;
use crate::asset::AssetRecord;
use crate::screener::rules::Metric;

// ============================================================================
// Strategy
// ============================================================================

/// Weighting applied after risk scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoredWeighting {
    #[default]
    Equal,
    Rank,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum WeightingStrategy {
    /// 1/N
    Equal,
    /// Proportional to `max(metric, floor)`; missing values take the floor
    Factor { metric: Metric },
    /// Proportional to `N - rank + 1` in the given order
    Rank,
    /// Order by `(return - risk_free) / volatility`, optionally keep the
    /// best `keep`, then weight the survivors. Without `keep`, assets that
    /// cannot be scored follow the scored ones.
    RiskScored {
        #[serde(default)]
        keep: Option<usize>,
        #[serde(default)]
        then: ScoredWeighting,
    },
}

impl std::fmt::Display for WeightingStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Equal => write!(f, "equal"),
            Self::Factor { metric } => write!(f, "factor({})", metric),
            Self::Rank => write!(f, "rank"),
            Self::RiskScored { keep, then } => {
                let then = match then {
                    ScoredWeighting::Equal => "equal",
                    ScoredWeighting::Rank => "rank",
                };
                match keep {
                    Some(k) => write!(f, "risk-scored(top {}, {})", k, then),
                    None => write!(f, "risk-scored({})", then),
                }
            }
        }
    }
}

impl WeightingStrategy {
    pub(crate) fn validate_at(&self, field: &str) -> ValidationResult<()> {
        let mut errors = ValidationCollector::new();
        match self {
            Self::Factor { metric } => errors.ensure(
                *metric != Metric::VolatilityPercentile,
                format!("{}.metric", field),
                "volatility_percentile is not a stored factor",
            ),
            Self::RiskScored { keep: Some(k), .. } => errors.ensure(
                *k >= 1,
                format!("{}.keep", field),
                "must keep at least one asset",
            ),
            _ => {}
        }
        errors.finish()
    }
}

// ============================================================================
// Outcome
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct WeightedAsset {
    pub asset: Arc<AssetRecord>,
    pub weight: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct WeightingOutcome {
    /// Weighted assets, summing to 1.0 unless empty
    pub holdings: Vec<WeightedAsset>,
    /// Equal weights were substituted for the requested strategy
    pub fell_back: bool,
    /// Identifiers left out by risk scoring
    pub dropped: Vec<String>,
}

impl WeightingOutcome {
    pub fn weights(&self) -> Vec<f64> {
        self.holdings.iter().map(|h| h.weight).collect()
    }

    pub fn len(&self) -> usize {
        self.holdings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.holdings.is_empty()
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Risk score `(annual_return - risk_free) / volatility`.
///
/// `None` when either input is missing or volatility is not positive.
pub fn risk_score(asset: &AssetRecord, risk_free_rate: f64) -> Option<f64> {
    let volatility = asset.metric(Metric::Volatility).filter(|v| *v > 0.0)?;
    let annual_return = asset.metric(Metric::AnnualReturn)?;
    Some((annual_return - risk_free_rate) / volatility)
}

/// Divide `weights` by their sum. Returns `false`, leaving them untouched,
/// when the sum is zero, negative or not finite.
pub fn normalize(weights: &mut [f64]) -> bool {
    let total: f64 = weights.iter().sum();
    if !(total.is_finite() && total > 0.0) {
        return false;
    }
    for w in weights.iter_mut() {
        *w /= total;
    }
    true
}

#[derive(Debug, Clone, Default)]
pub struct WeightingEngine {
    config: WeightingConfig,
}

impl WeightingEngine {
    pub fn new(config: WeightingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &WeightingConfig {
        &self.config
    }

    /// Weight `assets`, which are given in pool order.
    pub fn weigh(&self, strategy: WeightingStrategy, assets: &[Arc<AssetRecord>]) -> WeightingOutcome {
        match strategy {
            WeightingStrategy::Equal => self.finish(strategy, assets.to_vec(), vec![1.0; assets.len()]),
            WeightingStrategy::Factor { metric } => {
                let floor = self.config.factor_floor;
                let raw = assets
                    .iter()
                    .map(|a| a.metric(metric).map_or(floor, |v| v.max(floor)))
                    .collect();
                self.finish(strategy, assets.to_vec(), raw)
            }
            WeightingStrategy::Rank => self.finish(strategy, assets.to_vec(), rank_scores(assets.len())),
            WeightingStrategy::RiskScored { keep, then } => self.risk_scored(assets, keep, then),
        }
    }

    fn risk_scored(
        &self,
        assets: &[Arc<AssetRecord>],
        keep: Option<usize>,
        then: ScoredWeighting,
    ) -> WeightingOutcome {
        let rf = self.config.risk_free_rate;
        let mut scored: Vec<(Arc<AssetRecord>, f64)> = Vec::with_capacity(assets.len());
        let mut unscored: Vec<Arc<AssetRecord>> = Vec::new();
        for asset in assets {
            match risk_score(asset, rf) {
                Some(score) => scored.push((Arc::clone(asset), score)),
                None => unscored.push(Arc::clone(asset)),
            }
        }

        if scored.is_empty() {
            if !assets.is_empty() {
                tracing::warn!(
                    count = assets.len(),
                    "No asset has a measurable risk score, using equal weights"
                );
            }
            let mut outcome = self.finish(WeightingStrategy::Equal, assets.to_vec(), vec![1.0; assets.len()]);
            outcome.fell_back = !assets.is_empty();
            return outcome;
        }

        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        let mut kept: Vec<Arc<AssetRecord>> = Vec::with_capacity(assets.len());
        let mut dropped = Vec::new();
        match keep {
            // A top-k cut only keeps assets it can rank
            Some(k) => {
                dropped.extend(unscored.iter().map(|a| a.id.clone()));
                for (i, (asset, _)) in scored.into_iter().enumerate() {
                    if i < k {
                        kept.push(asset);
                    } else {
                        dropped.push(asset.id.clone());
                    }
                }
            }
            // Unscorable assets stay in, ordered after the scored ones
            None => {
                if !unscored.is_empty() {
                    tracing::debug!(
                        unscored = unscored.len(),
                        "Assets without a risk score placed after scored ones"
                    );
                }
                kept.extend(scored.into_iter().map(|(a, _)| a));
                kept.extend(unscored);
            }
        }
        if !dropped.is_empty() {
            tracing::debug!(dropped = dropped.len(), kept = kept.len(), "Risk scoring narrowed candidates");
        }

        let raw = match then {
            ScoredWeighting::Equal => vec![1.0; kept.len()],
            ScoredWeighting::Rank => rank_scores(kept.len()),
        };
        let mut outcome = self.finish(
            WeightingStrategy::RiskScored { keep, then },
            kept,
            raw,
        );
        outcome.dropped = dropped;
        outcome
    }

    fn finish(
        &self,
        strategy: WeightingStrategy,
        assets: Vec<Arc<AssetRecord>>,
        mut raw: Vec<f64>,
    ) -> WeightingOutcome {
        let mut fell_back = false;
        if !assets.is_empty() && !normalize(&mut raw) {
            tracing::warn!(
                strategy = %strategy,
                count = assets.len(),
                "Degenerate weight sum, falling back to equal weights"
            );
            raw = vec![1.0 / assets.len() as f64; assets.len()];
            fell_back = true;
        }

        WeightingOutcome {
            holdings: assets
                .into_iter()
                .zip(raw)
                .map(|(asset, weight)| WeightedAsset { asset, weight })
                .collect(),
            fell_back,
            dropped: Vec::new(),
        }
    }
}

/// `N, N-1, ..., 1`.
fn rank_scores(n: usize) -> Vec<f64> {
    (0..n).map(|i| (n - i) as f64).collect()
}
