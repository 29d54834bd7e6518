//! Stock pool classifier.
//!
//! Splits filtered equities into one pool per risk tier. The volatility
//! percentile is ranked once over every equity passed in, so the 30th/70th
//! percentile bounds partition the population the same way for every tier.
//!
//! When a tier's strict conjunction admits nothing, the tier is classified
//! again in diagnostic mode: each asset is scored by how many of the tier's
//! M conditions it meets, and assets meeting at least `max(1, M - slack)`
//! are returned, best match first.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::config::{StockScreeningConfig, TierRule};
use super::pool::{AssetPool, PoolKind, PoolMember, PoolMode};
use super::rules::{compare_by, count_matches, RankedAsset};
use crate::asset::AssetRecord;
use crate::profile::RiskProfile;

// ============================================================================
// Volatility Percentile
// ============================================================================

/// Percentile rank of each asset's one-year volatility.
///
/// Ties share their average rank and the result is divided by the number of
/// assets with a measurable volatility, giving values in (0, 1]. Assets
/// without one get `None`.
pub fn volatility_percentiles(assets: &[Arc<AssetRecord>]) -> Vec<Option<f64>> {
    let mut measured: Vec<(usize, f64)> = assets
        .iter()
        .enumerate()
        .filter_map(|(i, a)| a.volatility_1y.filter(|v| v.is_finite()).map(|v| (i, v)))
        .collect();
    measured.sort_by(|a, b| a.1.total_cmp(&b.1));

    let mut percentiles = vec![None; assets.len()];
    let n = measured.len() as f64;
    let mut start = 0;
    while start < measured.len() {
        let mut end = start;
        while end + 1 < measured.len() && measured[end + 1].1 == measured[start].1 {
            end += 1;
        }
        // 1-based ranks start+1 ..= end+1 share their mean.
        let rank = (start + end + 2) as f64 / 2.0;
        for &(index, _) in &measured[start..=end] {
            percentiles[index] = Some(rank / n);
        }
        start = end + 1;
    }

    percentiles
}

// ============================================================================
// Stock Pools
// ============================================================================

/// Tier pools keyed by risk profile.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StockPools {
    pools: BTreeMap<RiskProfile, AssetPool>,
}

impl StockPools {
    pub fn from_pools(pools: impl IntoIterator<Item = (RiskProfile, AssetPool)>) -> Self {
        Self {
            pools: pools.into_iter().collect(),
        }
    }

    pub fn get(&self, tier: RiskProfile) -> Option<&AssetPool> {
        self.pools.get(&tier)
    }

    pub fn iter(&self) -> impl Iterator<Item = (RiskProfile, &AssetPool)> {
        self.pools.iter().map(|(k, v)| (*k, v))
    }

    pub fn any_relaxed(&self) -> bool {
        self.pools.values().any(AssetPool::is_relaxed)
    }
}

// ============================================================================
// Classifier
// ============================================================================

pub struct StockPoolClassifier {
    config: StockScreeningConfig,
}

impl StockPoolClassifier {
    pub fn new(config: StockScreeningConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(StockScreeningConfig::default())
    }

    /// Classify `assets` into every configured tier. Funds are ignored.
    pub fn classify(&self, assets: &[Arc<AssetRecord>]) -> StockPools {
        let equities: Vec<Arc<AssetRecord>> =
            assets.iter().filter(|a| a.is_equity()).cloned().collect();
        let percentiles = volatility_percentiles(&equities);

        StockPools::from_pools(
            self.config
                .tiers
                .iter()
                .map(|rule| (rule.tier, self.tier_pool(rule, &equities, &percentiles))),
        )
    }

    /// Classify `assets` against a single rule.
    pub fn classify_tier(&self, rule: &TierRule, assets: &[Arc<AssetRecord>]) -> AssetPool {
        let equities: Vec<Arc<AssetRecord>> =
            assets.iter().filter(|a| a.is_equity()).cloned().collect();
        let percentiles = volatility_percentiles(&equities);
        self.tier_pool(rule, &equities, &percentiles)
    }

    fn tier_pool(
        &self,
        rule: &TierRule,
        equities: &[Arc<AssetRecord>],
        percentiles: &[Option<f64>],
    ) -> AssetPool {
        let kind = PoolKind::Stock(rule.tier);
        let m = rule.condition_count();

        let mut scored: Vec<(usize, usize)> = equities
            .iter()
            .zip(percentiles)
            .enumerate()
            .map(|(i, (asset, pct))| (i, count_matches(&rule.conditions, &RankedAsset::new(asset, *pct))))
            .collect();

        let ranked = |i: usize| RankedAsset::new(&equities[i], percentiles[i]);

        let strict: Vec<(usize, usize)> = scored.iter().copied().filter(|&(_, n)| n == m).collect();
        if !strict.is_empty() {
            let mut strict = strict;
            strict.sort_by(|a, b| compare_by(&rule.sort_by, &ranked(a.0), &ranked(b.0)));
            tracing::info!(tier = %rule.tier, count = strict.len(), "Stock tier classified");
            return AssetPool::strict(
                kind,
                m,
                strict.into_iter().map(|(i, _)| Arc::clone(&equities[i])),
            );
        }

        let min_matches = self.config.relaxed_minimum(m);
        scored.retain(|&(_, n)| n >= min_matches);
        scored.sort_by(|a, b| {
            b.1.cmp(&a.1)
                .then_with(|| compare_by(&rule.sort_by, &ranked(a.0), &ranked(b.0)))
        });

        tracing::warn!(
            tier = %rule.tier,
            conditions = m,
            min_matches,
            count = scored.len(),
            "No strict matches, tier relaxed to closest fits"
        );

        let members = scored
            .into_iter()
            .map(|(i, n)| PoolMember::new(Arc::clone(&equities[i]), n, m))
            .collect();
        AssetPool::new(kind, PoolMode::Relaxed { min_matches }, m, members)
    }
}
