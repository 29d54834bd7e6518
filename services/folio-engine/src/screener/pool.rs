//! Asset pools produced by the classifiers.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::asset::AssetRecord;
use crate::profile::RiskProfile;

// ============================================================================
// Fund Category
// ============================================================================

/// Fund categories recognised by keyword tagging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FundCategory {
    /// Broad market-capitalization index trackers
    MarketCap,
    /// High-dividend strategies
    HighDividend,
    /// Thematic or single-sector funds
    Thematic,
    /// Government bonds
    GovernmentBond,
    /// Investment-grade corporate bonds
    CorporateBond,
}

impl FundCategory {
    pub const ALL: [FundCategory; 5] = [
        Self::MarketCap,
        Self::HighDividend,
        Self::Thematic,
        Self::GovernmentBond,
        Self::CorporateBond,
    ];

    pub fn is_bond(&self) -> bool {
        matches!(self, Self::GovernmentBond | Self::CorporateBond)
    }
}

impl std::fmt::Display for FundCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MarketCap => write!(f, "market-cap-tracking"),
            Self::HighDividend => write!(f, "high-dividend"),
            Self::Thematic => write!(f, "thematic/sector"),
            Self::GovernmentBond => write!(f, "government-bond"),
            Self::CorporateBond => write!(f, "investment-grade-corporate-bond"),
        }
    }
}

// ============================================================================
// Asset Pool
// ============================================================================

/// Which rule-set produced a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "name", rename_all = "snake_case")]
pub enum PoolKind {
    Stock(RiskProfile),
    Fund(FundCategory),
}

impl std::fmt::Display for PoolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stock(tier) => write!(f, "stock:{}", tier),
            Self::Fund(category) => write!(f, "fund:{}", category),
        }
    }
}

/// How pool members were admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum PoolMode {
    /// Every member satisfied every condition
    Strict,
    /// No strict match existed; members satisfy at least `min_matches` conditions
    Relaxed { min_matches: usize },
}

/// One pool entry.
#[derive(Debug, Clone, Serialize)]
pub struct PoolMember {
    pub asset: Arc<AssetRecord>,
    /// Conditions this asset satisfied
    pub matched: usize,
    /// Conditions in the rule-set
    pub conditions: usize,
}

impl PoolMember {
    pub fn new(asset: Arc<AssetRecord>, matched: usize, conditions: usize) -> Self {
        Self {
            asset,
            matched,
            conditions,
        }
    }

    /// Member that satisfied its whole rule-set.
    pub fn strict(asset: Arc<AssetRecord>, conditions: usize) -> Self {
        Self::new(asset, conditions, conditions)
    }

    pub fn is_strict_match(&self) -> bool {
        self.matched >= self.conditions
    }
}

/// A named, ordered sequence of assets that passed one classification rule-set.
#[derive(Debug, Clone, Serialize)]
pub struct AssetPool {
    kind: PoolKind,
    mode: PoolMode,
    condition_count: usize,
    members: Vec<PoolMember>,
}

impl AssetPool {
    pub fn new(
        kind: PoolKind,
        mode: PoolMode,
        condition_count: usize,
        members: Vec<PoolMember>,
    ) -> Self {
        Self {
            kind,
            mode,
            condition_count,
            members,
        }
    }

    /// Strict pool whose members all satisfied `condition_count` conditions.
    pub fn strict(
        kind: PoolKind,
        condition_count: usize,
        assets: impl IntoIterator<Item = Arc<AssetRecord>>,
    ) -> Self {
        let members = assets
            .into_iter()
            .map(|a| PoolMember::strict(a, condition_count))
            .collect();
        Self::new(kind, PoolMode::Strict, condition_count, members)
    }

    pub fn empty(kind: PoolKind, condition_count: usize) -> Self {
        Self::new(kind, PoolMode::Strict, condition_count, Vec::new())
    }

    pub fn kind(&self) -> PoolKind {
        self.kind
    }

    pub fn mode(&self) -> PoolMode {
        self.mode
    }

    pub fn is_relaxed(&self) -> bool {
        matches!(self.mode, PoolMode::Relaxed { .. })
    }

    /// Number of sub-conditions (M) in the rule-set.
    pub fn condition_count(&self) -> usize {
        self.condition_count
    }

    pub fn members(&self) -> &[PoolMember] {
        &self.members
    }

    pub fn assets(&self) -> impl Iterator<Item = &Arc<AssetRecord>> {
        self.members.iter().map(|m| &m.asset)
    }

    pub fn ids(&self) -> Vec<&str> {
        self.members.iter().map(|m| m.asset.id.as_str()).collect()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.members.iter().any(|m| m.asset.id == id)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Smallest match count among members, if any.
    pub fn min_matched(&self) -> Option<usize> {
        self.members.iter().map(|m| m.matched).min()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::AssetClass;

    fn asset(id: &str) -> Arc<AssetRecord> {
        Arc::new(AssetRecord::new(id, id, AssetClass::Equity))
    }

    #[test]
    fn test_strict_pool() {
        let pool = AssetPool::strict(
            PoolKind::Stock(RiskProfile::Moderate),
            4,
            vec![asset("a"), asset("b")],
        );
        assert_eq!(pool.len(), 2);
        assert!(!pool.is_relaxed());
        assert!(pool.members().iter().all(PoolMember::is_strict_match));
        assert_eq!(pool.ids(), vec!["a", "b"]);
        assert_eq!(pool.min_matched(), Some(4));
    }

    #[test]
    fn test_relaxed_members_are_not_strict() {
        let pool = AssetPool::new(
            PoolKind::Stock(RiskProfile::Aggressive),
            PoolMode::Relaxed { min_matches: 1 },
            3,
            vec![PoolMember::new(asset("x"), 2, 3), PoolMember::new(asset("y"), 1, 3)],
        );
        assert!(pool.is_relaxed());
        assert!(!pool.members()[0].is_strict_match());
        assert_eq!(pool.min_matched(), Some(1));
        assert!(pool.contains("y"));
    }

    #[test]
    fn test_pool_kind_display() {
        assert_eq!(
            PoolKind::Fund(FundCategory::Thematic).to_string(),
            "fund:thematic/sector"
        );
        assert_eq!(
            PoolKind::Stock(RiskProfile::Conservative).to_string(),
            "stock:conservative"
        );
    }
}
