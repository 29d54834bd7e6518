//! Portfolio construction configuration.
//!
//! One [`ProfilePlans`] per risk profile, each holding a plan for every mix
//! type. Defaults follow the house rule book.

use serde::{Deserialize, Serialize};

use folio_common::validation::{
    validate_open_fraction, Validate, ValidationCollector, ValidationResult,
};

use super::weighting::{ScoredWeighting, WeightingStrategy};
use crate::profile::{MixType, RiskProfile};
use crate::screener::pool::FundCategory;
use crate::screener::rules::Metric;

/// Tolerance for sleeve and allocation fractions summing to 1.
pub const SLEEVE_SUM_TOLERANCE: f64 = 1e-9;

// ============================================================================
// Construction Configuration
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConstructionConfig {
    pub conservative: ProfilePlans,
    pub moderate: ProfilePlans,
    pub aggressive: ProfilePlans,

    /// Weighting parameters shared by every plan
    pub weighting: WeightingConfig,

    /// Weight reserved for a forced-include asset
    pub forced_include_fraction: f64,

    /// Advisory HHI ceilings
    pub hhi_ceilings: HhiCeilings,
}

impl Default for ConstructionConfig {
    fn default() -> Self {
        Self {
            conservative: ProfilePlans::conservative(),
            moderate: ProfilePlans::moderate(),
            aggressive: ProfilePlans::aggressive(),
            weighting: WeightingConfig::default(),
            forced_include_fraction: 0.10,
            hhi_ceilings: HhiCeilings::default(),
        }
    }
}

impl ConstructionConfig {
    pub fn plans(&self, profile: RiskProfile) -> &ProfilePlans {
        match profile {
            RiskProfile::Conservative => &self.conservative,
            RiskProfile::Moderate => &self.moderate,
            RiskProfile::Aggressive => &self.aggressive,
        }
    }
}

impl Validate for ConstructionConfig {
    fn validate(&self) -> ValidationResult<()> {
        let mut errors = ValidationCollector::new();
        for profile in RiskProfile::ALL {
            errors.check(self.plans(profile).validate_as(profile));
        }
        errors.check(self.weighting.validate());
        errors.check(validate_open_fraction(
            self.forced_include_fraction,
            "portfolio.forced_include_fraction",
        ));
        errors.check(self.hhi_ceilings.validate());
        errors.finish()
    }
}

// ============================================================================
// Plans
// ============================================================================

/// Construction plans of one risk profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfilePlans {
    pub pure_equity: EquityPlan,
    pub pure_fund: FundPlan,
    pub hybrid: HybridPlan,
}

/// Walk one stock tier under a diversification cap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquityPlan {
    /// Stock tier to draw from
    pub tier: RiskProfile,
    pub min_assets: usize,
    pub max_assets: usize,
    /// Maximum holdings per sector; `None` disables the cap
    #[serde(default)]
    pub max_per_sector: Option<usize>,
    pub weighting: WeightingStrategy,
}

/// How a fund slot orders its category pool before taking from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FundOrder {
    /// Keep the classifier order (ascending volatility)
    #[default]
    Pool,
    /// Highest annual return first
    ReturnDesc,
}

/// Take `count` funds from one category pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundSlot {
    pub category: FundCategory,
    pub count: usize,
    #[serde(default)]
    pub order: FundOrder,
}

impl FundSlot {
    pub fn new(category: FundCategory, count: usize) -> Self {
        Self {
            category,
            count,
            order: FundOrder::Pool,
        }
    }

    pub fn by_return(category: FundCategory, count: usize) -> Self {
        Self {
            category,
            count,
            order: FundOrder::ReturnDesc,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundPlan {
    pub slots: Vec<FundSlot>,
    /// Fewer distinct funds than this fails the build
    #[serde(default = "default_min_funds")]
    pub min_assets: usize,
    pub weighting: WeightingStrategy,
    /// Equity/bond split; `None` weights all slots together
    #[serde(default)]
    pub allocation: Option<FundAllocation>,
}

/// Stock/bond split of a fund plan.
///
/// Bond slots (government and corporate) share `bond_fraction`; every other
/// slot shares `equity_fraction`. Each group is weighted on its own with the
/// plan's strategy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FundAllocation {
    pub equity_fraction: f64,
    pub bond_fraction: f64,
}

impl FundAllocation {
    pub fn new(equity_fraction: f64, bond_fraction: f64) -> Self {
        Self {
            equity_fraction,
            bond_fraction,
        }
    }

    fn validate_at(&self, field: &str) -> ValidationResult<()> {
        let mut errors = ValidationCollector::new();
        errors.check(validate_open_fraction(
            self.equity_fraction,
            &format!("{}.equity_fraction", field),
        ));
        errors.check(validate_open_fraction(self.bond_fraction, &format!("{}.bond_fraction", field)));
        errors.ensure(
            (self.equity_fraction + self.bond_fraction - 1.0).abs() <= SLEEVE_SUM_TOLERANCE,
            format!("{}.bond_fraction", field),
            format!(
                "equity_fraction + bond_fraction must equal 1.0, got {}",
                self.equity_fraction + self.bond_fraction
            ),
        );
        errors.finish()
    }
}

fn default_min_funds() -> usize {
    1
}

/// Fund core plus equity satellite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HybridPlan {
    pub core: FundPlan,
    pub satellite: EquityPlan,
    pub core_fraction: f64,
    pub satellite_fraction: f64,
}

impl ProfilePlans {
    pub fn for_mix(&self, mix: MixType) -> PlanRef<'_> {
        match mix {
            MixType::PureEquity => PlanRef::Equity(&self.pure_equity),
            MixType::PureFund => PlanRef::Fund(&self.pure_fund),
            MixType::Hybrid => PlanRef::Hybrid(&self.hybrid),
        }
    }

    pub fn conservative() -> Self {
        Self {
            pure_equity: EquityPlan {
                tier: RiskProfile::Conservative,
                min_assets: 8,
                max_assets: 10,
                max_per_sector: Some(2),
                weighting: WeightingStrategy::Factor {
                    metric: Metric::DividendYield,
                },
            },
            pure_fund: FundPlan {
                slots: vec![
                    FundSlot::new(FundCategory::HighDividend, 1),
                    FundSlot::new(FundCategory::GovernmentBond, 2),
                    FundSlot::new(FundCategory::CorporateBond, 2),
                ],
                min_assets: 1,
                weighting: WeightingStrategy::Equal,
                allocation: Some(FundAllocation::new(0.3, 0.7)),
            },
            hybrid: HybridPlan {
                core: FundPlan {
                    slots: vec![
                        FundSlot::new(FundCategory::GovernmentBond, 1),
                        FundSlot::new(FundCategory::CorporateBond, 1),
                        FundSlot::new(FundCategory::HighDividend, 1),
                    ],
                    min_assets: 1,
                    weighting: WeightingStrategy::Equal,
                    allocation: None,
                },
                satellite: EquityPlan {
                    tier: RiskProfile::Conservative,
                    min_assets: 3,
                    max_assets: 5,
                    max_per_sector: Some(2),
                    weighting: WeightingStrategy::Factor {
                        metric: Metric::DividendYield,
                    },
                },
                core_fraction: 0.7,
                satellite_fraction: 0.3,
            },
        }
    }

    pub fn moderate() -> Self {
        Self {
            pure_equity: EquityPlan {
                tier: RiskProfile::Moderate,
                min_assets: 5,
                max_assets: 8,
                max_per_sector: Some(2),
                weighting: WeightingStrategy::Factor {
                    metric: Metric::RoeAvg3y,
                },
            },
            pure_fund: FundPlan {
                slots: vec![
                    FundSlot::new(FundCategory::MarketCap, 1),
                    FundSlot::new(FundCategory::Thematic, 1),
                    FundSlot::new(FundCategory::GovernmentBond, 1),
                ],
                min_assets: 1,
                weighting: WeightingStrategy::RiskScored {
                    keep: None,
                    then: ScoredWeighting::Equal,
                },
                allocation: Some(FundAllocation::new(0.6, 0.4)),
            },
            hybrid: HybridPlan {
                core: FundPlan {
                    slots: vec![FundSlot::new(FundCategory::MarketCap, 1)],
                    min_assets: 1,
                    weighting: WeightingStrategy::Equal,
                    allocation: None,
                },
                satellite: EquityPlan {
                    tier: RiskProfile::Moderate,
                    min_assets: 3,
                    max_assets: 5,
                    max_per_sector: Some(2),
                    weighting: WeightingStrategy::Factor {
                        metric: Metric::RoeAvg3y,
                    },
                },
                core_fraction: 0.6,
                satellite_fraction: 0.4,
            },
        }
    }

    pub fn aggressive() -> Self {
        Self {
            pure_equity: EquityPlan {
                tier: RiskProfile::Aggressive,
                min_assets: 5,
                max_assets: 7,
                max_per_sector: None,
                weighting: WeightingStrategy::Factor {
                    metric: Metric::RevenueGrowth,
                },
            },
            pure_fund: FundPlan {
                slots: vec![
                    FundSlot::new(FundCategory::MarketCap, 1),
                    FundSlot::by_return(FundCategory::Thematic, 2),
                    FundSlot::new(FundCategory::GovernmentBond, 1),
                ],
                min_assets: 1,
                weighting: WeightingStrategy::Rank,
                allocation: Some(FundAllocation::new(0.9, 0.1)),
            },
            hybrid: HybridPlan {
                core: FundPlan {
                    slots: vec![FundSlot::by_return(FundCategory::Thematic, 2)],
                    min_assets: 1,
                    weighting: WeightingStrategy::Equal,
                    allocation: None,
                },
                satellite: EquityPlan {
                    tier: RiskProfile::Aggressive,
                    min_assets: 2,
                    max_assets: 4,
                    max_per_sector: None,
                    weighting: WeightingStrategy::Factor {
                        metric: Metric::RevenueGrowth,
                    },
                },
                core_fraction: 0.5,
                satellite_fraction: 0.5,
            },
        }
    }

    fn validate_as(&self, profile: RiskProfile) -> ValidationResult<()> {
        let mut errors = ValidationCollector::new();
        let prefix = format!("portfolio.{}", profile);
        errors.check(self.pure_equity.validate_at(&format!("{}.pure_equity", prefix)));
        errors.check(self.pure_fund.validate_at(&format!("{}.pure_fund", prefix)));
        errors.check(self.hybrid.validate_at(&format!("{}.hybrid", prefix)));
        errors.finish()
    }
}

/// Borrowed view of the plan selected for a mix type.
#[derive(Debug, Clone, Copy)]
pub enum PlanRef<'a> {
    Equity(&'a EquityPlan),
    Fund(&'a FundPlan),
    Hybrid(&'a HybridPlan),
}

impl EquityPlan {
    fn validate_at(&self, field: &str) -> ValidationResult<()> {
        let mut errors = ValidationCollector::new();
        errors.ensure(self.max_assets >= 1, format!("{}.max_assets", field), "must be at least 1");
        errors.ensure(
            self.min_assets <= self.max_assets,
            format!("{}.min_assets", field),
            format!("must not exceed max_assets ({})", self.max_assets),
        );
        if let Some(cap) = self.max_per_sector {
            errors.ensure(cap >= 1, format!("{}.max_per_sector", field), "must be at least 1 when set");
        }
        errors.check(self.weighting.validate_at(&format!("{}.weighting", field)));
        errors.finish()
    }
}

impl FundPlan {
    fn validate_at(&self, field: &str) -> ValidationResult<()> {
        let mut errors = ValidationCollector::new();
        errors.ensure(!self.slots.is_empty(), format!("{}.slots", field), "must not be empty");
        errors.ensure(
            self.slots.iter().all(|s| s.count >= 1),
            format!("{}.slots", field),
            "every slot must take at least one fund",
        );
        let capacity: usize = self.slots.iter().map(|s| s.count).sum();
        errors.ensure(
            self.min_assets <= capacity,
            format!("{}.min_assets", field),
            format!("must not exceed the slot total ({})", capacity),
        );
        errors.check(self.weighting.validate_at(&format!("{}.weighting", field)));
        if let Some(allocation) = &self.allocation {
            let allocation_field = format!("{}.allocation", field);
            errors.check(allocation.validate_at(&allocation_field));
            let bonds = self.slots.iter().filter(|s| s.category.is_bond()).count();
            errors.ensure(
                bonds > 0 && bonds < self.slots.len(),
                allocation_field,
                "needs at least one bond slot and one equity slot",
            );
        }
        errors.finish()
    }
}

impl HybridPlan {
    fn validate_at(&self, field: &str) -> ValidationResult<()> {
        let mut errors = ValidationCollector::new();
        errors.check(self.core.validate_at(&format!("{}.core", field)));
        errors.check(self.satellite.validate_at(&format!("{}.satellite", field)));
        errors.check(validate_open_fraction(self.core_fraction, &format!("{}.core_fraction", field)));
        errors.check(validate_open_fraction(
            self.satellite_fraction,
            &format!("{}.satellite_fraction", field),
        ));
        errors.ensure(
            (self.core_fraction + self.satellite_fraction - 1.0).abs() <= SLEEVE_SUM_TOLERANCE,
            format!("{}.satellite_fraction", field),
            format!(
                "core_fraction + satellite_fraction must equal 1.0, got {}",
                self.core_fraction + self.satellite_fraction
            ),
        );
        errors.finish()
    }
}

// ============================================================================
// Weighting Configuration
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightingConfig {
    /// Risk-free rate (%) subtracted from annual return when scoring
    pub risk_free_rate: f64,
    /// Floor applied to factor values before proportional weighting
    pub factor_floor: f64,
}

impl Default for WeightingConfig {
    fn default() -> Self {
        Self {
            risk_free_rate: 1.5,
            factor_floor: 1e-4,
        }
    }
}

impl Validate for WeightingConfig {
    fn validate(&self) -> ValidationResult<()> {
        let mut errors = ValidationCollector::new();
        errors.ensure(
            self.risk_free_rate.is_finite(),
            "portfolio.weighting.risk_free_rate",
            "must be finite",
        );
        errors.ensure(
            self.factor_floor.is_finite() && self.factor_floor > 0.0,
            "portfolio.weighting.factor_floor",
            "must be a small positive number",
        );
        errors.finish()
    }
}

// ============================================================================
// HHI Ceilings
// ============================================================================

/// Advisory concentration ceilings per profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HhiCeilings {
    pub conservative: f64,
    pub moderate: f64,
    pub aggressive: f64,
}

impl Default for HhiCeilings {
    fn default() -> Self {
        Self {
            conservative: 0.20,
            moderate: 0.25,
            aggressive: 0.35,
        }
    }
}

impl HhiCeilings {
    pub fn ceiling(&self, profile: RiskProfile) -> f64 {
        match profile {
            RiskProfile::Conservative => self.conservative,
            RiskProfile::Moderate => self.moderate,
            RiskProfile::Aggressive => self.aggressive,
        }
    }
}

impl Validate for HhiCeilings {
    fn validate(&self) -> ValidationResult<()> {
        let mut errors = ValidationCollector::new();
        for profile in RiskProfile::ALL {
            let value = self.ceiling(profile);
            errors.ensure(
                value.is_finite() && value > 0.0 && value <= 1.0,
                format!("portfolio.hhi_ceilings.{}", profile),
                format!("must be within (0, 1], got {}", value),
            );
        }
        errors.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(ConstructionConfig::default().validate().is_ok());
    }

    #[test]
    fn test_sleeve_fractions_must_sum_to_one() {
        let mut config = ConstructionConfig::default();
        config.moderate.hybrid.satellite_fraction = 0.5;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("satellite_fraction"));
    }

    #[test]
    fn test_pure_fund_allocations_follow_profile() {
        let config = ConstructionConfig::default();
        let split = |profile| config.plans(profile).pure_fund.allocation.unwrap();
        assert_eq!(split(RiskProfile::Conservative), FundAllocation::new(0.3, 0.7));
        assert_eq!(split(RiskProfile::Moderate), FundAllocation::new(0.6, 0.4));
        assert_eq!(split(RiskProfile::Aggressive), FundAllocation::new(0.9, 0.1));
        assert!(config.conservative.hybrid.core.allocation.is_none());
    }

    #[test]
    fn test_fund_allocation_must_sum_to_one() {
        let mut config = ConstructionConfig::default();
        config.conservative.pure_fund.allocation = Some(FundAllocation::new(0.3, 0.6));
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("pure_fund.allocation.bond_fraction"));
    }

    #[test]
    fn test_fund_allocation_needs_both_groups() {
        let mut config = ConstructionConfig::default();
        config.moderate.hybrid.core.allocation = Some(FundAllocation::new(0.5, 0.5));
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("hybrid.core.allocation"));
    }

    #[test]
    fn test_min_above_max_rejected() {
        let mut config = ConstructionConfig::default();
        config.aggressive.pure_equity.min_assets = 9;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_sector_cap_rejected() {
        let mut config = ConstructionConfig::default();
        config.conservative.pure_equity.max_per_sector = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_errors_accumulate() {
        let mut config = ConstructionConfig::default();
        config.forced_include_fraction = 1.0;
        config.hhi_ceilings.moderate = 0.0;
        config.weighting.factor_floor = 0.0;
        assert_eq!(config.validate().unwrap_err().count(), 3);
    }

    #[test]
    fn test_aggressive_cap_disabled_by_default() {
        let config = ConstructionConfig::default();
        assert_eq!(config.aggressive.pure_equity.max_per_sector, None);
        assert_eq!(config.conservative.pure_equity.max_per_sector, Some(2));
    }

    #[test]
    fn test_plan_for_mix() {
        let plans = ProfilePlans::moderate();
        assert!(matches!(plans.for_mix(MixType::Hybrid), PlanRef::Hybrid(h) if h.core_fraction == 0.6));
        assert!(matches!(plans.for_mix(MixType::PureEquity), PlanRef::Equity(p) if p.max_assets == 8));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: ConstructionConfig =
            serde_json::from_str(r#"{"forced_include_fraction": 0.2}"#).unwrap();
        assert_eq!(config.forced_include_fraction, 0.2);
        assert_eq!(config.moderate.pure_equity.max_assets, 8);
    }
}
