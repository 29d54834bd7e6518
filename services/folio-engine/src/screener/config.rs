//! Screener configuration module.
//!
//! Defines the exclusion rules, stock tier predicates and fund keyword lists.
//! Defaults reproduce the institutional rule book; every value can be
//! overridden per request by building a different [`ScreenerConfig`].

use serde::{Deserialize, Serialize};

use folio_common::validation::{
    validate_unit_interval, Validate, ValidationCollector, ValidationError, ValidationResult,
};

use super::pool::FundCategory;
use super::rules::{Comparison, Condition, Metric, SortKey};
use crate::profile::RiskProfile;

// ============================================================================
// Main Screener Configuration
// ============================================================================

/// Configuration for every classification stage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenerConfig {
    /// Hard exclusions applied to the raw universe
    pub exclusion: ExclusionConfig,

    /// Stock tier predicates
    pub stocks: StockScreeningConfig,

    /// Fund keyword categories
    pub funds: FundScreeningConfig,
}

impl Validate for ScreenerConfig {
    fn validate(&self) -> ValidationResult<()> {
        let mut errors = ValidationCollector::new();
        errors.check(self.exclusion.validate());
        errors.check(self.stocks.validate());
        errors.check(self.funds.validate());
        errors.finish()
    }
}

// ============================================================================
// Exclusion Configuration
// ============================================================================

/// Hard exclusions that remove structurally ineligible assets.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExclusionConfig {
    /// Minimum market cap (billions); missing market cap is excluded
    pub min_market_cap: f64,

    /// Minimum years since listing / founding; missing age is excluded
    pub min_age_years: f64,

    /// Equities with trailing-4Q FCF per share below this are excluded
    pub min_equity_fcf_per_share: f64,

    /// Regex matched against fund names to detect leveraged / inverse products
    pub leveraged_name_pattern: String,
}

impl Default for ExclusionConfig {
    fn default() -> Self {
        Self {
            min_market_cap: 50.0,
            min_age_years: 1.0,
            min_equity_fcf_per_share: 0.0,
            leveraged_name_pattern: default_leveraged_pattern(),
        }
    }
}

fn default_leveraged_pattern() -> String {
    r"(?i)槓桿|杠杆|反向|正2|反1|leveraged|inverse|ultra\s*short|\b[23]x\b|-1x\b".to_string()
}

impl Validate for ExclusionConfig {
    fn validate(&self) -> ValidationResult<()> {
        let mut errors = ValidationCollector::new();
        errors.ensure(
            self.min_market_cap.is_finite() && self.min_market_cap >= 0.0,
            "exclusion.min_market_cap",
            "must be a non-negative number",
        );
        errors.ensure(
            self.min_age_years.is_finite() && self.min_age_years >= 0.0,
            "exclusion.min_age_years",
            "must be a non-negative number",
        );
        errors.ensure(
            self.min_equity_fcf_per_share.is_finite(),
            "exclusion.min_equity_fcf_per_share",
            "must be finite",
        );
        if let Err(e) = regex::Regex::new(&self.leveraged_name_pattern) {
            errors.push(ValidationError::InvalidValue {
                field: "exclusion.leveraged_name_pattern".into(),
                reason: e.to_string(),
            });
        }
        errors.finish()
    }
}

// ============================================================================
// Stock Tier Configuration
// ============================================================================

/// Predicate and ordering for one stock tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierRule {
    pub tier: RiskProfile,
    /// Sub-conditions; all must hold for a strict match
    pub conditions: Vec<Condition>,
    /// Pool ordering
    pub sort_by: Vec<SortKey>,
}

impl TierRule {
    pub fn condition_count(&self) -> usize {
        self.conditions.len()
    }
}

/// Stock tier configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StockScreeningConfig {
    pub tiers: Vec<TierRule>,

    /// Diagnostic relaxation admits assets matching at least
    /// `max(1, M - relaxation_slack)` of a tier's M conditions.
    pub relaxation_slack: usize,
}

impl Default for StockScreeningConfig {
    fn default() -> Self {
        Self {
            tiers: vec![
                conservative_tier(),
                moderate_tier(),
                aggressive_tier(),
            ],
            relaxation_slack: 2,
        }
    }
}

impl StockScreeningConfig {
    pub fn tier(&self, tier: RiskProfile) -> Option<&TierRule> {
        self.tiers.iter().find(|t| t.tier == tier)
    }

    /// Minimum match count used when a tier of `m` conditions relaxes.
    pub fn relaxed_minimum(&self, m: usize) -> usize {
        m.saturating_sub(self.relaxation_slack).max(1)
    }
}

/// Low volatility, low beta, long dividend record, positive cash flow.
pub fn conservative_tier() -> TierRule {
    TierRule {
        tier: RiskProfile::Conservative,
        conditions: vec![
            Condition::new(Metric::VolatilityPercentile, Comparison::AtMost, 0.30),
            Condition::new(Metric::Beta, Comparison::AtMost, 1.0),
            Condition::new(Metric::DividendStreak, Comparison::Above, 10.0),
            Condition::new(Metric::FreeCashFlowPerShare, Comparison::Above, 0.0),
        ],
        sort_by: vec![
            SortKey::desc(Metric::DividendYield),
            SortKey::desc(Metric::MarketCap),
        ],
    }
}

/// Mid-band volatility with steady profitability and growth.
///
/// The band is open at both ends so that assets sitting exactly on the 30th
/// or 70th percentile belong to the adjacent tier only.
pub fn moderate_tier() -> TierRule {
    TierRule {
        tier: RiskProfile::Moderate,
        conditions: vec![
            Condition::new(Metric::VolatilityPercentile, Comparison::Above, 0.30),
            Condition::new(Metric::VolatilityPercentile, Comparison::Below, 0.70),
            Condition::new(Metric::RoeAvg3y, Comparison::Above, 5.0),
            Condition::new(Metric::RevenueGrowth, Comparison::Above, 0.0),
        ],
        sort_by: vec![SortKey::desc(Metric::RoeAvg3y), SortKey::desc(Metric::MarketCap)],
    }
}

/// High volatility, high beta, fast revenue growth.
pub fn aggressive_tier() -> TierRule {
    TierRule {
        tier: RiskProfile::Aggressive,
        conditions: vec![
            Condition::new(Metric::VolatilityPercentile, Comparison::AtLeast, 0.70),
            Condition::new(Metric::Beta, Comparison::Above, 1.1),
            Condition::new(Metric::RevenueGrowth, Comparison::Above, 15.0),
        ],
        sort_by: vec![
            SortKey::desc(Metric::RevenueGrowth),
            SortKey::desc(Metric::RoeLatestQuarter),
        ],
    }
}

impl Validate for StockScreeningConfig {
    fn validate(&self) -> ValidationResult<()> {
        let mut errors = ValidationCollector::new();

        for profile in RiskProfile::ALL {
            let count = self.tiers.iter().filter(|t| t.tier == profile).count();
            if count == 0 {
                errors.push(ValidationError::MissingField {
                    field: format!("stocks.tiers[{}]", profile),
                });
            } else if count > 1 {
                errors.push(ValidationError::Conflict {
                    reason: format!("stock tier {} is defined {} times", profile, count),
                });
            }
        }

        for rule in &self.tiers {
            for condition in &rule.conditions {
                errors.ensure(
                    condition.threshold.is_finite(),
                    format!("stocks.tiers[{}].conditions", rule.tier),
                    format!("threshold of `{}` must be finite", condition),
                );
                if condition.metric == Metric::VolatilityPercentile {
                    errors.check(validate_unit_interval(
                        condition.threshold,
                        &format!("stocks.tiers[{}].volatility_percentile", rule.tier),
                    ));
                }
            }
        }

        errors.finish()
    }
}

// ============================================================================
// Fund Category Configuration
// ============================================================================

/// Keyword rule for one fund category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundCategoryRule {
    pub category: FundCategory,
    /// Case-insensitive substrings matched against the fund name
    pub keywords: Vec<String>,
    /// Funds matching any of these categories' keywords are left out
    #[serde(default)]
    pub exclude_matches_of: Vec<FundCategory>,
}

/// Fund category configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FundScreeningConfig {
    pub categories: Vec<FundCategoryRule>,
}

impl FundScreeningConfig {
    pub fn rule(&self, category: FundCategory) -> Option<&FundCategoryRule> {
        self.categories.iter().find(|r| r.category == category)
    }
}

fn keywords(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_string()).collect()
}

impl Default for FundScreeningConfig {
    fn default() -> Self {
        Self {
            categories: vec![
                FundCategoryRule {
                    category: FundCategory::MarketCap,
                    keywords: keywords(&[
                        "台灣50",
                        "MSCI台灣",
                        "S&P 500",
                        "US 500",
                        "臺灣ESG永續",
                        "公司治理",
                        "道瓊",
                        "NASDAQ",
                        "市值",
                        "Total Market",
                    ]),
                    exclude_matches_of: Vec::new(),
                },
                FundCategoryRule {
                    category: FundCategory::HighDividend,
                    keywords: keywords(&["高股息", "高息", "優息", "High Dividend", "Dividend Yield"]),
                    exclude_matches_of: Vec::new(),
                },
                FundCategoryRule {
                    category: FundCategory::Thematic,
                    keywords: keywords(&[
                        "半導體",
                        "科技",
                        "人工智慧",
                        "Artificial Intelligence",
                        "5G",
                        "電動車",
                        "潔淨能源",
                        "元宇宙",
                        "供應鏈",
                        "資訊",
                        "網路",
                        "智能",
                        "綠能",
                        "金融",
                        "REITs",
                        "Semiconductor",
                        "Technology",
                    ]),
                    exclude_matches_of: vec![FundCategory::HighDividend],
                },
                FundCategoryRule {
                    category: FundCategory::GovernmentBond,
                    keywords: keywords(&["公債", "美債", "政府債", "Treasury", "Government Bond"]),
                    exclude_matches_of: Vec::new(),
                },
                FundCategoryRule {
                    category: FundCategory::CorporateBond,
                    keywords: keywords(&[
                        "公司債",
                        "金融債",
                        "產業債",
                        "企業債",
                        "投等債",
                        "投資級",
                        "Investment Grade",
                        "Corporate Bond",
                    ]),
                    exclude_matches_of: Vec::new(),
                },
            ],
        }
    }
}

impl Validate for FundScreeningConfig {
    fn validate(&self) -> ValidationResult<()> {
        let mut errors = ValidationCollector::new();

        for category in FundCategory::ALL {
            match self.categories.iter().filter(|r| r.category == category).count() {
                0 => errors.push(ValidationError::MissingField {
                    field: format!("funds.categories[{}]", category),
                }),
                1 => {}
                n => errors.push(ValidationError::Conflict {
                    reason: format!("fund category {} is defined {} times", category, n),
                }),
            }
        }

        for rule in &self.categories {
            errors.ensure(
                rule.keywords.iter().any(|k| !k.trim().is_empty()),
                format!("funds.categories[{}].keywords", rule.category),
                "must contain at least one non-empty keyword",
            );
            errors.ensure(
                !rule.exclude_matches_of.contains(&rule.category),
                format!("funds.categories[{}].exclude_matches_of", rule.category),
                "a category cannot exclude itself",
            );
        }

        if let Some(thematic) = self.rule(FundCategory::Thematic) {
            errors.ensure(
                thematic.exclude_matches_of.contains(&FundCategory::HighDividend),
                "funds.categories[thematic/sector].exclude_matches_of",
                "must exclude high-dividend funds",
            );
        }

        errors.finish()
    }
}
