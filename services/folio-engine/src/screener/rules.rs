//! Predicate and ordering vocabulary shared by the classifiers and builder.
//!
//! A tier is a list of [`Condition`]s. Strict evaluation and the match
//! counting used by diagnostic relaxation both walk the same list, so the
//! two can never disagree about what a sub-condition is.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::asset::AssetRecord;

// ============================================================================
// Metric
// ============================================================================

/// A numeric attribute of an asset that rules can test or sort on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Percentile rank of one-year volatility within the screened equities
    VolatilityPercentile,
    Volatility,
    Beta,
    DividendStreak,
    DividendYield,
    FreeCashFlowPerShare,
    RoeAvg3y,
    RoeLatestQuarter,
    RevenueGrowth,
    MarketCap,
    AgeYears,
    ExpenseRatio,
    AnnualReturn,
}

impl Metric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VolatilityPercentile => "volatility_percentile",
            Self::Volatility => "volatility",
            Self::Beta => "beta",
            Self::DividendStreak => "dividend_streak",
            Self::DividendYield => "dividend_yield",
            Self::FreeCashFlowPerShare => "fcf_per_share",
            Self::RoeAvg3y => "roe_avg_3y",
            Self::RoeLatestQuarter => "roe_latest_quarter",
            Self::RevenueGrowth => "revenue_growth",
            Self::MarketCap => "market_cap",
            Self::AgeYears => "age_years",
            Self::ExpenseRatio => "expense_ratio",
            Self::AnnualReturn => "annual_return",
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An asset paired with the population-relative values it was ranked with.
#[derive(Debug, Clone, Copy)]
pub struct RankedAsset<'a> {
    pub asset: &'a AssetRecord,
    pub volatility_percentile: Option<f64>,
}

impl<'a> RankedAsset<'a> {
    pub fn new(asset: &'a AssetRecord, volatility_percentile: Option<f64>) -> Self {
        Self {
            asset,
            volatility_percentile,
        }
    }

    pub fn value(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::VolatilityPercentile => self.volatility_percentile,
            other => self.asset.metric(other),
        }
    }
}

// ============================================================================
// Condition
// ============================================================================

/// Comparison operator of a condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    /// value <= threshold
    AtMost,
    /// value >= threshold
    AtLeast,
    /// value > threshold
    Above,
    /// value < threshold
    Below,
}

impl Comparison {
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::AtMost => "<=",
            Self::AtLeast => ">=",
            Self::Above => ">",
            Self::Below => "<",
        }
    }

    pub fn holds(&self, value: f64, threshold: f64) -> bool {
        match self {
            Self::AtMost => value <= threshold,
            Self::AtLeast => value >= threshold,
            Self::Above => value > threshold,
            Self::Below => value < threshold,
        }
    }
}

/// One sub-condition of a tier predicate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub metric: Metric,
    pub op: Comparison,
    pub threshold: f64,
}

impl Condition {
    pub const fn new(metric: Metric, op: Comparison, threshold: f64) -> Self {
        Self {
            metric,
            op,
            threshold,
        }
    }

    /// Missing values fail every comparison.
    pub fn holds(&self, value: Option<f64>) -> bool {
        match value {
            Some(v) if v.is_finite() => self.op.holds(v, self.threshold),
            _ => false,
        }
    }

    pub fn evaluate(&self, asset: &RankedAsset<'_>) -> bool {
        self.holds(asset.value(self.metric))
    }
}

impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.metric, self.op.symbol(), self.threshold)
    }
}

/// Number of `conditions` that `asset` satisfies.
pub fn count_matches(conditions: &[Condition], asset: &RankedAsset<'_>) -> usize {
    conditions.iter().filter(|c| c.evaluate(asset)).count()
}

// ============================================================================
// Sort Keys
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Asc,
    Desc,
}

/// One level of a multi-key sort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub metric: Metric,
    pub direction: SortDirection,
}

impl SortKey {
    pub const fn desc(metric: Metric) -> Self {
        Self {
            metric,
            direction: SortDirection::Desc,
        }
    }

    pub const fn asc(metric: Metric) -> Self {
        Self {
            metric,
            direction: SortDirection::Asc,
        }
    }
}

/// Compare two optional values; missing values sort last in either direction.
pub fn compare_values(a: Option<f64>, b: Option<f64>, direction: SortDirection) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => match direction {
            SortDirection::Asc => x.total_cmp(&y),
            SortDirection::Desc => y.total_cmp(&x),
        },
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Lexicographic comparison over `keys`.
pub fn compare_by(keys: &[SortKey], a: &RankedAsset<'_>, b: &RankedAsset<'_>) -> Ordering {
    keys.iter()
        .map(|k| compare_values(a.value(k.metric), b.value(k.metric), k.direction))
        .find(|o| *o != Ordering::Equal)
        .unwrap_or(Ordering::Equal)
}
