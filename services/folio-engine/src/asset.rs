//! Asset records and the screened universe.
//!
//! Records are owned by the upstream market-data collaborator and are only
//! read here. They are shared as `Arc<AssetRecord>` so that pools and
//! portfolios built for concurrent requests never copy or mutate them.

use folio_common::{Error, Result, ResultExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::screener::rules::Metric;

// ============================================================================
// Asset Class
// ============================================================================

/// Structural class of an instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetClass {
    /// Individual listed company
    Equity,
    /// Exchange-traded or mutual fund
    Fund,
}

impl std::fmt::Display for AssetClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Equity => write!(f, "equity"),
            Self::Fund => write!(f, "fund"),
        }
    }
}

// ============================================================================
// Asset Record
// ============================================================================

/// Sector label used for holdings without one.
pub const UNCLASSIFIED_SECTOR: &str = "unclassified";

/// One tradable instrument.
///
/// Numeric fields are `None` when the source value was missing or
/// unparseable; they are never coerced to zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetRecord {
    /// Unique identifier (ticker / fund code)
    pub id: String,
    /// Display name
    pub name: String,
    /// Equity or fund
    pub asset_class: AssetClass,
    /// Sector / industry label
    #[serde(default)]
    pub sector: Option<String>,
    /// Market capitalization (billions)
    #[serde(default)]
    pub market_cap: Option<f64>,
    /// One-year annualized volatility (%)
    #[serde(default)]
    pub volatility_1y: Option<f64>,
    /// One-year beta
    #[serde(default)]
    pub beta_1y: Option<f64>,
    /// Consecutive years with a cash dividend
    #[serde(default)]
    pub dividend_streak_years: Option<f64>,
    /// Dividend yield at last price (%)
    #[serde(default)]
    pub dividend_yield: Option<f64>,
    /// Trailing-four-quarter free cash flow per share
    #[serde(default)]
    pub fcf_per_share_4q: Option<f64>,
    /// Three-year average ROE (%)
    #[serde(default)]
    pub roe_avg_3y: Option<f64>,
    /// Latest single-quarter ROE (%)
    #[serde(default)]
    pub roe_latest_quarter: Option<f64>,
    /// Accumulated year-over-year revenue growth (%)
    #[serde(default)]
    pub revenue_growth_yoy: Option<f64>,
    /// Years since listing (equity) or founding (fund)
    #[serde(default, alias = "founding_years", alias = "listing_years")]
    pub age_years: Option<f64>,
    /// Annual expense ratio (%), funds only
    #[serde(default)]
    pub expense_ratio: Option<f64>,
    /// Annual total return (%), funds only
    #[serde(default)]
    pub annual_return: Option<f64>,
}

impl AssetRecord {
    /// Create a record with every numeric field missing.
    pub fn new(id: impl Into<String>, name: impl Into<String>, asset_class: AssetClass) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            asset_class,
            sector: None,
            market_cap: None,
            volatility_1y: None,
            beta_1y: None,
            dividend_streak_years: None,
            dividend_yield: None,
            fcf_per_share_4q: None,
            roe_avg_3y: None,
            roe_latest_quarter: None,
            revenue_growth_yoy: None,
            age_years: None,
            expense_ratio: None,
            annual_return: None,
        }
    }

    /// Set the sector label.
    pub fn with_sector(mut self, sector: impl Into<String>) -> Self {
        self.sector = Some(sector.into());
        self
    }

    /// Set one numeric field. Derived metrics are ignored.
    pub fn with_metric(mut self, metric: Metric, value: f64) -> Self {
        let slot = match metric {
            Metric::MarketCap => &mut self.market_cap,
            Metric::Volatility => &mut self.volatility_1y,
            Metric::Beta => &mut self.beta_1y,
            Metric::DividendStreak => &mut self.dividend_streak_years,
            Metric::DividendYield => &mut self.dividend_yield,
            Metric::FreeCashFlowPerShare => &mut self.fcf_per_share_4q,
            Metric::RoeAvg3y => &mut self.roe_avg_3y,
            Metric::RoeLatestQuarter => &mut self.roe_latest_quarter,
            Metric::RevenueGrowth => &mut self.revenue_growth_yoy,
            Metric::AgeYears => &mut self.age_years,
            Metric::ExpenseRatio => &mut self.expense_ratio,
            Metric::AnnualReturn => &mut self.annual_return,
            Metric::VolatilityPercentile => return self,
        };
        *slot = Some(value);
        self
    }

    /// Read a stored metric. Non-finite values read as missing.
    ///
    /// `VolatilityPercentile` is relative to a population and is never stored.
    pub fn metric(&self, metric: Metric) -> Option<f64> {
        let raw = match metric {
            Metric::MarketCap => self.market_cap,
            Metric::Volatility => self.volatility_1y,
            Metric::Beta => self.beta_1y,
            Metric::DividendStreak => self.dividend_streak_years,
            Metric::DividendYield => self.dividend_yield,
            Metric::FreeCashFlowPerShare => self.fcf_per_share_4q,
            Metric::RoeAvg3y => self.roe_avg_3y,
            Metric::RoeLatestQuarter => self.roe_latest_quarter,
            Metric::RevenueGrowth => self.revenue_growth_yoy,
            Metric::AgeYears => self.age_years,
            Metric::ExpenseRatio => self.expense_ratio,
            Metric::AnnualReturn => self.annual_return,
            Metric::VolatilityPercentile => None,
        };
        raw.filter(|v| v.is_finite())
    }

    pub fn is_equity(&self) -> bool {
        self.asset_class == AssetClass::Equity
    }

    pub fn is_fund(&self) -> bool {
        self.asset_class == AssetClass::Fund
    }

    /// Sector label, falling back to [`UNCLASSIFIED_SECTOR`].
    pub fn sector_label(&self) -> &str {
        self.sector
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(UNCLASSIFIED_SECTOR)
    }
}

// ============================================================================
// Universe
// ============================================================================

/// Immutable table of asset records keyed by identifier.
#[derive(Debug, Clone, Default)]
pub struct Universe {
    assets: Vec<Arc<AssetRecord>>,
    index: HashMap<String, usize>,
}

impl Universe {
    /// Build a universe, keeping the first record seen for each identifier.
    pub fn from_records(records: impl IntoIterator<Item = AssetRecord>) -> Self {
        let mut assets = Vec::new();
        let mut index = HashMap::new();
        let mut duplicates = 0usize;

        for mut record in records {
            record.id = record.id.trim().to_string();
            if index.contains_key(&record.id) {
                duplicates += 1;
                continue;
            }
            index.insert(record.id.clone(), assets.len());
            assets.push(Arc::new(record));
        }

        if duplicates > 0 {
            tracing::warn!(duplicates, kept = assets.len(), "Dropped duplicate asset identifiers");
        }

        Self { assets, index }
    }

    /// Load a JSON array of asset records.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read universe from {}", path.display()))?;
        let records: Vec<AssetRecord> = serde_json::from_str(&content)
            .context(format!("Failed to parse universe from {}", path.display()))?;

        let universe = Self::from_records(records);
        tracing::info!(
            path = %path.display(),
            count = universe.len(),
            "Universe loaded"
        );
        Ok(universe)
    }

    pub fn get(&self, id: &str) -> Option<&Arc<AssetRecord>> {
        self.index.get(id.trim()).map(|&i| &self.assets[i])
    }

    /// Like [`Universe::get`], but a missing identifier is an error.
    pub fn require(&self, id: &str) -> Result<&Arc<AssetRecord>> {
        self.get(id)
            .ok_or_else(|| Error::NotFound(format!("asset {} is not in the universe", id.trim())))
    }

    pub fn assets(&self) -> &[Arc<AssetRecord>] {
        &self.assets
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<AssetRecord>> {
        self.assets.iter()
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

impl FromIterator<AssetRecord> for Universe {
    fn from_iter<I: IntoIterator<Item = AssetRecord>>(iter: I) -> Self {
        Self::from_records(iter)
    }
}
