//! Universe screening.
//!
//! Turns a raw universe into the pools the portfolio builder draws from.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                         Screener                                 │
//! ├──────────────────────────────────────────────────────────────────┤
//! │                                                                  │
//! │  Universe ──▶ ExclusionFilter ──┬──▶ StockPoolClassifier         │
//! │              (FilterStep × 5)   │    conservative/moderate/      │
//! │                                 │    aggressive (+ relaxation)   │
//! │                                 │                                │
//! │                                 └──▶ FundPoolClassifier          │
//! │                                      five keyword categories     │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use folio_engine::screener::{Screener, ScreenerConfig};
//!
//! let screener = Screener::new(&ScreenerConfig::default())?;
//! let pools = screener.screen(&universe);
//! for step in &pools.steps {
//!     println!("{}: {} left", step.rule, step.passed);
//! }
//! ```

pub mod config;
pub mod exclusion;
pub mod fund_pools;
pub mod pool;
pub mod rules;
pub mod stock_pools;

pub use config::{ExclusionConfig, FundScreeningConfig, ScreenerConfig, StockScreeningConfig, TierRule};
pub use exclusion::{ExclusionFilter, ExclusionOutcome, ExclusionRule, FilterStep};
pub use fund_pools::{FundPoolClassifier, FundPools};
pub use pool::{AssetPool, FundCategory, PoolKind, PoolMember, PoolMode};
pub use rules::{Comparison, Condition, Metric, SortDirection, SortKey};
pub use stock_pools::{volatility_percentiles, StockPoolClassifier, StockPools};

use serde::Serialize;
use std::sync::Arc;

use crate::asset::{AssetRecord, Universe};
use crate::error::Result;

/// Everything the builder needs from one screening pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScreenedPools {
    /// Exclusion funnel
    pub steps: Vec<FilterStep>,
    /// Assets that passed every exclusion
    #[serde(skip)]
    pub survivors: Vec<Arc<AssetRecord>>,
    pub stocks: StockPools,
    pub funds: FundPools,
}

impl ScreenedPools {
    pub fn pool(&self, kind: PoolKind) -> Option<&AssetPool> {
        match kind {
            PoolKind::Stock(tier) => self.stocks.get(tier),
            PoolKind::Fund(category) => self.funds.get(category),
        }
    }

    /// Every pool, stock tiers first.
    pub fn pools(&self) -> impl Iterator<Item = &AssetPool> {
        self.stocks
            .iter()
            .map(|(_, p)| p)
            .chain(self.funds.iter().map(|(_, p)| p))
    }
}

/// Exclusion plus both classifiers, compiled once from a [`ScreenerConfig`].
pub struct Screener {
    exclusion: ExclusionFilter,
    stocks: StockPoolClassifier,
    funds: FundPoolClassifier,
}

impl Screener {
    pub fn new(config: &ScreenerConfig) -> Result<Self> {
        Ok(Self {
            exclusion: ExclusionFilter::new(config.exclusion.clone())?,
            stocks: StockPoolClassifier::new(config.stocks.clone()),
            funds: FundPoolClassifier::new(&config.funds)?,
        })
    }

    pub fn screen(&self, universe: &Universe) -> ScreenedPools {
        self.screen_assets(universe.assets())
    }

    pub fn screen_assets(&self, assets: &[Arc<AssetRecord>]) -> ScreenedPools {
        let ExclusionOutcome { survivors, steps } = self.exclusion.apply(assets);
        let stocks = self.stocks.classify(&survivors);
        let funds = self.funds.classify(&survivors);

        tracing::info!(
            input = assets.len(),
            count = survivors.len(),
            relaxed = stocks.any_relaxed(),
            "Universe screened"
        );

        ScreenedPools {
            steps,
            survivors,
            stocks,
            funds,
        }
    }
}
