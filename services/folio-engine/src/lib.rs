//! Folio Engine Library
//!
//! Screens a universe of equities and funds against risk-tolerance rules and
//! assembles weighted portfolios under diversification and concentration
//! limits.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                         folio-engine                                │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │  Universe ──▶ ExclusionFilter ──┬──▶ StockPoolClassifier ──┐        │
//! │                                 └──▶ FundPoolClassifier ───┤        │
//! │                                                            ▼        │
//! │              ForcedInclude ◀── PortfolioBuilder ◀── WeightingEngine │
//! │                    │                   │                            │
//! │                    └───────▶ Portfolio (weights, HHI)               │
//! │                                   │                                 │
//! │                     ConcentrationAuditor / PortfolioReport          │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Concepts
//!
//! ## Risk tiers
//! - Volatility is ranked once over all screened equities
//! - Conservative ≤ 30th percentile, moderate strictly between, aggressive ≥ 70th
//! - A tier with no strict match returns closest fits with their match counts
//!
//! ## Mix types
//! - **pure-equity**: one tier pool under a per-sector cap
//! - **pure-fund**: fixed counts from keyword-tagged fund categories
//! - **hybrid**: fund core and equity satellite, each weighted to 1 then scaled
//!
//! The engine is synchronous and holds only immutable configuration, so one
//! [`PortfolioEngine`] can serve concurrent requests.

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod asset;
pub mod config;
pub mod error;
pub mod portfolio;
pub mod profile;
pub mod report;
pub mod screener;

pub use asset::{AssetClass, AssetRecord, Universe};
pub use config::EngineConfig;
pub use error::{EngineError, Result};
pub use portfolio::{BuildRequest, ConcentrationReview, Portfolio};
pub use profile::{MixType, RiskProfile};
pub use report::{PortfolioReport, ReportFormat};
pub use screener::ScreenedPools;

use folio_common::validation::Validate;
use std::sync::Arc;

use crate::portfolio::{ConcentrationAuditor, PortfolioBuilder};
use crate::screener::Screener;

/// Screening and construction behind one validated configuration.
pub struct PortfolioEngine {
    config: EngineConfig,
    screener: Screener,
    builder: PortfolioBuilder,
    auditor: ConcentrationAuditor,
}

impl PortfolioEngine {
    /// Validate `config` and compile its patterns.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let screener = Screener::new(&config.screener)?;
        let builder = PortfolioBuilder::new(config.portfolio.clone())?;
        let auditor = ConcentrationAuditor::new(config.portfolio.hhi_ceilings.clone());

        tracing::debug!(
            tiers = config.screener.stocks.tiers.len(),
            fund_categories = config.screener.funds.categories.len(),
            "Portfolio engine ready"
        );

        Ok(Self {
            config,
            screener,
            builder,
            auditor,
        })
    }

    pub fn with_defaults() -> Result<Self> {
        Self::new(EngineConfig::default())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Exclusion filter plus stock and fund classification.
    pub fn screen(&self, universe: &Universe) -> ScreenedPools {
        self.screener.screen(universe)
    }

    pub fn build(&self, pools: &ScreenedPools, request: &BuildRequest) -> Result<Portfolio> {
        self.builder.build(pools, request)
    }

    /// Insert or replace `asset` at the configured reserved fraction.
    pub fn force_include(&self, portfolio: &Portfolio, asset: Arc<AssetRecord>) -> Result<Portfolio> {
        self.builder.forced_include().apply(portfolio, asset)
    }

    /// Advisory concentration review.
    pub fn review(&self, portfolio: &Portfolio) -> ConcentrationReview {
        self.auditor.review(portfolio)
    }
}
