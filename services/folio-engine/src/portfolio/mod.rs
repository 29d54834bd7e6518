//! Portfolio construction.
//!
//! # Components
//!
//! - **Builder**: selects from the screened pools per (risk profile, mix type)
//! - **Weighting**: equal, factor, rank and risk-scored strategies
//! - **Concentration**: HHI and the advisory review
//! - **Adjustment**: forced include of one external asset
//!
//! # Usage
//!
//! ```ignore
//! use folio_engine::portfolio::{BuildRequest, ConstructionConfig, PortfolioBuilder};
//!
//! let builder = PortfolioBuilder::new(ConstructionConfig::default())?;
//! let request = BuildRequest::new(RiskProfile::Moderate, MixType::Hybrid);
//! let portfolio = builder.build(&pools, &request)?;
//! println!("HHI {:.4}", portfolio.hhi());
//! ```

pub mod adjustment;
pub mod builder;
pub mod concentration;
pub mod config;
pub mod types;
pub mod weighting;

pub use adjustment::ForcedInclude;
pub use builder::{BuildRequest, PortfolioBuilder};
pub use concentration::{hhi, ConcentrationAuditor, ConcentrationReview};
pub use config::{
    ConstructionConfig, EquityPlan, FundAllocation, FundOrder, FundPlan, FundSlot, HhiCeilings, HybridPlan,
    ProfilePlans, WeightingConfig,
};
pub use types::{CategoryShortfall, Holding, Origin, Portfolio, Sleeve, WEIGHT_TOLERANCE};
pub use weighting::{ScoredWeighting, WeightedAsset, WeightingEngine, WeightingOutcome, WeightingStrategy};
