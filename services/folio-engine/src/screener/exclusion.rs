//! Exclusion filter.
//!
//! Removes structurally ineligible assets from the raw universe before any
//! classification runs:
//!
//! ```text
//!   universe ──▶ unique id ──▶ leveraged name ──▶ market cap ──▶ age ──▶ equity FCF ──▶ survivors
//!                   │               │                 │           │           │
//!                   ▼               ▼                 ▼           ▼           ▼
//!               FilterStep      FilterStep        FilterStep  FilterStep  FilterStep
//! ```
//!
//! Each rule is an independent predicate, so the survivor set does not
//! depend on rule order. Missing numeric fields fail every floor.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

use super::config::ExclusionConfig;
use crate::asset::AssetRecord;
use crate::error::Result;

// ============================================================================
// Exclusion Rule
// ============================================================================

/// One hard exclusion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionRule {
    /// Later records sharing an identifier
    DuplicateId,
    /// Fund names matching the leveraged / inverse pattern
    LeveragedName,
    /// Market cap below the floor, or missing
    MarketCapFloor,
    /// Listing / founding age below the floor, or missing
    AgeFloor,
    /// Equities with negative or missing trailing free cash flow
    NegativeFreeCashFlow,
}

impl ExclusionRule {
    /// Rules in evaluation order.
    pub const ALL: [ExclusionRule; 5] = [
        Self::DuplicateId,
        Self::LeveragedName,
        Self::MarketCapFloor,
        Self::AgeFloor,
        Self::NegativeFreeCashFlow,
    ];
}

impl std::fmt::Display for ExclusionRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateId => write!(f, "unique identifier"),
            Self::LeveragedName => write!(f, "leveraged/inverse fund"),
            Self::MarketCapFloor => write!(f, "market cap floor"),
            Self::AgeFloor => write!(f, "listing age floor"),
            Self::NegativeFreeCashFlow => write!(f, "equity free cash flow"),
        }
    }
}

// ============================================================================
// Filter Step
// ============================================================================

/// Funnel statistics for one rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterStep {
    /// Rule applied
    pub rule: ExclusionRule,
    /// Assets that survived this rule
    pub passed: usize,
    /// Assets removed by this rule
    pub eliminated: usize,
    /// Elimination rate (%)
    pub elimination_rate: f64,
}

impl FilterStep {
    pub fn new(rule: ExclusionRule, input_count: usize, passed_count: usize) -> Self {
        let eliminated = input_count.saturating_sub(passed_count);
        let elimination_rate = if input_count > 0 {
            (eliminated as f64 / input_count as f64) * 100.0
        } else {
            0.0
        };

        Self {
            rule,
            passed: passed_count,
            eliminated,
            elimination_rate,
        }
    }
}

/// Survivors of the exclusion filter plus the funnel that produced them.
#[derive(Debug, Clone, Default)]
pub struct ExclusionOutcome {
    pub survivors: Vec<Arc<AssetRecord>>,
    pub steps: Vec<FilterStep>,
}

impl ExclusionOutcome {
    pub fn equities(&self) -> impl Iterator<Item = &Arc<AssetRecord>> {
        self.survivors.iter().filter(|a| a.is_equity())
    }

    pub fn funds(&self) -> impl Iterator<Item = &Arc<AssetRecord>> {
        self.survivors.iter().filter(|a| a.is_fund())
    }

    pub fn len(&self) -> usize {
        self.survivors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.survivors.is_empty()
    }
}

// ============================================================================
// Exclusion Filter
// ============================================================================

pub struct ExclusionFilter {
    config: ExclusionConfig,
    leveraged: Regex,
}

impl ExclusionFilter {
    /// Compile the leveraged-name pattern once.
    pub fn new(config: ExclusionConfig) -> Result<Self> {
        let leveraged = Regex::new(&config.leveraged_name_pattern)?;
        Ok(Self { config, leveraged })
    }

    pub fn with_defaults() -> Result<Self> {
        Self::new(ExclusionConfig::default())
    }

    pub fn config(&self) -> &ExclusionConfig {
        &self.config
    }

    pub fn is_leveraged_name(&self, name: &str) -> bool {
        self.leveraged.is_match(name)
    }

    /// Whether `asset` survives `rule`. Duplicates are handled by [`Self::apply`].
    pub fn passes(&self, rule: ExclusionRule, asset: &AssetRecord) -> bool {
        match rule {
            ExclusionRule::DuplicateId => true,
            ExclusionRule::LeveragedName => !(asset.is_fund() && self.is_leveraged_name(&asset.name)),
            ExclusionRule::MarketCapFloor => {
                at_least(asset.market_cap, self.config.min_market_cap)
            }
            ExclusionRule::AgeFloor => at_least(asset.age_years, self.config.min_age_years),
            ExclusionRule::NegativeFreeCashFlow => {
                !asset.is_equity()
                    || at_least(asset.fcf_per_share_4q, self.config.min_equity_fcf_per_share)
            }
        }
    }

    /// Apply every rule, logging the survivor count after each.
    pub fn apply(&self, assets: &[Arc<AssetRecord>]) -> ExclusionOutcome {
        let mut steps = Vec::with_capacity(ExclusionRule::ALL.len());

        let mut seen: HashSet<&str> = HashSet::with_capacity(assets.len());
        let mut survivors: Vec<Arc<AssetRecord>> = Vec::with_capacity(assets.len());
        for asset in assets {
            if seen.insert(asset.id.as_str()) {
                survivors.push(Arc::clone(asset));
            }
        }
        steps.push(self.record(ExclusionRule::DuplicateId, assets.len(), survivors.len()));

        for rule in &ExclusionRule::ALL[1..] {
            let before = survivors.len();
            survivors.retain(|a| self.passes(*rule, a));
            steps.push(self.record(*rule, before, survivors.len()));
        }

        ExclusionOutcome { survivors, steps }
    }

    fn record(&self, rule: ExclusionRule, input: usize, passed: usize) -> FilterStep {
        let step = FilterStep::new(rule, input, passed);
        tracing::info!(
            stage = %rule,
            count = step.passed,
            eliminated = step.eliminated,
            "Exclusion rule applied"
        );
        step
    }
}

fn at_least(value: Option<f64>, floor: f64) -> bool {
    matches!(value, Some(v) if v.is_finite() && v >= floor)
}
