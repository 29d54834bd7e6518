//! Portfolio builder.
//!
//! Selects assets from the screened pools according to the plan for the
//! requested (risk profile, mix type), weights them, and assembles a
//! [`Portfolio`]. An under-strength selection is an [`EngineError::Infeasible`]
//! and never a smaller portfolio.
//!
//! ```text
//!   pure-equity:  stock tier pool ──▶ sector cap walk ──▶ weighting
//!   pure-fund:    fund slots ──▶ concat + dedup ──▶ split equity / bond
//!                 ──▶ weighting per group × allocation fraction
//!   hybrid:       core (fund slots) × core_fraction
//!               + satellite (sector cap walk) × satellite_fraction
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use folio_common::logging::generate_trace_id;

use super::adjustment::ForcedInclude;
use super::config::{ConstructionConfig, EquityPlan, FundAllocation, FundOrder, FundPlan, HybridPlan, PlanRef};
use super::types::{CategoryShortfall, Holding, Origin, Portfolio, Sleeve};
use super::weighting::{WeightedAsset, WeightingEngine, WeightingOutcome, WeightingStrategy};
use crate::asset::AssetRecord;
use crate::error::{EngineError, Result};
use crate::profile::{MixType, RiskProfile};
use crate::screener::pool::{PoolKind, PoolMember};
use crate::screener::rules::{compare_values, SortDirection};
use crate::screener::ScreenedPools;

// ============================================================================
// Request
// ============================================================================

#[derive(Debug, Clone)]
pub struct BuildRequest {
    pub risk_profile: RiskProfile,
    pub mix: MixType,
    /// Asset to insert after construction
    pub forced_include: Option<Arc<AssetRecord>>,
}

impl BuildRequest {
    pub fn new(risk_profile: RiskProfile, mix: MixType) -> Self {
        Self {
            risk_profile,
            mix,
            forced_include: None,
        }
    }

    pub fn with_forced_include(mut self, asset: Arc<AssetRecord>) -> Self {
        self.forced_include = Some(asset);
        self
    }
}

/// A selected asset and the pool entry that admitted it.
#[derive(Debug, Clone)]
struct Candidate {
    asset: Arc<AssetRecord>,
    origin: Origin,
}

impl Candidate {
    fn from_member(member: &PoolMember, kind: PoolKind) -> Self {
        Self {
            asset: Arc::clone(&member.asset),
            origin: Origin::Pool {
                kind,
                matched: member.matched,
                conditions: member.conditions,
            },
        }
    }

    fn is_bond(&self) -> bool {
        matches!(self.origin, Origin::Pool { kind: PoolKind::Fund(category), .. } if category.is_bond())
    }
}

/// Holdings of every sleeve before assembly.
#[derive(Debug, Default)]
struct Selection {
    holdings: Vec<Holding>,
    shortfalls: Vec<CategoryShortfall>,
    fell_back: bool,
    dropped: Vec<String>,
}

impl Selection {
    fn add(
        &mut self,
        mut outcome: WeightingOutcome,
        origins: &HashMap<String, Origin>,
        fraction: f64,
        sleeve: Option<Sleeve>,
    ) {
        self.fell_back |= outcome.fell_back;
        self.dropped.append(&mut outcome.dropped);
        self.holdings.extend(to_holdings(outcome, origins, fraction, sleeve));
    }
}

/// Profile and mix of the build in progress, for error reporting.
#[derive(Debug, Clone, Copy)]
struct BuildContext {
    profile: RiskProfile,
    mix: MixType,
    sleeve: Option<Sleeve>,
}

impl BuildContext {
    fn infeasible(&self, accepted: usize, required: usize, reason: impl Into<String>) -> EngineError {
        let err = EngineError::Infeasible {
            profile: self.profile,
            mix: self.mix,
            sleeve: self.sleeve,
            accepted,
            required,
            reason: reason.into(),
        };
        tracing::warn!(error = %err, "Portfolio construction infeasible");
        err
    }

    fn in_sleeve(self, sleeve: Sleeve) -> Self {
        Self {
            sleeve: Some(sleeve),
            ..self
        }
    }
}

// ============================================================================
// Builder
// ============================================================================

pub struct PortfolioBuilder {
    config: ConstructionConfig,
    weighting: WeightingEngine,
    forced: ForcedInclude,
}

impl PortfolioBuilder {
    pub fn new(config: ConstructionConfig) -> Result<Self> {
        let forced = ForcedInclude::new(config.forced_include_fraction)?;
        let weighting = WeightingEngine::new(config.weighting.clone());
        Ok(Self {
            config,
            weighting,
            forced,
        })
    }

    pub fn config(&self) -> &ConstructionConfig {
        &self.config
    }

    pub fn forced_include(&self) -> &ForcedInclude {
        &self.forced
    }

    /// Build a portfolio for `request` from `pools`.
    pub fn build(&self, pools: &ScreenedPools, request: &BuildRequest) -> Result<Portfolio> {
        let build_id = generate_trace_id();
        let span = tracing::info_span!(
            "build",
            build_id = %build_id,
            profile = %request.risk_profile,
            mix = %request.mix
        );
        let _guard = span.enter();

        let ctx = BuildContext {
            profile: request.risk_profile,
            mix: request.mix,
            sleeve: None,
        };

        let plans = self.config.plans(request.risk_profile);
        let mut selection = Selection::default();
        match plans.for_mix(request.mix) {
            PlanRef::Equity(plan) => {
                let (outcome, origins) = self.equity_sleeve(plan, pools, ctx)?;
                selection.add(outcome, &origins, 1.0, None);
            }
            PlanRef::Fund(plan) => {
                let (outcome, origins, shortfalls) = self.fund_sleeve(plan, pools, ctx)?;
                selection.add(outcome, &origins, 1.0, None);
                selection.shortfalls = shortfalls;
            }
            PlanRef::Hybrid(plan) => self.hybrid(plan, pools, ctx, &mut selection)?,
        }

        if !selection.dropped.is_empty() {
            tracing::info!(dropped = ?selection.dropped, "Candidates left out by risk scoring");
        }
        let portfolio = Portfolio::assemble(
            build_id,
            request.risk_profile,
            request.mix,
            selection.holdings,
            selection.shortfalls,
            selection.fell_back,
        )?
        .with_dropped(selection.dropped);

        if portfolio.has_relaxed_holdings() {
            tracing::warn!("Portfolio includes closest-fit holdings from a relaxed tier");
        }

        let portfolio = match &request.forced_include {
            Some(asset) => self.forced.apply(&portfolio, Arc::clone(asset))?,
            None => portfolio,
        };

        tracing::info!(
            count = portfolio.len(),
            hhi = portfolio.hhi(),
            "Portfolio built"
        );
        Ok(portfolio)
    }

    fn hybrid(
        &self,
        plan: &HybridPlan,
        pools: &ScreenedPools,
        ctx: BuildContext,
        selection: &mut Selection,
    ) -> Result<()> {
        let (core, core_origins, shortfalls) =
            self.fund_sleeve(&plan.core, pools, ctx.in_sleeve(Sleeve::Core))?;
        let (satellite, satellite_origins) =
            self.equity_sleeve(&plan.satellite, pools, ctx.in_sleeve(Sleeve::Satellite))?;

        selection.add(core, &core_origins, plan.core_fraction, Some(Sleeve::Core));
        selection.add(satellite, &satellite_origins, plan.satellite_fraction, Some(Sleeve::Satellite));
        selection.shortfalls = shortfalls;
        Ok(())
    }

    // ========================================================================
    // Equity selection
    // ========================================================================

    /// Walk the plan's tier pool under the sector cap.
    fn select_equities(&self, plan: &EquityPlan, pools: &ScreenedPools, ctx: BuildContext) -> Result<Vec<Candidate>> {
        let Some(pool) = pools.stocks.get(plan.tier) else {
            return Err(ctx.infeasible(0, plan.min_assets, format!("no {} stock pool", plan.tier)));
        };

        let mut accepted: Vec<Candidate> = Vec::new();
        let mut per_sector: HashMap<&str, usize> = HashMap::new();
        let mut capped = 0usize;

        for member in pool.members() {
            if accepted.len() >= plan.max_assets {
                break;
            }
            let sector = member.asset.sector_label();
            let held = per_sector.get(sector).copied().unwrap_or(0);
            if let Some(cap) = plan.max_per_sector {
                if held >= cap {
                    capped += 1;
                    continue;
                }
            }
            per_sector.insert(sector, held + 1);
            accepted.push(Candidate::from_member(member, pool.kind()));
        }

        tracing::debug!(
            tier = %plan.tier,
            count = accepted.len(),
            capped,
            sectors = per_sector.len(),
            "Equities selected"
        );

        if accepted.len() < plan.min_assets {
            let reason = if pool.is_empty() {
                format!("{} stock pool is empty", plan.tier)
            } else if capped > 0 {
                format!(
                    "sector cap skipped {} of {} {} candidates",
                    capped,
                    pool.len(),
                    plan.tier
                )
            } else {
                format!("{} stock pool has only {} candidates", plan.tier, pool.len())
            };
            return Err(ctx.infeasible(accepted.len(), plan.min_assets, reason));
        }
        Ok(accepted)
    }

    fn equity_sleeve(
        &self,
        plan: &EquityPlan,
        pools: &ScreenedPools,
        ctx: BuildContext,
    ) -> Result<(WeightingOutcome, HashMap<String, Origin>)> {
        let selected = self.select_equities(plan, pools, ctx)?;
        self.weigh_checked(plan.weighting, selected, plan.min_assets.max(1), ctx)
    }

    // ========================================================================
    // Fund selection
    // ========================================================================

    /// Fill each slot from its category pool, then de-duplicate.
    fn select_funds(
        &self,
        plan: &FundPlan,
        pools: &ScreenedPools,
        ctx: BuildContext,
    ) -> Result<(Vec<Candidate>, Vec<CategoryShortfall>)> {
        let mut selected: Vec<Candidate> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut shortfalls = Vec::new();

        for slot in &plan.slots {
            let members: Vec<&PoolMember> = match pools.funds.get(slot.category) {
                Some(pool) => {
                    let mut members: Vec<&PoolMember> = pool.members().iter().collect();
                    if slot.order == FundOrder::ReturnDesc {
                        members.sort_by(|a, b| {
                            compare_values(a.asset.annual_return, b.asset.annual_return, SortDirection::Desc)
                        });
                    }
                    members
                }
                None => Vec::new(),
            };

            let taken = members.len().min(slot.count);
            if taken < slot.count {
                tracing::warn!(
                    category = %slot.category,
                    requested = slot.count,
                    taken,
                    "Fund category short of requested count"
                );
                shortfalls.push(CategoryShortfall {
                    category: slot.category,
                    requested: slot.count,
                    taken,
                });
            }

            let kind = PoolKind::Fund(slot.category);
            for member in members.into_iter().take(slot.count) {
                if seen.insert(member.asset.id.clone()) {
                    selected.push(Candidate::from_member(member, kind));
                }
            }
        }

        let required = plan.min_assets.max(1);
        if selected.len() < required {
            let reason = if shortfalls.is_empty() {
                "fund slots overlap on the same funds".to_string()
            } else {
                let short: Vec<String> = shortfalls
                    .iter()
                    .map(|s| format!("{} {}/{}", s.category, s.taken, s.requested))
                    .collect();
                format!("fund categories short: {}", short.join(", "))
            };
            return Err(ctx.infeasible(selected.len(), required, reason));
        }
        Ok((selected, shortfalls))
    }

    fn fund_sleeve(
        &self,
        plan: &FundPlan,
        pools: &ScreenedPools,
        ctx: BuildContext,
    ) -> Result<(WeightingOutcome, HashMap<String, Origin>, Vec<CategoryShortfall>)> {
        let (selected, shortfalls) = self.select_funds(plan, pools, ctx)?;
        let required = plan.min_assets.max(1);
        let (outcome, origins) = match plan.allocation {
            Some(allocation) => self.weigh_allocated(plan.weighting, allocation, selected, required, ctx)?,
            None => self.weigh_checked(plan.weighting, selected, required, ctx)?,
        };
        Ok((outcome, origins, shortfalls))
    }

    /// Weight equity funds and bond funds separately, then scale each group
    /// by its allocation fraction. A group with no funds passes its fraction
    /// to the other.
    fn weigh_allocated(
        &self,
        strategy: WeightingStrategy,
        allocation: FundAllocation,
        selected: Vec<Candidate>,
        required: usize,
        ctx: BuildContext,
    ) -> Result<(WeightingOutcome, HashMap<String, Origin>)> {
        let total = selected.len();
        let (bonds, equities): (Vec<Candidate>, Vec<Candidate>) =
            selected.into_iter().partition(Candidate::is_bond);

        let (equity_fraction, bond_fraction) = match (equities.is_empty(), bonds.is_empty()) {
            (false, false) => (allocation.equity_fraction, allocation.bond_fraction),
            (true, _) => {
                tracing::warn!(
                    equity_fraction = allocation.equity_fraction,
                    "No equity fund selected, bond funds take the whole allocation"
                );
                (0.0, 1.0)
            }
            (false, true) => {
                tracing::warn!(
                    bond_fraction = allocation.bond_fraction,
                    "No bond fund selected, equity funds take the whole allocation"
                );
                (1.0, 0.0)
            }
        };

        let mut outcome = WeightingOutcome::default();
        let mut origins = HashMap::with_capacity(total);
        for (group, fraction) in [(equities, equity_fraction), (bonds, bond_fraction)] {
            let (part, part_origins) = self.weigh_checked(strategy, group, 0, ctx)?;
            outcome.fell_back |= part.fell_back;
            outcome.dropped.extend(part.dropped);
            outcome.holdings.extend(part.holdings.into_iter().map(|w| WeightedAsset {
                weight: w.weight * fraction,
                asset: w.asset,
            }));
            origins.extend(part_origins);
        }

        if outcome.len() < required {
            return Err(ctx.infeasible(
                outcome.len(),
                required,
                format!("{} weighting left {} of {} selected funds", strategy, outcome.len(), total),
            ));
        }
        Ok((outcome, origins))
    }

    // ========================================================================
    // Weighting
    // ========================================================================

    /// Weight a selection; risk scoring may drop assets, so re-check strength.
    fn weigh_checked(
        &self,
        strategy: WeightingStrategy,
        selected: Vec<Candidate>,
        required: usize,
        ctx: BuildContext,
    ) -> Result<(WeightingOutcome, HashMap<String, Origin>)> {
        let assets: Vec<Arc<AssetRecord>> = selected.iter().map(|c| Arc::clone(&c.asset)).collect();
        let outcome = self.weighting.weigh(strategy, &assets);
        if outcome.len() < required {
            return Err(ctx.infeasible(
                outcome.len(),
                required,
                format!(
                    "{} weighting left {} of {} selected assets",
                    strategy,
                    outcome.len(),
                    selected.len()
                ),
            ));
        }

        let origins = selected
            .into_iter()
            .map(|c| (c.asset.id.clone(), c.origin))
            .collect();
        Ok((outcome, origins))
    }
}

/// Scale a sleeve's weights by `fraction` and attach origins.
fn to_holdings(
    outcome: WeightingOutcome,
    origins: &HashMap<String, Origin>,
    fraction: f64,
    sleeve: Option<Sleeve>,
) -> Vec<Holding> {
    outcome
        .holdings
        .into_iter()
        .filter_map(|w| {
            let origin = *origins.get(&w.asset.id)?;
            Some(Holding {
                asset: w.asset,
                weight: w.weight * fraction,
                sleeve,
                origin,
            })
        })
        .collect()
}
