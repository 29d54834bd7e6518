//! Property tests for screening and construction invariants.

use std::collections::HashSet;
use std::sync::Arc;

use proptest::prelude::*;

use folio_engine::portfolio::{
    ForcedInclude, Holding, Origin, WeightingConfig, WeightingEngine, WeightingStrategy,
};
use folio_engine::screener::{
    ExclusionFilter, Metric, PoolKind, PoolMode, StockPoolClassifier,
};
use folio_engine::{
    AssetClass, AssetRecord, BuildRequest, MixType, Portfolio, PortfolioEngine, RiskProfile, Universe,
};

// ============================================================================
// Strategies
// ============================================================================

fn maybe(range: std::ops::Range<f64>) -> impl Strategy<Value = Option<f64>> {
    prop::option::weighted(0.85, range)
}

prop_compose! {
    fn arb_equity(id: usize)(
        market_cap in maybe(0.0..2000.0),
        age in maybe(0.0..40.0),
        volatility in maybe(5.0..80.0),
        beta in maybe(0.2..2.0),
        streak in maybe(0.0..30.0),
        fcf in maybe(-5.0..10.0),
        roe in maybe(-10.0..40.0),
        growth in maybe(-20.0..60.0),
        sector in 0usize..6,
        leveraged in prop::bool::weighted(0.1),
    ) -> AssetRecord {
        let name = if leveraged {
            format!("Ultra Short {}", id)
        } else {
            format!("Company {}", id)
        };
        AssetRecord {
            sector: Some(format!("Sector{}", sector)),
            market_cap,
            age_years: age,
            volatility_1y: volatility,
            beta_1y: beta,
            dividend_streak_years: streak,
            fcf_per_share_4q: fcf,
            roe_avg_3y: roe,
            revenue_growth_yoy: growth,
            ..AssetRecord::new(format!("E{}", id), name, AssetClass::Equity)
        }
    }
}

fn arb_equities(max: usize) -> impl Strategy<Value = Vec<Arc<AssetRecord>>> {
    (1..max)
        .prop_flat_map(|n| (0..n).map(arb_equity).collect::<Vec<_>>())
        .prop_map(|records| records.into_iter().map(Arc::new).collect())
}

const FUND_NAMES: [&str; 8] = [
    "元大台灣50",
    "元大高股息",
    "國泰費城半導體",
    "元大美債20年",
    "中信投資級公司債",
    "富邦科技",
    "Vanguard S&P 500 ETF",
    "Gold Miners",
];

prop_compose! {
    fn arb_fund(id: usize)(
        name in 0usize..FUND_NAMES.len(),
        market_cap in maybe(0.0..3000.0),
        age in maybe(0.0..20.0),
        volatility in maybe(0.0..40.0),
        annual_return in maybe(-20.0..40.0),
    ) -> AssetRecord {
        AssetRecord {
            market_cap,
            age_years: age,
            volatility_1y: volatility,
            annual_return,
            ..AssetRecord::new(format!("F{}", id), FUND_NAMES[name], AssetClass::Fund)
        }
    }
}

fn arb_universe() -> impl Strategy<Value = Universe> {
    (arb_equities(30), 0usize..16)
        .prop_flat_map(|(equities, funds)| {
            let funds = (0..funds).map(arb_fund).collect::<Vec<_>>();
            (Just(equities), funds)
        })
        .prop_map(|(equities, funds)| {
            let records = equities.iter().map(|a| a.as_ref().clone()).chain(funds);
            Universe::from_records(records)
        })
}

fn holding(id: String, weight: f64) -> Holding {
    Holding {
        asset: Arc::new(AssetRecord::new(id.clone(), id, AssetClass::Equity)),
        weight,
        sleeve: None,
        origin: Origin::Forced,
    }
}

fn portfolio_from(weights: &[f64]) -> Portfolio {
    let holdings = weights
        .iter()
        .enumerate()
        .map(|(i, w)| holding(format!("H{}", i), *w))
        .collect();
    Portfolio::assemble(
        "prop",
        RiskProfile::Moderate,
        MixType::PureEquity,
        holdings,
        Vec::new(),
        false,
    )
    .unwrap()
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn prop_portfolio_weights_sum_to_one(weights in prop::collection::vec(0.001f64..100.0, 1..30)) {
        let portfolio = portfolio_from(&weights);
        prop_assert!((portfolio.total_weight() - 1.0).abs() < 1e-6);
        prop_assert!(portfolio.weights().iter().all(|w| *w >= 0.0));
    }

    #[test]
    fn prop_hhi_matches_weights(weights in prop::collection::vec(0.001f64..100.0, 1..30)) {
        let portfolio = portfolio_from(&weights);
        let recomputed: f64 = portfolio.weights().iter().map(|w| w * w).sum();
        prop_assert!(portfolio.hhi() > 0.0);
        prop_assert!(portfolio.hhi() <= 1.0 + 1e-12);
        prop_assert!((portfolio.hhi() - recomputed).abs() < 1e-12);
        prop_assert!(portfolio.hhi() >= 1.0 / weights.len() as f64 - 1e-9);
    }

    #[test]
    fn prop_weighting_strategies_normalize(assets in arb_equities(20)) {
        let engine = WeightingEngine::new(WeightingConfig::default());
        for strategy in [
            WeightingStrategy::Equal,
            WeightingStrategy::Rank,
            WeightingStrategy::Factor { metric: Metric::RoeAvg3y },
            WeightingStrategy::Factor { metric: Metric::RevenueGrowth },
        ] {
            let outcome = engine.weigh(strategy, &assets);
            prop_assert_eq!(outcome.len(), assets.len());
            let total: f64 = outcome.weights().iter().sum();
            prop_assert!((total - 1.0).abs() < 1e-6);
            prop_assert!(outcome.weights().iter().all(|w| *w >= 0.0));
        }
    }

    #[test]
    fn prop_exclusion_is_idempotent(assets in arb_equities(40)) {
        let filter = ExclusionFilter::with_defaults().unwrap();
        let once = filter.apply(&assets);
        let twice = filter.apply(&once.survivors);

        let first: Vec<&str> = once.survivors.iter().map(|a| a.id.as_str()).collect();
        let second: Vec<&str> = twice.survivors.iter().map(|a| a.id.as_str()).collect();
        prop_assert_eq!(first, second);
        prop_assert!(twice.steps.iter().all(|s| s.eliminated == 0));
    }

    #[test]
    fn prop_strict_tiers_are_disjoint(assets in arb_equities(40)) {
        let pools = StockPoolClassifier::with_defaults().classify(&assets);
        let mut seen = HashSet::new();
        for (tier, pool) in pools.iter() {
            prop_assert_eq!(pool.kind(), PoolKind::Stock(tier));
            if pool.mode() != PoolMode::Strict {
                continue;
            }
            for id in pool.ids() {
                prop_assert!(seen.insert(id.to_string()), "{} in two strict tiers", id);
            }
        }
    }

    #[test]
    fn prop_engine_builds_are_normalized(universe in arb_universe()) {
        let engine = PortfolioEngine::with_defaults().unwrap();
        let pools = engine.screen(&universe);
        for profile in RiskProfile::ALL {
            for mix in MixType::ALL {
                let Ok(portfolio) = engine.build(&pools, &BuildRequest::new(profile, mix)) else {
                    continue;
                };
                let weights = portfolio.weights();
                prop_assert!((weights.iter().sum::<f64>() - 1.0).abs() < 1e-6);
                prop_assert!(weights.iter().all(|w| *w >= 0.0));
                let recomputed: f64 = weights.iter().map(|w| w * w).sum();
                prop_assert!((portfolio.hhi() - recomputed).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn prop_forced_include_is_idempotent(
        weights in prop::collection::vec(0.001f64..100.0, 1..15),
        fraction in 0.01f64..0.99,
        existing in prop::bool::ANY,
    ) {
        let base = portfolio_from(&weights);
        let forced = if existing {
            Arc::clone(&base.holdings()[0].asset)
        } else {
            Arc::new(AssetRecord::new("X", "Forced", AssetClass::Fund))
        };
        let include = ForcedInclude::new(fraction).unwrap();

        let once = include.apply(&base, Arc::clone(&forced)).unwrap();
        let twice = include.apply(&once, forced).unwrap();

        prop_assert!((once.total_weight() - 1.0).abs() < 1e-6);
        prop_assert_eq!(once.len(), twice.len());
        for (a, b) in once.weights().iter().zip(twice.weights()) {
            prop_assert!((a - b).abs() < 1e-9);
        }
    }
}
