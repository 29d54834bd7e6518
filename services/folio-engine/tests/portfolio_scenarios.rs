//! End-to-end portfolio construction scenarios.

use std::collections::HashSet;
use std::sync::Arc;

use folio_engine::portfolio::{EquityPlan, Holding, Origin, Sleeve, WeightingStrategy};
use folio_engine::screener::{
    Comparison, Condition, Metric, PoolKind, PoolMode, SortKey, StockPoolClassifier, TierRule,
};
use folio_engine::{
    AssetClass, AssetRecord, BuildRequest, EngineConfig, EngineError, MixType, Portfolio,
    PortfolioEngine, PortfolioReport, ReportFormat, RiskProfile, Universe,
};

// ============================================================================
// Fixtures
// ============================================================================

/// Equity that survives every exclusion rule.
fn listed(id: &str, sector: &str) -> AssetRecord {
    AssetRecord::new(id, format!("Company {}", id), AssetClass::Equity)
        .with_sector(sector)
        .with_metric(Metric::MarketCap, 500.0)
        .with_metric(Metric::AgeYears, 10.0)
        .with_metric(Metric::FreeCashFlowPerShare, 1.0)
}

fn listed_fund(id: &str, name: &str, volatility: f64, annual_return: f64) -> AssetRecord {
    AssetRecord::new(id, name, AssetClass::Fund)
        .with_metric(Metric::MarketCap, 1000.0)
        .with_metric(Metric::AgeYears, 8.0)
        .with_metric(Metric::Volatility, volatility)
        .with_metric(Metric::AnnualReturn, annual_return)
}

/// Ten equities with volatility 1..=10, all profitable and growing.
///
/// Percentiles are 0.1..=1.0, so exactly ids m4, m5, m6 sit strictly
/// inside the moderate band.
fn ladder() -> Vec<AssetRecord> {
    (1..=10)
        .map(|i| {
            listed(&format!("m{}", i), &format!("Sector{}", i))
                .with_metric(Metric::Volatility, i as f64)
                .with_metric(Metric::RoeAvg3y, 5.0 + i as f64)
                .with_metric(Metric::RevenueGrowth, 4.0)
        })
        .collect()
}

fn ids(portfolio: &Portfolio) -> Vec<&str> {
    portfolio.holdings().iter().map(|h| h.id()).collect()
}

fn assert_normalized(portfolio: &Portfolio) {
    assert!((portfolio.total_weight() - 1.0).abs() < 1e-6);
    let recomputed: f64 = portfolio.weights().iter().map(|w| w * w).sum();
    assert!((recomputed - portfolio.hhi()).abs() < 1e-12);
    assert!(portfolio.hhi() > 0.0 && portfolio.hhi() <= 1.0);
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn test_scenario_a_sector_cap_limits_conservative_build() {
    let mut records = Vec::new();
    for i in 0..50 {
        records.push(
            listed(&format!("c{:02}", i), &format!("Sector{:02}", i % 20))
                .with_metric(Metric::Volatility, 10.0 + i as f64 * 0.1)
                .with_metric(Metric::Beta, 0.8)
                .with_metric(Metric::DividendStreak, 15.0)
                .with_metric(Metric::FreeCashFlowPerShare, 2.0)
                .with_metric(Metric::DividendYield, 3.0 + (i % 7) as f64),
        );
    }
    for i in 0..150 {
        records.push(
            listed(&format!("h{:03}", i), "Speculative")
                .with_metric(Metric::Volatility, 40.0 + i as f64)
                .with_metric(Metric::Beta, 1.5),
        );
    }

    let engine = PortfolioEngine::with_defaults().unwrap();
    let pools = engine.screen(&Universe::from_records(records));
    let tier = pools.pool(PoolKind::Stock(RiskProfile::Conservative)).unwrap();
    assert_eq!(tier.len(), 50);
    assert_eq!(tier.mode(), PoolMode::Strict);

    let portfolio = engine
        .build(
            &pools,
            &BuildRequest::new(RiskProfile::Conservative, MixType::PureEquity),
        )
        .unwrap();

    assert_eq!(portfolio.len(), 10);
    let sectors: HashSet<&str> = portfolio
        .holdings()
        .iter()
        .map(|h| h.asset.sector_label())
        .collect();
    assert!(sectors.len() >= 5);
    for sector in &sectors {
        let held = portfolio
            .holdings()
            .iter()
            .filter(|h| h.asset.sector_label() == *sector)
            .count();
        assert!(held <= 2, "{} holds {}", sector, held);
    }
    assert_normalized(&portfolio);
}

#[test]
fn test_scenario_b_equal_weighted_three_assets() {
    let mut config = EngineConfig::default();
    config.portfolio.moderate.pure_equity = EquityPlan {
        tier: RiskProfile::Moderate,
        min_assets: 3,
        max_assets: 3,
        max_per_sector: Some(2),
        weighting: WeightingStrategy::Equal,
    };
    let engine = PortfolioEngine::new(config).unwrap();
    let pools = engine.screen(&Universe::from_records(ladder()));

    let portfolio = engine
        .build(&pools, &BuildRequest::new(RiskProfile::Moderate, MixType::PureEquity))
        .unwrap();

    assert_eq!(ids(&portfolio), vec!["m6", "m5", "m4"]);
    for w in portfolio.weights() {
        assert!((w - 0.3333).abs() < 1e-4);
    }
    assert!((portfolio.hhi() - 0.3333).abs() < 1e-4);
    assert_normalized(&portfolio);
}

#[test]
fn test_scenario_c_forced_include_reserves_fraction() {
    let holdings = ["a", "b", "c", "d"]
        .iter()
        .map(|id| Holding {
            asset: Arc::new(listed(id, "Sector")),
            weight: 0.25,
            sleeve: None,
            origin: Origin::Pool {
                kind: PoolKind::Stock(RiskProfile::Aggressive),
                matched: 3,
                conditions: 3,
            },
        })
        .collect();
    let base = Portfolio::assemble(
        "scenario-c",
        RiskProfile::Aggressive,
        MixType::PureEquity,
        holdings,
        Vec::new(),
        false,
    )
    .unwrap();

    let engine = PortfolioEngine::with_defaults().unwrap();
    let forced = Arc::new(listed("x", "Other"));
    let next = engine.force_include(&base, Arc::clone(&forced)).unwrap();

    let expected = [0.225, 0.225, 0.225, 0.225, 0.10];
    for (w, e) in next.weights().iter().zip(expected) {
        assert!((w - e).abs() < 1e-12);
    }
    assert!((next.total_weight() - 1.0).abs() < 1e-12);
    assert_eq!(base.len(), 4);

    let again = engine.force_include(&next, forced).unwrap();
    assert_eq!(again.len(), 5);
    assert!((again.get("x").unwrap().weight - 0.10).abs() < 1e-12);
}

#[test]
fn test_scenario_d_six_condition_tier_relaxes_to_four() {
    let rule = TierRule {
        tier: RiskProfile::Conservative,
        conditions: vec![
            Condition::new(Metric::Beta, Comparison::AtMost, 1.0),
            Condition::new(Metric::DividendStreak, Comparison::Above, 10.0),
            Condition::new(Metric::FreeCashFlowPerShare, Comparison::Above, 0.0),
            Condition::new(Metric::RoeAvg3y, Comparison::Above, 5.0),
            Condition::new(Metric::RevenueGrowth, Comparison::Above, 0.0),
            Condition::new(Metric::DividendYield, Comparison::Above, 3.0),
        ],
        sort_by: vec![SortKey::desc(Metric::MarketCap)],
    };

    // Match counts: five=5, four_small=4, four_big=4, three=3, two=2.
    let base = |id: &str, cap: f64| {
        AssetRecord::new(id, id, AssetClass::Equity)
            .with_metric(Metric::MarketCap, cap)
            .with_metric(Metric::Beta, 0.9)
            .with_metric(Metric::FreeCashFlowPerShare, 1.0)
    };
    let assets: Vec<Arc<AssetRecord>> = vec![
        base("two", 900.0),
        base("three", 800.0).with_metric(Metric::DividendStreak, 12.0),
        base("four_small", 100.0)
            .with_metric(Metric::DividendStreak, 12.0)
            .with_metric(Metric::RoeAvg3y, 8.0),
        base("five", 50.0)
            .with_metric(Metric::DividendStreak, 12.0)
            .with_metric(Metric::RoeAvg3y, 8.0)
            .with_metric(Metric::RevenueGrowth, 2.0),
        base("four_big", 700.0)
            .with_metric(Metric::RoeAvg3y, 8.0)
            .with_metric(Metric::RevenueGrowth, 2.0),
    ]
    .into_iter()
    .map(Arc::new)
    .collect();

    let pool = StockPoolClassifier::with_defaults().classify_tier(&rule, &assets);

    assert_eq!(pool.mode(), PoolMode::Relaxed { min_matches: 4 });
    assert_eq!(pool.condition_count(), 6);
    assert_eq!(pool.ids(), vec!["five", "four_big", "four_small"]);
    let matched: Vec<usize> = pool.members().iter().map(|m| m.matched).collect();
    assert_eq!(matched, vec![5, 4, 4]);
    assert!(pool.members().iter().all(|m| !m.is_strict_match()));
}

// ============================================================================
// Pipeline
// ============================================================================

#[test]
fn test_pipeline_from_file_to_report() {
    let mut records = ladder();
    records.push(listed_fund("0050", "元大台灣50", 18.0, 12.0));
    records.push(listed_fund("00631L", "元大台灣50正2", 36.0, 25.0));
    records.push(listed_fund("00679B", "元大美債20年", 14.0, -3.0));

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("universe.json");
    std::fs::write(&path, serde_json::to_string(&records).unwrap()).unwrap();

    let universe = Universe::load_json(&path).unwrap();
    let engine = PortfolioEngine::with_defaults().unwrap();
    let pools = engine.screen(&universe);
    assert!(!pools.survivors.iter().any(|a| a.id == "00631L"));

    let portfolio = engine
        .build(&pools, &BuildRequest::new(RiskProfile::Moderate, MixType::Hybrid))
        .unwrap();

    assert_eq!(portfolio.len(), 4);
    assert_eq!(portfolio.get("0050").unwrap().sleeve, Some(Sleeve::Core));
    assert!((portfolio.sleeve_weight(Sleeve::Core) - 0.6).abs() < 1e-9);
    assert!((portfolio.sleeve_weight(Sleeve::Satellite) - 0.4).abs() < 1e-9);
    // ROE-proportional satellite: m6 has the highest ROE.
    assert!(portfolio.get("m6").unwrap().weight > portfolio.get("m4").unwrap().weight);
    assert_normalized(&portfolio);

    let review = engine.review(&portfolio);
    let report = PortfolioReport::new(portfolio)
        .with_review(review)
        .with_funnel(pools.steps.clone());
    let out = report
        .save_to_file(&dir.path().join("report"), ReportFormat::Json)
        .unwrap();
    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(out).unwrap()).unwrap();
    assert_eq!(json["mix"], "hybrid");
    assert_eq!(json["rows"].as_array().unwrap().len(), 4);
    assert_eq!(json["funnel"].as_array().unwrap().len(), 5);
}

#[test]
fn test_relaxed_tier_flows_into_portfolio() {
    // No equity has beta > 1.1, so the aggressive tier must relax.
    let engine = PortfolioEngine::with_defaults().unwrap();
    let pools = engine.screen(&Universe::from_records(ladder()));
    let tier = pools.pool(PoolKind::Stock(RiskProfile::Aggressive)).unwrap();
    assert_eq!(tier.mode(), PoolMode::Relaxed { min_matches: 1 });
    let mut members = tier.ids();
    members.sort_unstable();
    assert_eq!(members, vec!["m10", "m7", "m8", "m9"]);
    assert!(tier.members().iter().all(|m| m.matched == 1));

    let err = engine
        .build(&pools, &BuildRequest::new(RiskProfile::Aggressive, MixType::PureEquity))
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Infeasible {
            accepted: 4,
            required: 5,
            ..
        }
    ));

    let mut config = EngineConfig::default();
    config.portfolio.aggressive.pure_equity.min_assets = 3;
    let engine = PortfolioEngine::new(config).unwrap();
    let portfolio = engine
        .build(&pools, &BuildRequest::new(RiskProfile::Aggressive, MixType::PureEquity))
        .unwrap();
    assert!(portfolio.has_relaxed_holdings());
    assert_eq!(portfolio.len(), 4);
    assert_normalized(&portfolio);
}

#[test]
fn test_infeasible_fund_build_reports_shortfall() {
    let engine = PortfolioEngine::with_defaults().unwrap();
    let pools = engine.screen(&Universe::from_records(ladder()));
    let err = engine
        .build(&pools, &BuildRequest::new(RiskProfile::Conservative, MixType::PureFund))
        .unwrap_err();
    assert!(err.is_infeasible());
    assert!(err.to_string().contains("conservative pure-fund"));
}
