//! `folio-engine` command-line driver.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use folio_common::config::config_dir;
use folio_common::logging::init_logging;
use folio_engine::screener::PoolMode;
use folio_engine::{
    BuildRequest, EngineConfig, EngineError, MixType, PortfolioEngine, PortfolioReport,
    ReportFormat, RiskProfile, Universe,
};

/// Risk-tiered screening and rule-based portfolio construction.
#[derive(Parser, Debug)]
#[command(name = "folio-engine")]
#[command(version)]
#[command(about = "Screen a universe and build a risk-profiled portfolio.", long_about = None)]
struct Cli {
    /// Configuration directory (default: $FOLIO_CONFIG_DIR or ~/.folio)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show the exclusion funnel and pool sizes
    Pools {
        /// Universe file (JSON array of asset records)
        #[arg(short, long)]
        universe: PathBuf,

        /// Print the pools as JSON
        #[arg(long)]
        json: bool,
    },

    /// Build and render a portfolio
    Build {
        /// Universe file (JSON array of asset records)
        #[arg(short, long)]
        universe: PathBuf,

        /// Risk profile (conservative, moderate, aggressive)
        #[arg(short, long)]
        risk: RiskProfile,

        /// Mix type (pure-equity, pure-fund, hybrid)
        #[arg(short, long)]
        mix: MixType,

        /// Identifier of an asset to force into the portfolio
        #[arg(long)]
        force: Option<String>,

        /// Report format (markdown, json)
        #[arg(short, long, default_value = "markdown")]
        format: ReportFormat,

        /// Write the report here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        let code = match (e.downcast_ref::<EngineError>(), e.downcast_ref::<folio_common::Error>()) {
            (Some(err), _) => err.exit_code(),
            (None, Some(err)) => err.exit_code(),
            (None, None) => 1,
        };
        std::process::exit(code);
    }
}

fn run(cli: Cli) -> Result<()> {
    let dir = cli.config_dir.unwrap_or_else(config_dir);
    let config = EngineConfig::load_from(&dir)?;
    init_logging(&config.observability.log_level, &config.observability.log_format);
    tracing::debug!(config_dir = %dir.display(), "Configuration loaded");

    let engine = PortfolioEngine::new(config)?;

    match cli.command {
        Commands::Pools { universe, json } => show_pools(&engine, &Universe::load_json(&universe)?, json),
        Commands::Build {
            universe,
            risk,
            mix,
            force,
            format,
            output,
        } => {
            let universe = Universe::load_json(&universe)?;
            let mut request = BuildRequest::new(risk, mix);
            if let Some(id) = force {
                let asset = universe.require(&id).context("Cannot force include")?;
                request = request.with_forced_include(Arc::clone(asset));
            }
            build(&engine, &universe, &request, format, output)
        }
    }
}

fn show_pools(engine: &PortfolioEngine, universe: &Universe, json: bool) -> Result<()> {
    let pools = engine.screen(universe);

    if json {
        println!("{}", serde_json::to_string_pretty(&pools)?);
        return Ok(());
    }

    println!("Exclusion funnel ({} assets in)", universe.len());
    for step in &pools.steps {
        println!(
            "  {:<26} passed {:>6}  eliminated {:>6} ({:.1}%)",
            step.rule.to_string(),
            step.passed,
            step.eliminated,
            step.elimination_rate
        );
    }

    println!("\nPools");
    for pool in pools.pools() {
        let mode = match pool.mode() {
            PoolMode::Strict => "strict".to_string(),
            PoolMode::Relaxed { min_matches } => format!(
                "relaxed (closest fits, >= {} of {} conditions)",
                min_matches,
                pool.condition_count()
            ),
        };
        println!("  {:<44} {:>6}  {}", pool.kind().to_string(), pool.len(), mode);
    }
    Ok(())
}

fn build(
    engine: &PortfolioEngine,
    universe: &Universe,
    request: &BuildRequest,
    format: ReportFormat,
    output: Option<PathBuf>,
) -> Result<()> {
    let pools = engine.screen(universe);
    let portfolio = engine.build(&pools, request)?;
    let review = engine.review(&portfolio);

    let report = PortfolioReport::new(portfolio)
        .with_review(review)
        .with_funnel(pools.steps);

    match output {
        Some(path) => {
            let written = report.save_to_file(&path, format)?;
            eprintln!("Report written to {}", written.display());
        }
        None => println!("{}", report.generate(format)),
    }
    Ok(())
}
