//! Fund Depletion CLI
//!
//! Command-line interface for running depletion forecasts against a local
//! snapshot file

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use fund_depletion::{
    load_records, DeterministicProjector, EngineConfig, ForecastService, FundRecord,
    SimulationRequest, SimulationResponse,
};
use std::fs::File;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "fund_depletion")]
#[command(about = "Stochastic fund-depletion forecaster")]
struct Cli {
    /// Fund snapshot file (CSV or JSON); defaults apply without one
    #[arg(long, global = true)]
    records: Option<PathBuf>,

    /// Engine configuration JSON
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the Monte Carlo forecast
    Simulate(SimulateArgs),
    /// Run the deterministic three-scenario projection
    Project {
        /// Print the full projection as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug)]
struct SimulateArgs {
    /// Starting balance override
    #[arg(long)]
    balance: Option<f64>,

    /// Monthly burn rate override; negative for a growing fund
    #[arg(long, allow_negative_numbers = true)]
    burn_rate: Option<f64>,

    /// Fraud rate impact override
    #[arg(long)]
    fraud_rate: Option<f64>,

    /// Number of trials (capped server-side)
    #[arg(long)]
    simulation_count: Option<f64>,

    /// Seed for a reproducible custom run
    #[arg(long)]
    seed: Option<u64>,

    /// Write the full response JSON here
    #[arg(long)]
    output: Option<PathBuf>,
}

impl SimulateArgs {
    fn request(&self) -> SimulationRequest {
        SimulationRequest {
            current_balance: self.balance,
            base_burn_rate: self.burn_rate,
            fraud_rate_impact: self.fraud_rate,
            simulation_count: self.simulation_count,
            seed: self.seed,
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => EngineConfig::from_json_path(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => EngineConfig::default(),
    };

    let records: Vec<FundRecord> = match &cli.records {
        Some(path) => load_records(path)
            .with_context(|| format!("Failed to load fund records from {}", path.display()))?,
        None => Vec::new(),
    };

    println!("Fund Depletion Forecast v0.1.0");
    println!("==============================\n");
    println!("Snapshots loaded: {}", records.len());

    match cli.command {
        Command::Simulate(args) => simulate(config, &records, &args),
        Command::Project { json } => project(config, &records, json),
    }
}

fn simulate(config: EngineConfig, records: &[FundRecord], args: &SimulateArgs) -> Result<()> {
    let service = ForecastService::new(config);
    let response = service
        .handle(records, &args.request())
        .context("Simulation request failed")?;

    print_summary(&response);

    if let Some(path) = &args.output {
        let file = File::create(path).with_context(|| format!("Unable to create {}", path.display()))?;
        serde_json::to_writer_pretty(file, &response)?;
        println!("\nFull response written to: {}", path.display());
    }
    Ok(())
}

fn print_summary(response: &SimulationResponse) {
    let params = &response.params;
    let results = &response.results;

    println!("\nParameters:");
    println!("  Balance:           {:.2}", params.current_balance());
    println!("  Burn rate / month: {:.4}", params.base_burn_rate());
    println!("  Velocity variance: {:.4}", params.claim_velocity_variance());
    println!("  Approval variance: {:.4}", params.approval_rate_variance());
    println!("  Fraud impact:      {:.4}", params.fraud_rate_impact());
    println!("  Trials:            {} (seed {})", params.simulation_count(), response.meta.seed);

    println!("\nInsolvency dates:");
    let dates = [
        ("10th", results.percentile10),
        ("25th", results.percentile25),
        ("Median", results.median),
        ("75th", results.percentile75),
        ("90th", results.percentile90),
        ("95th", results.percentile95),
    ];
    for (label, date) in dates {
        match date {
            Some(date) => println!("  {:>6}: {}", label, date),
            None => println!("  {:>6}: beyond horizon", label),
        }
    }

    if let (Some(mean), Some(std)) = (results.mean_days, results.standard_deviation) {
        println!("\n  Mean: {} days (std {} days)", mean, std);
    }
    for (label, pct) in &results.probabilities {
        println!("  {}: {}%", label, pct);
    }
    println!("  Non-terminating trials: {}", results.non_terminating_trials);
    println!("  Confidence: {}", results.confidence.as_str());
    println!("  Compute time: {} ms", response.meta.compute_time_ms);
}

fn project(config: EngineConfig, records: &[FundRecord], json: bool) -> Result<()> {
    let projector = DeterministicProjector::new(config.projector, config.defaults);
    let projection = projector.project(records, Utc::now().date_naive());

    if json {
        println!("{}", serde_json::to_string_pretty(&projection)?);
        return Ok(());
    }

    println!("\nBalance: {:.2}", projection.current_balance);
    println!(
        "Burn rate: {:.4}/day  {:.4}/week  {:.4}/month",
        projection.burn_rate.daily, projection.burn_rate.weekly, projection.burn_rate.monthly
    );

    println!("\n{:>12} {:>10} {:>12} {:>12}", "Scenario", "Mult", "Days", "Date");
    println!("{}", "-".repeat(50));
    for outcome in &projection.scenarios {
        let days = outcome
            .days_until_insolvent
            .map(|d| d.to_string())
            .unwrap_or_else(|| "never".to_string());
        println!(
            "{:>12} {:>10.2} {:>12} {:>12}",
            format!("{:?}", outcome.scenario),
            outcome.multiplier,
            days,
            outcome.insolvency_date
        );
    }

    println!("\nAdvisories:");
    for advisory in &projection.advisories {
        println!("  - {}", advisory);
    }
    Ok(())
}
