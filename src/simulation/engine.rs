//! Monte Carlo engine for day-by-day fund depletion
//!
//! Every trial starts from the current balance and draws a fresh claim-velocity
//! and approval-rate multiplier once per period. The daily burn for the period
//! is the base daily burn shifted by the multiplier's deviation from 1.0 (scaled
//! by the magnitude of the base burn, floored at `min_deviation_daily`), then
//! scaled by `1 + fraud_rate_impact`. For a depleting fund this is simply
//! `base * velocity * approval`; for a stable or growing fund the same deviation
//! can still turn a period negative.

use log::{debug, info};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use super::params::SimulationParams;
use super::rng::TrialRngFactory;
use crate::config::{ClampRange, EngineConfig, NoiseDistribution};
use crate::error::{ForecastError, Result};

/// Absorbs float drift from repeated subtraction; balances at or below it are zero
const EXHAUSTED_EPSILON: f64 = 1e-9;

/// Result of a single trial
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrialOutcome {
    /// Balance first reached zero on this day
    Insolvent(u32),
    /// Still solvent when the horizon cap was reached
    NotInsolventWithinHorizon,
}

impl TrialOutcome {
    /// Day count for insolvent trials
    pub fn days(&self) -> Option<u32> {
        match self {
            TrialOutcome::Insolvent(days) => Some(*days),
            TrialOutcome::NotInsolventWithinHorizon => None,
        }
    }

    pub fn is_insolvent(&self) -> bool {
        matches!(self, TrialOutcome::Insolvent(_))
    }
}

/// Multiplier noise, built once per run
#[derive(Debug, Clone, Copy)]
enum MultiplierNoise {
    Constant,
    Normal(Normal<f64>),
    Uniform { half_width: f64 },
}

impl MultiplierNoise {
    fn new(family: NoiseDistribution, std_dev: f64) -> Result<Self> {
        if std_dev == 0.0 {
            return Ok(MultiplierNoise::Constant);
        }
        match family {
            NoiseDistribution::Normal => Normal::new(1.0, std_dev)
                .map(MultiplierNoise::Normal)
                .map_err(|e| ForecastError::Unexpected(format!("noise distribution: {}", e))),
            // Uniform on [1 - a, 1 + a] has standard deviation a / sqrt(3)
            NoiseDistribution::Uniform => Ok(MultiplierNoise::Uniform {
                half_width: std_dev * 3f64.sqrt(),
            }),
        }
    }

    fn sample<R: Rng>(&self, rng: &mut R, clamp: ClampRange) -> f64 {
        let raw = match self {
            MultiplierNoise::Constant => 1.0,
            MultiplierNoise::Normal(normal) => normal.sample(rng),
            MultiplierNoise::Uniform { half_width } => {
                1.0 + half_width * (2.0 * rng.gen::<f64>() - 1.0)
            }
        };
        clamp.apply(raw)
    }
}

/// Per-run constants shared by every trial
#[derive(Debug, Clone, Copy)]
struct TrialPlan {
    starting_balance: f64,
    daily_burn: f64,
    deviation_scale: f64,
    fraud_factor: f64,
    horizon_days: u32,
    period_days: u32,
    velocity: MultiplierNoise,
    approval: MultiplierNoise,
    velocity_clamp: ClampRange,
    approval_clamp: ClampRange,
}

/// Balance state of one trial as it advances day by day
#[derive(Debug, Clone)]
struct TrialState {
    day: u32,
    balance: f64,
    /// Combined velocity x approval multiplier for the current period
    period_multiplier: f64,
}

impl TrialState {
    fn new(starting_balance: f64) -> Self {
        Self {
            day: 0,
            balance: starting_balance,
            period_multiplier: 1.0,
        }
    }
}

/// Monte Carlo simulation engine
#[derive(Debug, Clone, Default)]
pub struct SimulationEngine {
    config: EngineConfig,
}

impl SimulationEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run `params.simulation_count()` independent trials
    ///
    /// Outcomes are returned in trial order. Given the same generator seed and
    /// parameters the output is identical whatever the thread count.
    pub fn run<F: TrialRngFactory>(
        &self,
        params: &SimulationParams,
        rngs: &F,
    ) -> Result<Vec<TrialOutcome>> {
        let plan = self.plan(params)?;
        let count = params.simulation_count();
        let start = Instant::now();

        let simulate = || -> Vec<TrialOutcome> {
            (0..count)
                .into_par_iter()
                .map(|trial| {
                    let mut rng = rngs.rng_for_trial(u64::from(trial));
                    run_trial(&plan, &mut rng)
                })
                .collect()
        };

        let outcomes = match self.config.threads {
            Some(threads) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .build()
                    .map_err(|e| ForecastError::Unexpected(format!("thread pool: {}", e)))?;
                pool.install(simulate)
            }
            None => simulate(),
        };

        info!(
            "Ran {} trials (seed {}) in {:?}",
            outcomes.len(),
            rngs.seed(),
            start.elapsed()
        );
        Ok(outcomes)
    }

    /// Run a single trial with the supplied generator
    pub fn run_trial<R: Rng>(&self, params: &SimulationParams, rng: &mut R) -> Result<TrialOutcome> {
        let plan = self.plan(params)?;
        Ok(run_trial(&plan, rng))
    }

    fn plan(&self, params: &SimulationParams) -> Result<TrialPlan> {
        if self.config.period_days == 0 {
            return Err(ForecastError::validation("period_days", "must be at least 1"));
        }
        let daily_burn = params.daily_burn_rate();
        debug!(
            "Planning trials: balance {}, daily burn {:.6}, fraud impact {}",
            params.current_balance(),
            daily_burn,
            params.fraud_rate_impact()
        );

        Ok(TrialPlan {
            starting_balance: params.current_balance(),
            daily_burn,
            deviation_scale: daily_burn.abs().max(self.config.min_deviation_daily),
            fraud_factor: 1.0 + params.fraud_rate_impact(),
            horizon_days: self.config.horizon_days,
            period_days: self.config.period_days,
            velocity: MultiplierNoise::new(self.config.noise, params.claim_velocity_variance())?,
            approval: MultiplierNoise::new(self.config.noise, params.approval_rate_variance())?,
            velocity_clamp: self.config.velocity_clamp,
            approval_clamp: self.config.approval_clamp,
        })
    }
}

fn run_trial<R: Rng>(plan: &TrialPlan, rng: &mut R) -> TrialOutcome {
    let mut state = TrialState::new(plan.starting_balance);

    // An empty pool is insolvent before the first day is simulated
    if state.balance <= EXHAUSTED_EPSILON {
        return TrialOutcome::Insolvent(0);
    }

    while state.day < plan.horizon_days {
        if state.day % plan.period_days == 0 {
            let velocity = plan.velocity.sample(rng, plan.velocity_clamp);
            let approval = plan.approval.sample(rng, plan.approval_clamp);
            state.period_multiplier = velocity * approval;
        }

        let burn = (plan.daily_burn + plan.deviation_scale * (state.period_multiplier - 1.0))
            * plan.fraud_factor;
        state.balance -= burn;
        state.day += 1;

        if state.balance <= EXHAUSTED_EPSILON {
            return TrialOutcome::Insolvent(state.day);
        }
    }

    TrialOutcome::NotInsolventWithinHorizon
}
