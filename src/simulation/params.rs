//! Simulation inputs and their derivation from fund history

use log::{debug, warn};
use serde::Serialize;

use crate::config::{DerivationDefaults, DAYS_PER_MONTH, MAX_SIMULATION_COUNT};
use crate::error::{ForecastError, Result};
use crate::fund::{FundHistory, FundRecord};

/// Validated inputs for one simulation run
///
/// Construction is the only validation point: a `SimulationParams` value is
/// always safe to hand to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationParams {
    current_balance: f64,
    base_burn_rate: f64,
    claim_velocity_variance: f64,
    approval_rate_variance: f64,
    fraud_rate_impact: f64,
    simulation_count: u32,
}

impl SimulationParams {
    /// Build and validate a parameter set
    ///
    /// `base_burn_rate` is pool units per 30-day month and may be zero or
    /// negative for a stable or growing fund.
    pub fn new(
        current_balance: f64,
        base_burn_rate: f64,
        claim_velocity_variance: f64,
        approval_rate_variance: f64,
        fraud_rate_impact: f64,
        simulation_count: u32,
    ) -> Result<Self> {
        check_finite("currentBalance", current_balance)?;
        check_finite("baseBurnRate", base_burn_rate)?;
        check_non_negative("currentBalance", current_balance)?;
        check_non_negative("claimVelocityVariance", claim_velocity_variance)?;
        check_non_negative("approvalRateVariance", approval_rate_variance)?;
        check_non_negative("fraudRateImpact", fraud_rate_impact)?;

        if simulation_count == 0 || simulation_count > MAX_SIMULATION_COUNT {
            return Err(ForecastError::validation(
                "simulationCount",
                format!(
                    "must be between 1 and {}, got {}",
                    MAX_SIMULATION_COUNT, simulation_count
                ),
            ));
        }

        Ok(Self {
            current_balance,
            base_burn_rate,
            claim_velocity_variance,
            approval_rate_variance,
            fraud_rate_impact,
            simulation_count,
        })
    }

    pub fn current_balance(&self) -> f64 {
        self.current_balance
    }

    /// Pool units per 30-day month
    pub fn base_burn_rate(&self) -> f64 {
        self.base_burn_rate
    }

    pub fn daily_burn_rate(&self) -> f64 {
        self.base_burn_rate / DAYS_PER_MONTH
    }

    pub fn claim_velocity_variance(&self) -> f64 {
        self.claim_velocity_variance
    }

    pub fn approval_rate_variance(&self) -> f64 {
        self.approval_rate_variance
    }

    pub fn fraud_rate_impact(&self) -> f64 {
        self.fraud_rate_impact
    }

    pub fn simulation_count(&self) -> u32 {
        self.simulation_count
    }

    pub fn with_current_balance(self, current_balance: f64) -> Result<Self> {
        Self::new(
            current_balance,
            self.base_burn_rate,
            self.claim_velocity_variance,
            self.approval_rate_variance,
            self.fraud_rate_impact,
            self.simulation_count,
        )
    }

    pub fn with_base_burn_rate(self, base_burn_rate: f64) -> Result<Self> {
        Self::new(
            self.current_balance,
            base_burn_rate,
            self.claim_velocity_variance,
            self.approval_rate_variance,
            self.fraud_rate_impact,
            self.simulation_count,
        )
    }

    pub fn with_fraud_rate_impact(self, fraud_rate_impact: f64) -> Result<Self> {
        Self::new(
            self.current_balance,
            self.base_burn_rate,
            self.claim_velocity_variance,
            self.approval_rate_variance,
            fraud_rate_impact,
            self.simulation_count,
        )
    }

    pub fn with_simulation_count(self, simulation_count: u32) -> Result<Self> {
        Self::new(
            self.current_balance,
            self.base_burn_rate,
            self.claim_velocity_variance,
            self.approval_rate_variance,
            self.fraud_rate_impact,
            simulation_count,
        )
    }
}

fn check_finite(field: &'static str, value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ForecastError::validation(field, "must be a finite number"))
    }
}

fn check_non_negative(field: &'static str, value: f64) -> Result<()> {
    check_finite(field, value)?;
    if value < 0.0 {
        return Err(ForecastError::validation(
            field,
            format!("must not be negative, got {}", value),
        ));
    }
    Ok(())
}

/// Turns fund history into baseline simulation inputs
///
/// Short or missing history is never an error; the configured defaults are
/// substituted field by field.
#[derive(Debug, Clone, Default)]
pub struct ParameterDeriver {
    defaults: DerivationDefaults,
}

impl ParameterDeriver {
    pub fn new(defaults: DerivationDefaults) -> Self {
        Self { defaults }
    }

    pub fn defaults(&self) -> &DerivationDefaults {
        &self.defaults
    }

    /// Derive parameters using the default fraud impact
    pub fn derive(&self, records: &[FundRecord], simulation_count: u32) -> Result<SimulationParams> {
        self.derive_with_fraud(records, self.defaults.fraud_rate_impact, simulation_count)
    }

    /// Derive parameters with an explicit fraud impact
    pub fn derive_with_fraud(
        &self,
        records: &[FundRecord],
        fraud_rate_impact: f64,
        simulation_count: u32,
    ) -> Result<SimulationParams> {
        let history = FundHistory::new(records);

        SimulationParams::new(
            self.current_balance(&history),
            self.monthly_burn_rate(&history),
            self.velocity_variance(&history),
            self.approval_variance(&history),
            fraud_rate_impact,
            simulation_count,
        )
    }

    /// Latest known balance, or the default when there is no history
    ///
    /// A fund already in deficit starts from zero; an unreadable balance falls
    /// back to the default.
    pub fn current_balance(&self, history: &FundHistory<'_>) -> f64 {
        match history.newest().map(|r| r.balance) {
            None => self.defaults.current_balance,
            Some(balance) if !balance.is_finite() => {
                warn!("Latest balance {} is not usable, using default {}", balance, self.defaults.current_balance);
                self.defaults.current_balance
            }
            Some(balance) if balance < 0.0 => {
                warn!("Latest balance {} is in deficit, starting from zero", balance);
                0.0
            }
            Some(balance) => balance,
        }
    }

    /// Burn per 30-day month from the oldest-to-newest balance change
    ///
    /// A growing fund yields a negative rate, which is kept as-is.
    pub fn monthly_burn_rate(&self, history: &FundHistory<'_>) -> f64 {
        match history.daily_burn() {
            Some(daily) if daily.is_finite() => daily * DAYS_PER_MONTH,
            _ => {
                debug!(
                    "Insufficient history ({} records), using default burn rate {}",
                    history.len(),
                    self.defaults.base_burn_rate
                );
                self.defaults.base_burn_rate
            }
        }
    }

    /// Coefficient of variation of claims received, capped
    pub fn velocity_variance(&self, history: &FundHistory<'_>) -> f64 {
        if history.len() < 3 {
            return self.defaults.claim_velocity_variance;
        }
        let claims: Vec<f64> = history.records().iter().map(|r| r.claims_received).collect();
        coefficient_of_variation(&claims)
            .map(|cv| cv.min(self.defaults.max_velocity_variance))
            .unwrap_or(self.defaults.claim_velocity_variance)
    }

    /// Coefficient of variation of the approval ratio, capped
    pub fn approval_variance(&self, history: &FundHistory<'_>) -> f64 {
        let ratios: Vec<f64> = history
            .records()
            .iter()
            .filter_map(FundRecord::approval_ratio)
            .collect();
        if ratios.len() < 3 {
            return self.defaults.approval_rate_variance;
        }
        coefficient_of_variation(&ratios)
            .map(|cv| cv.min(self.defaults.max_approval_variance))
            .unwrap_or(self.defaults.approval_rate_variance)
    }
}

/// Population standard deviation over mean; `None` for a non-positive mean
fn coefficient_of_variation(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if mean <= 0.0 || !mean.is_finite() {
        return None;
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    Some(variance.sqrt() / mean)
}
