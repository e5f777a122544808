//! Request overrides and the JSON response envelope
//!
//! Overrides arrive either as query-string pairs or as a JSON body. Any
//! override at all turns a request into a custom run that bypasses the cache.

use chrono::{DateTime, NaiveDate, Utc};
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::EngineConfig;
use crate::error::{ForecastError, Result};
use crate::fund::{FundHistory, FundRecord};
use crate::projection::DeterministicProjection;
use crate::simulation::{Confidence, ParameterDeriver, SimulationParams, SimulationResult};

/// Optional caller overrides
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationRequest {
    #[serde(default, alias = "balance")]
    pub current_balance: Option<f64>,

    /// Pool units per 30-day month
    #[serde(default, alias = "burnRate")]
    pub base_burn_rate: Option<f64>,

    #[serde(default, alias = "fraudRate")]
    pub fraud_rate_impact: Option<f64>,

    /// Kept as a float so non-integer input can be rejected with a reason
    #[serde(default)]
    pub simulation_count: Option<f64>,

    #[serde(default)]
    pub seed: Option<u64>,
}

impl SimulationRequest {
    /// Build a request from query-string pairs; unknown keys are ignored
    pub fn from_query<'a, I>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut request = SimulationRequest::default();

        for (key, value) in pairs {
            match key {
                "balance" | "currentBalance" => {
                    request.current_balance = Some(parse_number("currentBalance", value)?)
                }
                "burnRate" | "baseBurnRate" => {
                    request.base_burn_rate = Some(parse_number("baseBurnRate", value)?)
                }
                "fraudRate" | "fraudRateImpact" => {
                    request.fraud_rate_impact = Some(parse_number("fraudRateImpact", value)?)
                }
                "simulationCount" => {
                    request.simulation_count = Some(parse_number("simulationCount", value)?)
                }
                "seed" => {
                    let seed = value.trim().parse::<u64>().map_err(|_| {
                        ForecastError::validation("seed", format!("'{}' is not an unsigned integer", value))
                    })?;
                    request.seed = Some(seed);
                }
                _ => {}
            }
        }

        Ok(request)
    }

    /// Whether the request carries no overrides at all
    pub fn is_default(&self) -> bool {
        self.current_balance.is_none()
            && self.base_burn_rate.is_none()
            && self.fraud_rate_impact.is_none()
            && self.simulation_count.is_none()
            && self.seed.is_none()
    }

    /// Requested trial count, clamped to the configured cap
    ///
    /// Counts above the cap are served at the cap; zero, negative and
    /// fractional counts are rejected.
    pub fn resolved_simulation_count(&self, config: &EngineConfig) -> Result<u32> {
        let Some(requested) = self.simulation_count else {
            return Ok(config.default_count());
        };

        if !requested.is_finite() || requested.fract() != 0.0 {
            return Err(ForecastError::validation(
                "simulationCount",
                format!("must be a whole number, got {}", requested),
            ));
        }
        if requested < 1.0 {
            return Err(ForecastError::validation(
                "simulationCount",
                format!("must be at least 1, got {}", requested),
            ));
        }

        let cap = config.simulation_count_cap();
        if requested > cap as f64 {
            warn!("Requested {} simulations, capped at {}", requested, cap);
            return Ok(cap);
        }
        Ok(requested as u32)
    }

    /// Parameters derived from history with the overrides taking precedence
    ///
    /// Overrides replace derived values before validation, so a rejection
    /// always points at caller input.
    pub fn resolve_params(
        &self,
        deriver: &ParameterDeriver,
        records: &[FundRecord],
        config: &EngineConfig,
    ) -> Result<SimulationParams> {
        let history = FundHistory::new(records);

        SimulationParams::new(
            self.current_balance
                .unwrap_or_else(|| deriver.current_balance(&history)),
            self.base_burn_rate
                .unwrap_or_else(|| deriver.monthly_burn_rate(&history)),
            deriver.velocity_variance(&history),
            deriver.approval_variance(&history),
            self.fraud_rate_impact
                .unwrap_or(deriver.defaults().fraud_rate_impact),
            self.resolved_simulation_count(config)?,
        )
    }
}

fn parse_number(field: &'static str, value: &str) -> Result<f64> {
    value
        .trim()
        .parse::<f64>()
        .map_err(|_| ForecastError::validation(field, format!("'{}' is not a number", value)))
}

/// Simulation figures as returned to callers
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultsBody {
    pub percentile10: Option<NaiveDate>,
    pub percentile25: Option<NaiveDate>,
    pub median: Option<NaiveDate>,
    pub percentile75: Option<NaiveDate>,
    pub percentile90: Option<NaiveDate>,
    pub percentile95: Option<NaiveDate>,
    pub mean_days: Option<i64>,
    pub standard_deviation: Option<i64>,
    /// `before30Days` etc., integer percentages
    pub probabilities: BTreeMap<String, u32>,
    pub distribution: Vec<u32>,
    pub distribution_bucket_days: u32,
    pub non_terminating_trials: u32,
    pub confidence: Confidence,
}

impl From<&SimulationResult> for ResultsBody {
    fn from(result: &SimulationResult) -> Self {
        let dates = result.percentile_dates();
        let probabilities = result
            .probabilities
            .iter()
            .map(|t| (format!("before{}Days", t.days), t.percent()))
            .collect();

        Self {
            percentile10: dates.map(|d| d.p10),
            percentile25: dates.map(|d| d.p25),
            median: dates.map(|d| d.median),
            percentile75: dates.map(|d| d.p75),
            percentile90: dates.map(|d| d.p90),
            percentile95: dates.map(|d| d.p95),
            mean_days: result.mean_days.map(|m| m.round() as i64),
            standard_deviation: result.standard_deviation.map(|s| s.round() as i64),
            probabilities,
            distribution: result.histogram.counts.clone(),
            distribution_bucket_days: result.histogram.bucket_days,
            non_terminating_trials: result.non_terminating_trials(),
            confidence: result.confidence,
        }
    }
}

/// Run metadata
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMeta {
    pub simulation_count: u32,
    /// Time spent serving this request; near zero on a cache hit
    pub compute_time_ms: u64,
    pub snapshot_count: usize,
    pub timestamp: DateTime<Utc>,
    pub seed: u64,
}

/// Successful response envelope
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationResponse {
    pub success: bool,
    pub params: SimulationParams,
    pub results: ResultsBody,
    pub projection: DeterministicProjection,
    pub meta: ResponseMeta,
}

/// Failure envelope
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

impl From<&ForecastError> for ErrorResponse {
    fn from(err: &ForecastError) -> Self {
        Self {
            success: false,
            error: err.public_message(),
        }
    }
}
