//! Deterministic three-scenario linear projection
//!
//! A fast, explainable companion to the Monte Carlo result: the historical burn
//! rate is scaled by a fixed multiplier per scenario and run straight down to
//! zero.

use chrono::{Days, Months, NaiveDate};
use log::debug;
use serde::{Deserialize, Serialize};

use super::advisory::advisories;
use crate::config::{DerivationDefaults, ProjectorConfig, ScenarioMultipliers, DAYS_PER_MONTH};
use crate::fund::{FundHistory, FundRecord};
use crate::simulation::ParameterDeriver;

/// Projection scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scenario {
    Optimistic,
    Likely,
    Pessimistic,
}

impl Scenario {
    pub const ALL: [Scenario; 3] = [Scenario::Optimistic, Scenario::Likely, Scenario::Pessimistic];

    pub fn multiplier(&self, multipliers: &ScenarioMultipliers) -> f64 {
        match self {
            Scenario::Optimistic => multipliers.optimistic,
            Scenario::Likely => multipliers.likely,
            Scenario::Pessimistic => multipliers.pessimistic,
        }
    }
}

/// Zero-crossing for one scenario
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioOutcome {
    pub scenario: Scenario,
    pub multiplier: f64,
    pub daily_burn: f64,
    /// Far-future sentinel when the scenario never depletes
    pub insolvency_date: NaiveDate,
    /// `None` when the adjusted burn is zero or negative
    pub days_until_insolvent: Option<i64>,
}

impl ScenarioOutcome {
    pub fn depletes(&self) -> bool {
        self.days_until_insolvent.is_some()
    }
}

/// Projected balance on one day of the weekly series
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalancePoint {
    pub day: u32,
    pub date: NaiveDate,
    pub scenario: Scenario,
    pub balance: f64,
}

/// Historical burn rate at several granularities
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BurnRateSummary {
    pub daily: f64,
    pub weekly: f64,
    pub monthly: f64,
}

impl BurnRateSummary {
    pub fn from_daily(daily: f64) -> Self {
        Self {
            daily,
            weekly: daily * 7.0,
            monthly: daily * DAYS_PER_MONTH,
        }
    }
}

/// Complete deterministic projection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeterministicProjection {
    pub as_of: NaiveDate,
    pub current_balance: f64,
    pub burn_rate: BurnRateSummary,
    /// Optimistic, likely, pessimistic
    pub scenarios: Vec<ScenarioOutcome>,
    pub series: Vec<BalancePoint>,
    pub advisories: Vec<String>,
}

impl DeterministicProjection {
    pub fn scenario(&self, scenario: Scenario) -> Option<&ScenarioOutcome> {
        self.scenarios.iter().find(|s| s.scenario == scenario)
    }

    /// Likely-scenario zero-crossing date
    pub fn estimated_date(&self) -> Option<NaiveDate> {
        self.scenario(Scenario::Likely).map(|s| s.insolvency_date)
    }

    /// Likely-scenario day count
    pub fn days_until_insolvent(&self) -> Option<i64> {
        self.scenario(Scenario::Likely).and_then(|s| s.days_until_insolvent)
    }
}

/// Deterministic projector
#[derive(Debug, Clone, Default)]
pub struct DeterministicProjector {
    config: ProjectorConfig,
    deriver: ParameterDeriver,
}

impl DeterministicProjector {
    pub fn new(config: ProjectorConfig, defaults: DerivationDefaults) -> Self {
        Self {
            config,
            deriver: ParameterDeriver::new(defaults),
        }
    }

    /// Project from history, using the same balance and burn derivation as the
    /// simulation parameters
    pub fn project(&self, records: &[FundRecord], as_of: NaiveDate) -> DeterministicProjection {
        let history = FundHistory::new(records);
        let balance = self.deriver.current_balance(&history);
        let daily_burn = self.deriver.monthly_burn_rate(&history) / DAYS_PER_MONTH;
        self.project_from(balance, daily_burn, as_of)
    }

    /// Project from an explicit balance and daily burn
    pub fn project_from(&self, current_balance: f64, daily_burn: f64, as_of: NaiveDate) -> DeterministicProjection {
        let scenarios: Vec<ScenarioOutcome> = Scenario::ALL
            .iter()
            .map(|&scenario| self.scenario_outcome(scenario, current_balance, daily_burn, as_of))
            .collect();

        let series = self.weekly_series(current_balance, daily_burn, as_of);

        let likely_days = scenarios
            .iter()
            .find(|s| s.scenario == Scenario::Likely)
            .and_then(|s| s.days_until_insolvent);
        let advisories = advisories(&self.config, likely_days, daily_burn);

        debug!(
            "Deterministic projection: balance {}, daily burn {:.6}, likely days {:?}",
            current_balance, daily_burn, likely_days
        );

        DeterministicProjection {
            as_of,
            current_balance,
            burn_rate: BurnRateSummary::from_daily(daily_burn),
            scenarios,
            series,
            advisories,
        }
    }

    fn scenario_outcome(
        &self,
        scenario: Scenario,
        current_balance: f64,
        daily_burn: f64,
        as_of: NaiveDate,
    ) -> ScenarioOutcome {
        let multiplier = scenario.multiplier(&self.config.multipliers);
        let adjusted = daily_burn * multiplier;

        let days_until_insolvent = if adjusted > 0.0 {
            Some((current_balance / adjusted).ceil().max(0.0) as i64)
        } else {
            None
        };

        let insolvency_date = match days_until_insolvent {
            Some(days) => add_days(as_of, days as u64),
            None => as_of
                .checked_add_months(Months::new(self.config.far_future_years * 12))
                .unwrap_or(NaiveDate::MAX),
        };

        ScenarioOutcome {
            scenario,
            multiplier,
            daily_burn: adjusted,
            insolvency_date,
            days_until_insolvent,
        }
    }

    /// Balance every `series_step_days` up to `series_horizon_days`, floored at zero
    fn weekly_series(&self, current_balance: f64, daily_burn: f64, as_of: NaiveDate) -> Vec<BalancePoint> {
        let step = self.config.series_step_days.max(1) as usize;
        let mut series = Vec::new();

        for day in (0..=self.config.series_horizon_days).step_by(step) {
            let date = add_days(as_of, day as u64);
            for scenario in Scenario::ALL {
                let adjusted = daily_burn * scenario.multiplier(&self.config.multipliers);
                series.push(BalancePoint {
                    day,
                    date,
                    scenario,
                    balance: (current_balance - adjusted * day as f64).max(0.0),
                });
            }
        }

        series
    }
}

fn add_days(date: NaiveDate, days: u64) -> NaiveDate {
    date.checked_add_days(Days::new(days)).unwrap_or(NaiveDate::MAX)
}
