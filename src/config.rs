//! Engine configuration
//!
//! Every tunable constant of the engine lives here. Defaults reproduce the
//! published dashboard behaviour; a JSON file can override any subset.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;

use crate::error::Result;

/// Hard cap on trials per request
pub const MAX_SIMULATION_COUNT: u32 = 50_000;

/// Trials used when the caller does not ask for a count
pub const DEFAULT_SIMULATION_COUNT: u32 = 10_000;

/// Ten years of days
pub const DEFAULT_HORIZON_DAYS: u32 = 3650;

/// Burn rates are expressed per 30-day month
pub const DAYS_PER_MONTH: f64 = 30.0;

/// Family used for the per-period multiplier noise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoiseDistribution {
    /// Normal around 1.0 with the variance magnitude as standard deviation
    #[default]
    Normal,
    /// Uniform around 1.0 with the same standard deviation
    Uniform,
}

/// Inclusive clamp range for a multiplier
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClampRange {
    pub min: f64,
    pub max: f64,
}

impl ClampRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn apply(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }
}

/// Spread thresholds (std / mean) separating the confidence labels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceBands {
    /// Above this ratio the label drops to medium
    pub medium_above: f64,
    /// Above this ratio the label drops to low
    pub low_above: f64,
}

impl Default for ConfidenceBands {
    fn default() -> Self {
        Self {
            medium_above: 0.25,
            low_above: 0.5,
        }
    }
}

/// Substitutes used when history is too short to derive parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DerivationDefaults {
    pub current_balance: f64,
    /// Pool units per 30-day month
    pub base_burn_rate: f64,
    pub claim_velocity_variance: f64,
    pub approval_rate_variance: f64,
    pub fraud_rate_impact: f64,
    /// Cap on the claim-velocity coefficient of variation
    pub max_velocity_variance: f64,
    /// Cap on the approval-ratio coefficient of variation
    pub max_approval_variance: f64,
}

impl Default for DerivationDefaults {
    fn default() -> Self {
        Self {
            current_balance: 500.0,
            base_burn_rate: 8.0,
            claim_velocity_variance: 0.2,
            approval_rate_variance: 0.1,
            fraud_rate_impact: 0.1,
            max_velocity_variance: 0.5,
            max_approval_variance: 0.3,
        }
    }
}

/// Burn multipliers for the three deterministic scenarios
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScenarioMultipliers {
    pub optimistic: f64,
    pub likely: f64,
    pub pessimistic: f64,
}

impl Default for ScenarioMultipliers {
    fn default() -> Self {
        Self {
            optimistic: 0.7,
            likely: 1.0,
            pessimistic: 1.3,
        }
    }
}

/// Settings for the deterministic companion projection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectorConfig {
    pub multipliers: ScenarioMultipliers,
    /// Offset used as the zero-crossing date of a non-depleting scenario
    pub far_future_years: u32,
    pub series_horizon_days: u32,
    pub series_step_days: u32,
    /// Likely-scenario day counts that trigger urgent / warning / caution advisories
    pub advisory_days: [i64; 3],
    /// Daily burn above which a burn advisory is emitted
    pub high_burn_daily_threshold: Option<f64>,
}

impl Default for ProjectorConfig {
    fn default() -> Self {
        Self {
            multipliers: ScenarioMultipliers::default(),
            far_future_years: 100,
            series_horizon_days: 180,
            series_step_days: 7,
            advisory_days: [90, 180, 365],
            high_burn_daily_threshold: Some(1.0),
        }
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Days simulated before a trial is declared non-terminating
    pub horizon_days: u32,
    /// Days covered by one noise draw
    pub period_days: u32,
    pub noise: NoiseDistribution,
    pub velocity_clamp: ClampRange,
    pub approval_clamp: ClampRange,
    /// Request cap; never above [`MAX_SIMULATION_COUNT`]
    pub max_simulation_count: u32,
    pub default_simulation_count: u32,
    /// Smallest daily burn magnitude the period noise is scaled by, so a
    /// stable fund still carries variance
    pub min_deviation_daily: f64,
    /// Seed of the canonical (cached) default run
    pub canonical_seed: u64,
    /// Fixed worker count; `None` uses the global rayon pool
    pub threads: Option<usize>,
    pub cache_ttl_secs: u64,
    pub confidence_bands: ConfidenceBands,
    pub histogram_buckets: usize,
    pub threshold_days: [u32; 3],
    pub defaults: DerivationDefaults,
    pub projector: ProjectorConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            horizon_days: DEFAULT_HORIZON_DAYS,
            period_days: 30,
            noise: NoiseDistribution::Normal,
            velocity_clamp: ClampRange::new(0.5, 2.0),
            approval_clamp: ClampRange::new(0.7, 1.3),
            max_simulation_count: MAX_SIMULATION_COUNT,
            default_simulation_count: DEFAULT_SIMULATION_COUNT,
            min_deviation_daily: 0.01,
            canonical_seed: 42,
            threads: None,
            cache_ttl_secs: 3600,
            confidence_bands: ConfidenceBands::default(),
            histogram_buckets: 50,
            threshold_days: [30, 60, 90],
            defaults: DerivationDefaults::default(),
            projector: ProjectorConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load a configuration file; missing keys keep their defaults
    pub fn from_json_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let config: EngineConfig = serde_json::from_reader(file)?;
        Ok(config)
    }

    /// Effective request cap, bounded by [`MAX_SIMULATION_COUNT`]
    pub fn simulation_count_cap(&self) -> u32 {
        self.max_simulation_count.clamp(1, MAX_SIMULATION_COUNT)
    }

    /// Trial count for requests that do not ask for one, within the cap
    pub fn default_count(&self) -> u32 {
        self.default_simulation_count.clamp(1, self.simulation_count_cap())
    }

    /// Cache lifetime as a chrono duration
    pub fn cache_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.cache_ttl_secs as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{ "horizon_days": 720, "noise": "uniform" }"#).unwrap();

        assert_eq!(config.horizon_days, 720);
        assert_eq!(config.noise, NoiseDistribution::Uniform);
        assert_eq!(config.max_simulation_count, 50_000);
        assert_eq!(config.projector.multipliers.pessimistic, 1.3);
        assert_eq!(config.defaults.base_burn_rate, 8.0);
    }

    #[test]
    fn test_clamp_range() {
        let range = ClampRange::new(0.7, 1.3);
        assert_eq!(range.apply(0.2), 0.7);
        assert_eq!(range.apply(1.0), 1.0);
        assert_eq!(range.apply(5.0), 1.3);
    }

    #[test]
    fn test_simulation_counts_bounded_by_hard_cap() {
        let config: EngineConfig = serde_json::from_str(
            r#"{ "max_simulation_count": 100000, "default_simulation_count": 80000 }"#,
        )
        .unwrap();
        assert_eq!(config.simulation_count_cap(), MAX_SIMULATION_COUNT);
        assert_eq!(config.default_count(), MAX_SIMULATION_COUNT);

        let small = EngineConfig {
            max_simulation_count: 500,
            default_simulation_count: 0,
            ..Default::default()
        };
        assert_eq!(small.simulation_count_cap(), 500);
        assert_eq!(small.default_count(), 1);
        assert_eq!(EngineConfig::default().default_count(), 10_000);
    }

    #[test]
    fn test_high_burn_advisory_on_by_default() {
        assert_eq!(ProjectorConfig::default().high_burn_daily_threshold, Some(1.0));
    }

    #[test]
    fn test_cache_ttl_is_one_hour() {
        assert_eq!(EngineConfig::default().cache_ttl(), chrono::Duration::hours(1));
    }
}
