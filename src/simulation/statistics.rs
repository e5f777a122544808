//! Reduction of trial outcomes into percentiles, moments and probabilities
//!
//! Trials that never become insolvent inside the horizon are left out of the
//! percentiles, mean, standard deviation and histogram, but they still count in
//! the denominator of every threshold probability.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use super::engine::TrialOutcome;
use crate::config::{ConfidenceBands, EngineConfig};
use crate::error::{ForecastError, Result};

/// Qualitative spread label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::High => "high",
            Confidence::Medium => "medium",
            Confidence::Low => "low",
        }
    }
}

/// Days-to-insolvency at the reported percentiles
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Percentiles {
    pub p10: f64,
    pub p25: f64,
    pub median: f64,
    pub p75: f64,
    pub p90: f64,
    pub p95: f64,
}

impl Percentiles {
    pub fn as_array(&self) -> [f64; 6] {
        [self.p10, self.p25, self.median, self.p75, self.p90, self.p95]
    }

    /// Calendar dates reached after each percentile's day count
    pub fn dates(&self, as_of: NaiveDate) -> PercentileDates {
        PercentileDates {
            p10: offset_date(as_of, self.p10),
            p25: offset_date(as_of, self.p25),
            median: offset_date(as_of, self.median),
            p75: offset_date(as_of, self.p75),
            p90: offset_date(as_of, self.p90),
            p95: offset_date(as_of, self.p95),
        }
    }
}

/// Percentile day counts expressed as calendar dates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PercentileDates {
    pub p10: NaiveDate,
    pub p25: NaiveDate,
    pub median: NaiveDate,
    pub p75: NaiveDate,
    pub p90: NaiveDate,
    pub p95: NaiveDate,
}

fn offset_date(as_of: NaiveDate, days: f64) -> NaiveDate {
    as_of
        .checked_add_days(Days::new(days.round().max(0.0) as u64))
        .unwrap_or(NaiveDate::MAX)
}

/// Share of all trials insolvent strictly before `days`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdProbability {
    pub days: u32,
    /// Fraction in [0, 1]
    pub probability: f64,
}

impl ThresholdProbability {
    /// Probability as a rounded 0-100 percentage
    pub fn percent(&self) -> u32 {
        (self.probability * 100.0).round() as u32
    }
}

/// Bucketed day counts of insolvent trials
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    /// Width of every bucket in days; the last bucket also takes the tail
    pub bucket_days: u32,
    pub counts: Vec<u32>,
}

/// Aggregated output of one simulation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    /// Day from which percentile dates are counted
    pub as_of: NaiveDate,
    /// `None` when no trial became insolvent
    pub percentiles: Option<Percentiles>,
    pub mean_days: Option<f64>,
    pub standard_deviation: Option<f64>,
    /// Ascending by `days`
    pub probabilities: Vec<ThresholdProbability>,
    pub histogram: Histogram,
    pub confidence: Confidence,
    pub trial_count: u32,
    pub insolvent_trials: u32,
    pub seed: u64,
}

impl SimulationResult {
    pub fn percentile_dates(&self) -> Option<PercentileDates> {
        self.percentiles.map(|p| p.dates(self.as_of))
    }

    pub fn non_terminating_trials(&self) -> u32 {
        self.trial_count - self.insolvent_trials
    }

    /// Probability for an exact threshold, if it was computed
    pub fn probability_before(&self, days: u32) -> Option<f64> {
        self.probabilities
            .iter()
            .find(|t| t.days == days)
            .map(|t| t.probability)
    }
}

/// Reduces trial outcomes into a `SimulationResult`
#[derive(Debug, Clone)]
pub struct StatisticsAggregator {
    bands: ConfidenceBands,
    histogram_buckets: usize,
    threshold_days: Vec<u32>,
}

impl Default for StatisticsAggregator {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl StatisticsAggregator {
    pub fn new(bands: ConfidenceBands, histogram_buckets: usize, threshold_days: &[u32]) -> Self {
        let mut threshold_days = threshold_days.to_vec();
        threshold_days.sort_unstable();
        threshold_days.dedup();
        Self {
            bands,
            histogram_buckets: histogram_buckets.max(1),
            threshold_days,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            config.confidence_bands,
            config.histogram_buckets,
            &config.threshold_days,
        )
    }

    pub fn aggregate(
        &self,
        outcomes: &[TrialOutcome],
        as_of: NaiveDate,
        seed: u64,
    ) -> Result<SimulationResult> {
        if outcomes.is_empty() {
            return Err(ForecastError::Unexpected(
                "no trial outcomes to aggregate".to_string(),
            ));
        }

        let mut days: Vec<u32> = outcomes.iter().filter_map(TrialOutcome::days).collect();
        days.sort_unstable();
        let sorted: Vec<f64> = days.iter().map(|&d| d as f64).collect();

        let percentiles = if sorted.is_empty() {
            None
        } else {
            Some(Percentiles {
                p10: percentile(&sorted, 10.0),
                p25: percentile(&sorted, 25.0),
                median: percentile(&sorted, 50.0),
                p75: percentile(&sorted, 75.0),
                p90: percentile(&sorted, 90.0),
                p95: percentile(&sorted, 95.0),
            })
        };

        let moments = mean_and_std(&sorted);
        let total = outcomes.len() as f64;
        let probabilities = self
            .threshold_days
            .iter()
            .map(|&threshold| {
                let before = days.partition_point(|&d| d < threshold);
                ThresholdProbability {
                    days: threshold,
                    probability: before as f64 / total,
                }
            })
            .collect();

        Ok(SimulationResult {
            as_of,
            percentiles,
            mean_days: moments.map(|(mean, _)| mean),
            standard_deviation: moments.map(|(_, std)| std),
            probabilities,
            histogram: self.histogram(&sorted),
            confidence: self.confidence(moments),
            trial_count: outcomes.len() as u32,
            insolvent_trials: days.len() as u32,
            seed,
        })
    }

    /// Label from the std / mean ratio
    pub fn confidence(&self, moments: Option<(f64, f64)>) -> Confidence {
        match moments {
            None => Confidence::Low,
            Some((mean, std)) if mean <= 0.0 => {
                if std > 0.0 {
                    Confidence::Low
                } else {
                    Confidence::High
                }
            }
            Some((mean, std)) => {
                let spread = std / mean;
                if spread > self.bands.low_above {
                    Confidence::Low
                } else if spread > self.bands.medium_above {
                    Confidence::Medium
                } else {
                    Confidence::High
                }
            }
        }
    }

    fn histogram(&self, sorted: &[f64]) -> Histogram {
        let buckets = self.histogram_buckets;
        let mut counts = vec![0u32; buckets];
        if sorted.is_empty() {
            return Histogram { bucket_days: 1, counts };
        }

        let p99 = percentile(sorted, 99.0);
        let bucket_days = ((p99 / buckets as f64).ceil() as u32).max(1);
        for &d in sorted {
            let idx = ((d as u32 / bucket_days) as usize).min(buckets - 1);
            counts[idx] += 1;
        }

        Histogram { bucket_days, counts }
    }
}

/// Linear interpolation between the order statistics around rank `p/100 * (n-1)`
///
/// `sorted` must be ascending and non-empty.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let rank = (p / 100.0).clamp(0.0, 1.0) * (n - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let weight = rank - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * weight
}

/// Population mean and standard deviation
fn mean_and_std(values: &[f64]) -> Option<(f64, f64)> {
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    Some((mean, variance.sqrt()))
}
