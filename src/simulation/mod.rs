//! Monte Carlo depletion simulation
//!
//! Data flow: fund records -> [`ParameterDeriver`] -> [`SimulationParams`] ->
//! [`SimulationEngine`] -> trial outcomes -> [`StatisticsAggregator`] ->
//! [`SimulationResult`].

mod params;
mod rng;
mod engine;
mod statistics;

pub use params::{SimulationParams, ParameterDeriver};
pub use rng::{TrialRngFactory, ChaChaStreams, SeedPolicy};
pub use engine::{SimulationEngine, TrialOutcome};
pub use statistics::{
    StatisticsAggregator, SimulationResult, Percentiles, PercentileDates,
    ThresholdProbability, Histogram, Confidence, percentile,
};
