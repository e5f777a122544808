//! Fund Depletion - Monte Carlo forecasting of when a public benefit fund runs dry
//!
//! This library provides:
//! - Fund snapshot loading (CSV and JSON) and parameter derivation from history
//! - A seedable, parallel Monte Carlo engine for days-to-insolvency
//! - Percentile, probability and distribution statistics over trial outcomes
//! - A deterministic three-scenario projection with advisories
//! - A TTL cache for the canonical default-parameter run

pub mod error;
pub mod config;
pub mod fund;
pub mod simulation;
pub mod projection;
pub mod cache;
pub mod request;
pub mod service;

// Re-export commonly used types
pub use error::{ForecastError, Result};
pub use config::EngineConfig;
pub use fund::{load_records, FundHistory, FundRecord};
pub use simulation::{
    ParameterDeriver, SeedPolicy, SimulationEngine, SimulationParams, SimulationResult,
    StatisticsAggregator, TrialOutcome,
};
pub use projection::{DeterministicProjection, DeterministicProjector};
pub use cache::{Clock, ManualClock, ResultCache, SystemClock};
pub use request::{ErrorResponse, SimulationRequest, SimulationResponse};
pub use service::ForecastService;
