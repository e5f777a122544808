//! Deterministic scenario projection alongside the stochastic engine

mod projector;
mod advisory;

pub use projector::{
    DeterministicProjector, DeterministicProjection, Scenario, ScenarioOutcome,
    BalancePoint, BurnRateSummary,
};
pub use advisory::advisories;
