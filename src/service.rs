//! Request orchestration
//!
//! Holds everything a caller needs between requests: the derived engine and
//! aggregator, the projector, and the canonical result cache. One service per
//! process (or per warm Lambda container) gives one cache slot.

use chrono::{DateTime, NaiveDate, Utc};
use log::{debug, info};
use std::sync::Arc;
use std::time::Instant;

use crate::cache::{Clock, ResultCache, SystemClock};
use crate::config::EngineConfig;
use crate::error::Result;
use crate::fund::FundRecord;
use crate::projection::DeterministicProjector;
use crate::request::{ResponseMeta, ResultsBody, SimulationRequest, SimulationResponse};
use crate::simulation::{
    ParameterDeriver, SeedPolicy, SimulationEngine, SimulationParams, SimulationResult,
    StatisticsAggregator, TrialRngFactory,
};

/// The cached default-parameter run
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalRun {
    pub params: SimulationParams,
    pub result: SimulationResult,
    pub snapshot_count: usize,
}

/// Pre-built engine, aggregator and cache shared by every request
///
/// # Example
/// ```ignore
/// let service = ForecastService::new(EngineConfig::default());
/// let records = load_records("snapshots.json")?;
///
/// let default_run = service.handle(&records, &SimulationRequest::default())?;
/// let custom_run = service.handle(&records, &SimulationRequest {
///     fraud_rate_impact: Some(0.3),
///     ..Default::default()
/// })?;
/// ```
#[derive(Debug)]
pub struct ForecastService {
    config: EngineConfig,
    deriver: ParameterDeriver,
    engine: SimulationEngine,
    aggregator: StatisticsAggregator,
    projector: DeterministicProjector,
    cache: ResultCache<CanonicalRun>,
}

impl ForecastService {
    /// Service on the wall clock
    pub fn new(config: EngineConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Service whose cache and as-of date follow the given clock
    pub fn with_clock(config: EngineConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            deriver: ParameterDeriver::new(config.defaults),
            engine: SimulationEngine::new(config.clone()),
            aggregator: StatisticsAggregator::from_config(&config),
            projector: DeterministicProjector::new(config.projector.clone(), config.defaults),
            cache: ResultCache::new(config.cache_ttl(), clock),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cache(&self) -> &ResultCache<CanonicalRun> {
        &self.cache
    }

    /// Parameters derived from history with the default trial count
    pub fn default_params(&self, records: &[FundRecord]) -> Result<SimulationParams> {
        self.deriver.derive(records, self.config.default_count())
    }

    /// Derived parameters with the request's overrides applied
    pub fn params_for(&self, records: &[FundRecord], request: &SimulationRequest) -> Result<SimulationParams> {
        request.resolve_params(&self.deriver, records, &self.config)
    }

    /// Run the engine and aggregate the outcomes
    pub fn simulate(&self, params: &SimulationParams, seed: SeedPolicy, as_of: NaiveDate) -> Result<SimulationResult> {
        let streams = seed.streams();
        let outcomes = self.engine.run(params, &streams)?;
        self.aggregator.aggregate(&outcomes, as_of, streams.seed())
    }

    /// Serve one request
    ///
    /// A request without overrides is answered from the cache when the cached
    /// run is still fresh, otherwise it is recomputed with the canonical seed
    /// and stored. A request with any override always recomputes and never
    /// touches the cache.
    pub fn handle(&self, records: &[FundRecord], request: &SimulationRequest) -> Result<SimulationResponse> {
        let start = Instant::now();
        let now = self.cache.now();
        let as_of = now.date_naive();

        let (params, result, snapshot_count, timestamp) = if request.is_default() {
            let (entry, hit) = self.cache.get_or_try_insert_with(|| self.canonical_run(records, as_of))?;
            debug!("Default request served ({})", if hit { "cached" } else { "computed" });
            (
                entry.value.params,
                entry.value.result.clone(),
                entry.value.snapshot_count,
                entry.created_at,
            )
        } else {
            let params = self.params_for(records, request)?;
            let seed = match request.seed {
                Some(seed) => SeedPolicy::Fixed(seed),
                None => SeedPolicy::Entropy,
            };
            let result = self.simulate(&params, seed, as_of)?;
            (params, result, records.len(), now)
        };

        let projection = self.projector.project(records, as_of);
        let compute_time_ms = start.elapsed().as_millis() as u64;

        Ok(SimulationResponse {
            success: true,
            params,
            results: ResultsBody::from(&result),
            projection,
            meta: response_meta(&params, &result, snapshot_count, compute_time_ms, timestamp),
        })
    }

    fn canonical_run(&self, records: &[FundRecord], as_of: NaiveDate) -> Result<CanonicalRun> {
        let params = self.default_params(records)?;
        let result = self.simulate(&params, SeedPolicy::Fixed(self.config.canonical_seed), as_of)?;
        info!(
            "Canonical run refreshed from {} snapshots: median {:?} days",
            records.len(),
            result.percentiles.map(|p| p.median)
        );
        Ok(CanonicalRun {
            params,
            result,
            snapshot_count: records.len(),
        })
    }
}

fn response_meta(
    params: &SimulationParams,
    result: &SimulationResult,
    snapshot_count: usize,
    compute_time_ms: u64,
    timestamp: DateTime<Utc>,
) -> ResponseMeta {
    ResponseMeta {
        simulation_count: params.simulation_count(),
        compute_time_ms,
        snapshot_count,
        timestamp,
        seed: result.seed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use chrono::{Duration, TimeZone};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
    }

    fn service() -> (ForecastService, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(start()));
        let config = EngineConfig {
            default_simulation_count: 2_000,
            ..Default::default()
        };
        (ForecastService::with_clock(config, clock.clone()), clock)
    }

    fn history() -> Vec<FundRecord> {
        let day = |d| NaiveDate::from_ymd_opt(2026, 2, d).unwrap();
        vec![
            FundRecord::new(day(28), 470.0, 1_300.0, 1_100.0),
            FundRecord::new(day(14), 478.0, 1_150.0, 900.0),
            FundRecord::new(day(1), 485.0, 1_000.0, 850.0),
        ]
    }

    #[test]
    fn test_default_requests_hit_cache() {
        let (service, _clock) = service();
        let records = history();

        let first = service.handle(&records, &SimulationRequest::default()).unwrap();
        let second = service.handle(&records, &SimulationRequest::default()).unwrap();

        assert_eq!(service.cache().misses(), 1);
        assert_eq!(service.cache().hits(), 1);
        assert_eq!(first.results, second.results);
        assert_eq!(first.params, second.params);
        assert_eq!(first.meta.timestamp, second.meta.timestamp);
        assert_eq!(first.meta.seed, 42);
        assert_eq!(first.meta.snapshot_count, 3);
    }

    #[test]
    fn test_override_bypasses_cache() {
        let (service, _clock) = service();
        let records = history();
        let custom = SimulationRequest {
            current_balance: Some(120.0),
            seed: Some(7),
            ..Default::default()
        };

        let response = service.handle(&records, &custom).unwrap();
        assert_eq!(response.params.current_balance(), 120.0);
        assert!(service.cache().get().is_none());
        assert_eq!(service.cache().hits() + service.cache().misses(), 0);

        // a cached default does not leak into a custom request either
        let default = service.handle(&records, &SimulationRequest::default()).unwrap();
        let again = service.handle(&records, &custom).unwrap();
        assert_ne!(default.params.current_balance(), again.params.current_balance());
        assert_eq!(response.results, again.results);
        assert_eq!(service.cache().misses(), 1);
        assert_eq!(service.cache().hits(), 0);
    }

    #[test]
    fn test_cache_expires_after_ttl() {
        let (service, clock) = service();
        let records = history();

        service.handle(&records, &SimulationRequest::default()).unwrap();
        clock.advance(Duration::minutes(30));
        service.handle(&records, &SimulationRequest::default()).unwrap();
        assert_eq!(service.cache().hits(), 1);

        clock.advance(Duration::minutes(31));
        let refreshed = service.handle(&records, &SimulationRequest::default()).unwrap();
        assert_eq!(service.cache().misses(), 2);
        assert_eq!(refreshed.meta.timestamp, start() + Duration::minutes(61));
    }

    #[test]
    fn test_simulation_count_is_capped() {
        let (service, _clock) = service();
        let request = SimulationRequest {
            current_balance: Some(10.0),
            simulation_count: Some(1_000_000.0),
            seed: Some(1),
            ..Default::default()
        };

        let response = service.handle(&[], &request).unwrap();
        assert_eq!(response.meta.simulation_count, 50_000);
        assert_eq!(response.params.simulation_count(), 50_000);
    }

    #[test]
    fn test_ordering_and_monotonicity() {
        let (service, _clock) = service();
        let request = SimulationRequest {
            current_balance: Some(60.0),
            seed: Some(11),
            ..Default::default()
        };

        let response = service.handle(&history(), &request).unwrap();
        let results = &response.results;
        let dates = [
            results.percentile10,
            results.percentile25,
            results.median,
            results.percentile75,
            results.percentile90,
            results.percentile95,
        ];
        assert!(dates.iter().all(Option::is_some));
        assert!(dates.windows(2).all(|w| w[0] <= w[1]));

        let p30 = results.probabilities["before30Days"];
        let p60 = results.probabilities["before60Days"];
        let p90 = results.probabilities["before90Days"];
        assert!(p30 <= p60 && p60 <= p90);
        assert!(p90 <= 100);
    }

    #[test]
    fn test_seeded_custom_runs_reproduce() {
        let (service, _clock) = service();
        let request = SimulationRequest {
            fraud_rate_impact: Some(0.25),
            seed: Some(2024),
            ..Default::default()
        };

        let first = service.handle(&history(), &request).unwrap();
        let second = service.handle(&history(), &request).unwrap();
        assert_eq!(first.results, second.results);
        assert_eq!(first.meta.seed, 2024);
    }

    #[test]
    fn test_zero_variance_matches_closed_form() {
        let (service, _clock) = service();
        let params = SimulationParams::new(500.0, 8.0, 0.0, 0.0, 0.0, 200).unwrap();

        let result = service.simulate(&params, SeedPolicy::Entropy, start().date_naive()).unwrap();
        let percentiles = result.percentiles.unwrap();
        assert!((1874.0..=1876.0).contains(&percentiles.p10));
        assert_eq!(percentiles.p10, percentiles.p95);
        assert_eq!(result.standard_deviation, Some(0.0));
    }

    #[test]
    fn test_fraud_does_not_delay_median() {
        let (service, _clock) = service();
        let as_of = start().date_naive();
        let honest = SimulationParams::new(300.0, 9.0, 0.3, 0.2, 0.0, 2_000).unwrap();
        let fraudulent = honest.with_fraud_rate_impact(0.5).unwrap();

        let honest = service.simulate(&honest, SeedPolicy::Fixed(5), as_of).unwrap();
        let fraudulent = service.simulate(&fraudulent, SeedPolicy::Fixed(5), as_of).unwrap();

        let median = |r: &SimulationResult| r.percentiles.unwrap().median;
        assert!(median(&fraudulent) <= median(&honest));
    }

    #[test]
    fn test_deficit_history_does_not_reject_requests() {
        let (service, _clock) = service();
        let day = |d| NaiveDate::from_ymd_opt(2026, 2, d).unwrap();
        let records = vec![
            FundRecord::new(day(28), -12.0, 0.0, 0.0),
            FundRecord::new(day(1), 40.0, 0.0, 0.0),
        ];

        let custom = SimulationRequest {
            current_balance: Some(100.0),
            seed: Some(1),
            ..Default::default()
        };
        let response = service.handle(&records, &custom).unwrap();
        assert_eq!(response.params.current_balance(), 100.0);

        // an already exhausted fund is insolvent today, not an error
        let default = service.handle(&records, &SimulationRequest::default()).unwrap();
        assert_eq!(default.params.current_balance(), 0.0);
        assert_eq!(default.results.median, Some(start().date_naive()));
        assert_eq!(default.results.probabilities["before30Days"], 100);
    }

    #[test]
    fn test_rejects_invalid_overrides() {
        let (service, _clock) = service();

        let negative = SimulationRequest {
            current_balance: Some(-5.0),
            ..Default::default()
        };
        let err = service.handle(&[], &negative).unwrap_err();
        assert!(err.is_client_error());

        let fractional = SimulationRequest {
            simulation_count: Some(99.5),
            ..Default::default()
        };
        assert!(service.handle(&[], &fractional).unwrap_err().is_client_error());
        assert!(service.cache().get().is_none());
    }
}
