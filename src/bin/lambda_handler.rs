//! AWS Lambda handler for fund-depletion forecasts
//!
//! Serves API Gateway proxy events. GET reads overrides from the query string,
//! POST from a JSON body, OPTIONS answers CORS preflight. The service (and its
//! cached default run) lives for as long as the warm container does.
//!
//! Environment:
//! - `FUND_RECORDS_PATH` CSV or JSON snapshot file; defaults apply without it
//! - `FORECAST_CONFIG_PATH` optional engine configuration JSON

use aws_lambda_events::apigw::{ApiGatewayProxyRequest, ApiGatewayProxyResponse};
use aws_lambda_events::encodings::Body;
use fund_depletion::{
    load_records, EngineConfig, ErrorResponse, ForecastError, ForecastService, FundRecord,
    SimulationRequest,
};
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use log::{error, info, warn};
use serde::Serialize;

const QUERY_KEYS: [&str; 8] = [
    "balance",
    "currentBalance",
    "burnRate",
    "baseBurnRate",
    "fraudRate",
    "fraudRateImpact",
    "simulationCount",
    "seed",
];

fn json_response<T: Serialize>(status: i64, body: &T) -> Result<ApiGatewayProxyResponse, Error> {
    let mut response = ApiGatewayProxyResponse {
        status_code: status,
        body: Some(Body::Text(serde_json::to_string(body)?)),
        ..Default::default()
    };
    response.headers.insert("content-type", "application/json".parse()?);
    response.headers.insert("access-control-allow-origin", "*".parse()?);
    Ok(response)
}

fn preflight_response() -> Result<ApiGatewayProxyResponse, Error> {
    let mut response = ApiGatewayProxyResponse {
        status_code: 204,
        ..Default::default()
    };
    response.headers.insert("access-control-allow-origin", "*".parse()?);
    response.headers.insert("access-control-allow-methods", "GET, POST, OPTIONS".parse()?);
    response.headers.insert("access-control-allow-headers", "Content-Type".parse()?);
    Ok(response)
}

fn error_response(err: &ForecastError) -> Result<ApiGatewayProxyResponse, Error> {
    let status = if err.is_client_error() {
        warn!("Rejected request: {}", err);
        400
    } else {
        error!("Forecast failed: {}", err);
        500
    };
    json_response(status, &ErrorResponse::from(err))
}

/// Overrides from the query string (GET) or the JSON body (anything else)
fn parse_request(event: &ApiGatewayProxyRequest) -> Result<SimulationRequest, ForecastError> {
    if event.http_method.as_str() == "GET" {
        let params = &event.query_string_parameters;
        let pairs: Vec<(&str, &str)> = QUERY_KEYS
            .iter()
            .filter_map(|&key| params.first(key).map(|value| (key, value)))
            .collect();
        return SimulationRequest::from_query(pairs);
    }

    match event.body.as_deref().map(str::trim) {
        None | Some("") => Ok(SimulationRequest::default()),
        Some(body) => Ok(serde_json::from_str(body)?),
    }
}

async fn handler(
    service: &ForecastService,
    records: &[FundRecord],
    event: LambdaEvent<ApiGatewayProxyRequest>,
) -> Result<ApiGatewayProxyResponse, Error> {
    if event.payload.http_method.as_str() == "OPTIONS" {
        return preflight_response();
    }

    let request = match parse_request(&event.payload) {
        Ok(request) => request,
        Err(err) => return error_response(&err),
    };

    match service.handle(records, &request) {
        Ok(response) => json_response(200, &response),
        Err(err) => error_response(&err),
    }
}

fn load_config() -> EngineConfig {
    match std::env::var("FORECAST_CONFIG_PATH") {
        Ok(path) => EngineConfig::from_json_path(&path).unwrap_or_else(|e| {
            warn!("Could not load config from {}: {}; using defaults", path, e);
            EngineConfig::default()
        }),
        Err(_) => EngineConfig::default(),
    }
}

fn load_history() -> Vec<FundRecord> {
    match std::env::var("FUND_RECORDS_PATH") {
        Ok(path) => load_records(&path).unwrap_or_else(|e| {
            warn!("Could not load fund records from {}: {}; using defaults", path, e);
            Vec::new()
        }),
        Err(_) => Vec::new(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    env_logger::init();

    let service = ForecastService::new(load_config());
    let records = load_history();
    info!("Forecast service ready with {} fund snapshots", records.len());

    let service = &service;
    let records = records.as_slice();
    run(service_fn(move |event| async move { handler(service, records, event).await })).await
}
