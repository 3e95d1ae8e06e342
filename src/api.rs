//! HTTP surface: router, handlers and the error envelope contract.
//!
//! Handlers never let a raw error escape; every failure path goes through
//! [`ServiceError`]'s `IntoResponse`, which mirrors `statusCode` onto the
//! HTTP status (500 when absent).

use crate::clients::market::MarketDataClient;
use crate::clients::prediction::PredictionClient;
use crate::clients::weather::WeatherClient;
use crate::config::{Config, FheMode};
use crate::error::ServiceError;
use crate::fhe::gateway::GatewayBackend;
use crate::fhe::simulation::SimulationBackend;
use crate::fhe::{ConfidentialComputeClient, EncryptedValue, FheBackend};
use crate::health::HealthAggregator;
use crate::types::{rfc3339_now, Domain, InputValue, PredictionInputs};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Dependency-injected service objects shared by all handlers. Constructed
/// once at startup; no hidden globals.
pub struct AppState {
    pub market: Arc<MarketDataClient>,
    pub weather: Arc<WeatherClient>,
    pub prediction: Arc<PredictionClient>,
    pub confidential: Arc<ConfidentialComputeClient>,
    pub health: HealthAggregator,
}

impl AppState {
    pub fn new(
        market: Arc<MarketDataClient>,
        weather: Arc<WeatherClient>,
        prediction: Arc<PredictionClient>,
        confidential: Arc<ConfidentialComputeClient>,
    ) -> Self {
        let health = HealthAggregator::new(
            market.clone(),
            weather.clone(),
            prediction.clone(),
            confidential.clone(),
        );
        Self {
            market,
            weather,
            prediction,
            confidential,
            health,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let backend: Arc<dyn FheBackend> = match config.fhe_mode {
            FheMode::Simulation => Arc::new(SimulationBackend),
            FheMode::Gateway => Arc::new(GatewayBackend::new(config.fhe_rpc_url.clone())),
        };
        Self::new(
            Arc::new(MarketDataClient::new(config.market_api_base.clone())),
            Arc::new(WeatherClient::new(
                config.weather_api_base.clone(),
                config.weather_api_key.clone(),
            )),
            Arc::new(PredictionClient::new(
                config.prediction_api_base.clone(),
                config.prediction_api_key.clone(),
            )),
            Arc::new(ConfidentialComputeClient::new(
                backend,
                config.fhe_rpc_url.clone(),
                config.fhe_chain_id,
            )),
        )
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status_code.unwrap_or(500))
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::warn!(service = %self.service, code = %self.code, error = %self.message, "request failed");
        }
        (status, Json(self)).into_response()
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/fetch-prediction", post(fetch_prediction))
        .route("/api/fetch-market/:symbol", get(fetch_market))
        .route("/api/fetch-trending", get(fetch_trending))
        .route("/api/fetch-weather/:city", get(fetch_weather))
        .route("/api/fetch-forecast/:city", get(fetch_forecast))
        .route("/api/fhe-public-key", get(fhe_public_key))
        .route("/api/encrypt-data", post(encrypt_data))
        .route("/api/public-decrypt", post(public_decrypt))
        .route(
            "/api/compute-encrypted-prediction",
            post(compute_encrypted_prediction),
        )
        .route("/api/confidential-prediction", post(confidential_prediction))
        // Demo posture: any origin may call the API.
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health(State(state): State<Arc<AppState>>) -> Response {
    let report = state.health.check_all().await;
    if let Some(critical) = report.first_critical_failure() {
        let envelope = json!({
            "success": false,
            "service": critical.service,
            "error": critical.error,
            "code": critical.code,
        });
        return (StatusCode::SERVICE_UNAVAILABLE, Json(envelope)).into_response();
    }
    Json(report).into_response()
}

/// Malformed or missing JSON bodies get the same envelope as every other
/// failure instead of the framework's default rejection.
fn require_json(body: Result<Json<Value>, JsonRejection>) -> Result<Value, ServiceError> {
    body.map(|Json(v)| v)
        .map_err(|_| ServiceError::validation("request body must be JSON"))
}

async fn fetch_prediction(
    State(state): State<Arc<AppState>>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, ServiceError> {
    let body = require_json(body)?;
    let (domain, inputs) = parse_prediction_request(&body)?;
    let prediction = state.prediction.predict(&domain, &inputs).await?;
    Ok(Json(json!({
        "success": true,
        "prediction": prediction,
        "timestamp": rfc3339_now(),
    })))
}

async fn fetch_market(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
) -> Result<Json<Value>, ServiceError> {
    let data = state.market.quote(&symbol).await?;
    Ok(Json(json!({
        "success": true,
        "data": data,
        "timestamp": rfc3339_now(),
    })))
}

async fn fetch_trending(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, ServiceError> {
    let data = state.market.trending().await?;
    Ok(Json(json!({
        "success": true,
        "data": data,
        "timestamp": rfc3339_now(),
    })))
}

async fn fetch_weather(
    State(state): State<Arc<AppState>>,
    Path(city): Path<String>,
) -> Result<Json<Value>, ServiceError> {
    let data = state.weather.current(&city).await?;
    Ok(Json(json!({
        "success": true,
        "data": data,
        "timestamp": rfc3339_now(),
    })))
}

async fn fetch_forecast(
    State(state): State<Arc<AppState>>,
    Path(city): Path<String>,
) -> Result<Json<Value>, ServiceError> {
    let data = state.weather.forecast(&city).await?;
    Ok(Json(json!({
        "success": true,
        "data": data,
        "timestamp": rfc3339_now(),
    })))
}

async fn fhe_public_key(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, ServiceError> {
    let public_key = state.confidential.public_key().await?;
    Ok(Json(json!({
        "success": true,
        "publicKey": public_key,
    })))
}

async fn encrypt_data(
    State(state): State<Arc<AppState>>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, ServiceError> {
    let body = require_json(body)?;
    let data = body
        .get("data")
        .and_then(|v| v.as_array())
        .ok_or_else(|| ServiceError::validation("data must be an array of numbers"))?
        .iter()
        .map(|v| {
            v.as_f64()
                .ok_or_else(|| ServiceError::validation("data must be an array of numbers"))
        })
        .collect::<Result<Vec<f64>, _>>()?;

    let encrypted = state.confidential.encrypt_batch(&data).await?;
    Ok(Json(json!({
        "success": true,
        "encrypted": {
            "encrypted": encrypted,
            "timestamp": rfc3339_now(),
        },
    })))
}

async fn public_decrypt(
    State(state): State<Arc<AppState>>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, ServiceError> {
    let body = require_json(body)?;
    let ciphertext = body
        .get("ciphertext")
        .and_then(|v| v.as_str())
        .ok_or_else(|| ServiceError::validation("ciphertext is required"))?;

    let decrypted_value = state.confidential.public_decrypt(ciphertext).await?;
    Ok(Json(json!({
        "success": true,
        "decryptedValue": decrypted_value,
    })))
}

async fn compute_encrypted_prediction(
    State(state): State<Arc<AppState>>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, ServiceError> {
    let body = require_json(body)?;
    let (encrypted_inputs, domain) = {
        let inputs = body.get("encryptedInputs").and_then(|v| v.as_array());
        let domain = body.get("domain").and_then(|v| v.as_str());
        match (inputs, domain) {
            (Some(inputs), Some(domain)) => {
                let parsed: Vec<EncryptedValue> = inputs
                    .iter()
                    .map(|v| serde_json::from_value(v.clone()))
                    .collect::<Result<_, _>>()
                    .map_err(|_| {
                        ServiceError::validation("encryptedInputs entries must be {data, handles}")
                    })?;
                (parsed, Domain::from(domain.to_string()))
            }
            _ => {
                return Err(ServiceError::validation(
                    "encryptedInputs (array) and domain (string) are required",
                ))
            }
        }
    };

    let prediction = state
        .confidential
        .compute_prediction(&encrypted_inputs, &domain)
        .await?;
    Ok(Json(json!({
        "success": true,
        "prediction": prediction,
    })))
}

/// Full pipeline: encrypt the raw inputs, fetch the AI prediction, run the
/// encrypted computation. Fails on the first step that fails.
async fn confidential_prediction(
    State(state): State<Arc<AppState>>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, ServiceError> {
    let body = require_json(body)?;
    let inputs = body.get("inputs").and_then(|v| v.as_array());
    let domain = body.get("domain").and_then(|v| v.as_str());
    let (Some(inputs), Some(domain)) = (inputs, domain) else {
        return Err(ServiceError::validation(
            "inputs (array) and domain (string) are required",
        ));
    };
    let values: Vec<f64> = inputs.iter().filter_map(|v| v.as_f64()).collect();
    if values.len() != inputs.len() {
        return Err(ServiceError::validation("inputs must be numbers"));
    }
    let domain = Domain::from(domain.to_string());

    let encrypted = state.confidential.encrypt_batch(&values).await?;

    let at = |i: usize| InputValue::from(values.get(i).copied().unwrap_or(0.0));
    let ai_prediction = state
        .prediction
        .predict(
            &domain,
            &PredictionInputs {
                input1: at(0),
                input2: at(1),
                input3: at(2),
            },
        )
        .await?;

    let encrypted_prediction = state
        .confidential
        .compute_prediction(&encrypted, &domain)
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": {
            "aiPrediction": ai_prediction,
            "encryptedPrediction": {
                "domain": encrypted_prediction.domain,
                "timestamp": encrypted_prediction.timestamp,
                "encrypted": true,
            },
        },
    })))
}

fn parse_prediction_request(body: &Value) -> Result<(Domain, PredictionInputs), ServiceError> {
    let domain = body.get("domain").and_then(|v| v.as_str());
    let inputs = body.get("inputs");
    let (Some(domain), Some(inputs)) = (domain, inputs) else {
        return Err(ServiceError::validation(
            "missing required fields: domain, inputs",
        ));
    };
    let inputs: PredictionInputs = serde_json::from_value(inputs.clone())
        .map_err(|_| ServiceError::validation("inputs must carry input1, input2, input3"))?;
    Ok((Domain::from(domain.to_string()), inputs))
}
