//! Error-normalization contract of the vendor clients, exercised against
//! stub vendor servers.

mod common;

use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use common::{spawn, unreachable_base};
use confidential_predictor::clients::market::MarketDataClient;
use confidential_predictor::clients::prediction::PredictionClient;
use confidential_predictor::clients::weather::WeatherClient;
use confidential_predictor::fhe::simulation::SimulationBackend;
use confidential_predictor::fhe::ConfidentialComputeClient;
use confidential_predictor::types::{Domain, InputValue, PredictionInputs};
use confidential_predictor::{ErrorCode, Service};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;

fn sample_inputs() -> PredictionInputs {
    PredictionInputs {
        input1: InputValue("50000".into()),
        input2: InputValue("2500".into()),
        input3: InputValue("7.5".into()),
    }
}

#[tokio::test]
async fn rate_limited_price_vendor_hits_the_429_row() {
    let app = Router::new().route(
        "/simple/price",
        get(|| async { (StatusCode::TOO_MANY_REQUESTS, Json(json!({"error": "slow down"}))) }),
    );
    let base = spawn(app).await;

    let err = MarketDataClient::new(base)
        .quote("bitcoin")
        .await
        .unwrap_err();
    assert_eq!(err.service, Service::MarketData);
    assert_eq!(err.code, ErrorCode::Http(429));
    assert_eq!(err.status_code, Some(429));
}

#[tokio::test]
async fn unreachable_price_vendor_is_a_connection_error() {
    let err = MarketDataClient::new(unreachable_base())
        .quote("bitcoin")
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::ConnectionError);
    assert_eq!(err.status_code, Some(503));
}

#[tokio::test]
async fn missing_symbol_in_price_response_is_symbol_not_found() {
    let app = Router::new().route("/simple/price", get(|| async { Json(json!({})) }));
    let base = spawn(app).await;

    let err = MarketDataClient::new(base)
        .quote("notacoin")
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::SymbolNotFound);
    assert_eq!(err.status_code, Some(404));
    assert!(err.message.contains("notacoin"));
}

#[tokio::test]
async fn price_quote_reads_the_vendor_shape() {
    let app = Router::new().route(
        "/simple/price",
        get(|| async {
            Json(json!({
                "bitcoin": {
                    "usd": 43_000.5,
                    "usd_24h_change": -1.25,
                    "usd_market_cap": 8.4e11,
                    "usd_24h_vol": 2.1e10,
                }
            }))
        }),
    );
    let base = spawn(app).await;

    let quote = MarketDataClient::new(base).quote("bitcoin").await.unwrap();
    assert_eq!(quote.symbol, "bitcoin");
    assert_eq!(quote.price, 43_000.5);
    assert_eq!(quote.change_24h, Some(-1.25));
}

#[tokio::test]
async fn market_probe_checks_the_ping_marker() {
    let good = Router::new().route(
        "/ping",
        get(|| async { Json(json!({"gecko_says": "(V3) To the Moon!"})) }),
    );
    let status = MarketDataClient::new(spawn(good).await).probe().await;
    assert!(status.success);
    assert_eq!(status.status.as_deref(), Some("connected"));

    let odd = Router::new().route("/ping", get(|| async { Json(json!({"gecko_says": "??"})) }));
    let status = MarketDataClient::new(spawn(odd).await).probe().await;
    assert!(!status.success);
    assert_eq!(status.code, Some(ErrorCode::InvalidResponse));
}

#[tokio::test]
async fn unknown_city_maps_to_the_vendor_400_row() {
    let app = Router::new().route(
        "/current.json",
        get(|| async {
            (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": {"message": "No matching location found."}})),
            )
        }),
    );
    let base = spawn(app).await;

    let err = WeatherClient::new(base, "key")
        .current("atlantis")
        .await
        .unwrap_err();
    assert_eq!(err.service, Service::Weather);
    assert_eq!(err.code, ErrorCode::Http(400));
    assert_eq!(err.status_code, Some(400));
    assert!(err.message.contains("atlantis"));
}

#[tokio::test]
async fn weather_auth_failures_report_the_key() {
    let app = Router::new().route(
        "/current.json",
        get(|| async { (StatusCode::UNAUTHORIZED, Json(json!({"error": {"message": "bad key"}}))) }),
    );
    let base = spawn(app).await;

    let err = WeatherClient::new(base, "key")
        .current("London")
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::Http(401));
    assert!(err.message.contains("key invalid or expired"));
}

#[tokio::test]
async fn weather_report_converts_wind_to_mps() {
    let app = Router::new().route(
        "/current.json",
        get(|| async {
            Json(json!({
                "location": {"name": "London", "country": "United Kingdom"},
                "current": {
                    "temp_c": 18.5,
                    "humidity": 70,
                    "pressure_mb": 1012,
                    "condition": {"text": "Partly cloudy"},
                    "wind_kph": 18.0,
                }
            }))
        }),
    );
    let base = spawn(app).await;

    let report = WeatherClient::new(base, "key").current("London").await.unwrap();
    assert_eq!(report.city, "London");
    assert_eq!(report.wind_speed, 5.0);
    assert_eq!(report.description, "Partly cloudy");
}

#[tokio::test]
async fn rate_limited_weather_vendor_hits_the_429_row() {
    let app = Router::new().route(
        "/current.json",
        get(|| async { (StatusCode::TOO_MANY_REQUESTS, Json(json!({}))) }),
    );
    let base = spawn(app).await;

    let err = WeatherClient::new(base, "key")
        .current("London")
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::Http(429));
    assert_eq!(err.status_code, Some(429));
}

#[tokio::test]
async fn prediction_extracts_and_trims_the_first_candidate() {
    let app = Router::new().route(
        "/models/:model",
        post(|| async {
            Json(json!({
                "candidates": [{
                    "content": {"parts": [{"text": "  Price trend: UP 8.5%\n"}]}
                }]
            }))
        }),
    );
    let base = spawn(app).await;

    let result = PredictionClient::new(base, "key")
        .predict(&Domain::Financial, &sample_inputs())
        .await
        .unwrap();
    assert_eq!(result.prediction, "Price trend: UP 8.5%");
    assert_eq!(result.model, "gemini-2.0-flash");
    assert_eq!(result.domain, Domain::Financial);
    // Widely spread inputs bottom out at the confidence floor.
    assert_eq!(result.confidence, 0.6);
}

#[tokio::test]
async fn prediction_auth_failures_cover_the_vendor_400_row_too() {
    for status in [
        StatusCode::BAD_REQUEST,
        StatusCode::UNAUTHORIZED,
        StatusCode::FORBIDDEN,
    ] {
        let app = Router::new().route(
            "/models/:model",
            post(move || async move { (status, Json(json!({"error": {"message": "denied"}}))) }),
        );
        let base = spawn(app).await;

        let err = PredictionClient::new(base, "key")
            .predict(&Domain::Financial, &sample_inputs())
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Http(status.as_u16()));
        assert!(err.message.contains("key invalid or expired"));
    }
}

#[tokio::test]
async fn rate_limited_prediction_vendor_hits_the_429_row() {
    let app = Router::new().route(
        "/models/:model",
        post(|| async { (StatusCode::TOO_MANY_REQUESTS, Json(json!({}))) }),
    );
    let base = spawn(app).await;

    let err = PredictionClient::new(base, "key")
        .predict(&Domain::Gaming, &sample_inputs())
        .await
        .unwrap_err();
    assert_eq!(err.service, Service::Prediction);
    assert_eq!(err.code, ErrorCode::Http(429));
    assert_eq!(err.status_code, Some(429));
}

#[tokio::test]
async fn unreachable_prediction_vendor_is_a_connection_error() {
    let err = PredictionClient::new(unreachable_base(), "key")
        .predict(&Domain::Iot, &sample_inputs())
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::ConnectionError);
    assert_eq!(err.status_code, Some(503));
}

#[tokio::test]
async fn rate_limited_coprocessor_rpc_probes_with_the_429_row() {
    let app = Router::new().route(
        "/",
        post(|| async { (StatusCode::TOO_MANY_REQUESTS, Json(json!({}))) }),
    );
    let base = spawn(app).await;

    let client = ConfidentialComputeClient::new(Arc::new(SimulationBackend), base, 31337);
    let status = client.probe().await;
    assert!(!status.success);
    assert_eq!(status.service, Service::ConfidentialComputeRpc);
    assert_eq!(status.code, Some(ErrorCode::Http(429)));
}
