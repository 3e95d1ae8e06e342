//! End-to-end exercises of the HTTP surface over a real listener: the FHE
//! endpoints against the simulation backend, plus the envelope contract for
//! vendor and validation failures.

mod common;

use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use common::{spawn, unreachable_base};
use confidential_predictor::api::{router, AppState};
use confidential_predictor::clients::market::MarketDataClient;
use confidential_predictor::clients::prediction::PredictionClient;
use confidential_predictor::clients::weather::WeatherClient;
use confidential_predictor::fhe::simulation::{SimulationBackend, SIMULATION_PUBLIC_KEY};
use confidential_predictor::fhe::ConfidentialComputeClient;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::Arc;

struct VendorBases {
    market: String,
    weather: String,
    prediction: String,
    rpc: String,
}

impl Default for VendorBases {
    fn default() -> Self {
        Self {
            market: unreachable_base(),
            weather: unreachable_base(),
            prediction: unreachable_base(),
            rpc: unreachable_base(),
        }
    }
}

async fn serve_gateway(bases: VendorBases) -> String {
    let state = Arc::new(AppState::new(
        Arc::new(MarketDataClient::new(bases.market)),
        Arc::new(WeatherClient::new(bases.weather, "key")),
        Arc::new(PredictionClient::new(bases.prediction, "key")),
        Arc::new(ConfidentialComputeClient::new(
            Arc::new(SimulationBackend),
            bases.rpc,
            31337,
        )),
    ));
    spawn(router(state)).await
}

#[tokio::test]
async fn public_decrypt_returns_an_integer_end_to_end() {
    let base = serve_gateway(VendorBases::default()).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{base}/api/public-decrypt"))
        .json(&json!({"ciphertext": "0x1234567890abcdef"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], json!(true));
    // 0x12345678 % 1000, fully determined by the simulation rules.
    assert_eq!(body["decryptedValue"], json!(896));
}

#[tokio::test]
async fn missing_ciphertext_is_a_validation_envelope() {
    let base = serve_gateway(VendorBases::default()).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{base}/api/public-decrypt"))
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["service"], json!("validation"));
    assert_eq!(body["code"], json!("VALIDATION_ERROR"));
}

#[tokio::test]
async fn encrypt_data_is_deterministic_and_opaque() {
    let base = serve_gateway(VendorBases::default()).await;
    let client = reqwest::Client::new();

    let mut rounds = Vec::new();
    for _ in 0..2 {
        let response = client
            .post(format!("{base}/api/encrypt-data"))
            .json(&json!({"data": [100, 200, 300]}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["success"], json!(true));
        rounds.push(body["encrypted"]["encrypted"].clone());
    }
    assert_eq!(rounds[0], rounds[1]);

    let first = &rounds[0][0];
    let data = first["data"].as_str().unwrap();
    let handles = first["handles"].as_str().unwrap();
    assert!(data.starts_with("0x") && data.len() == 66);
    assert!(handles.starts_with("0x") && handles.len() == 34);
}

#[tokio::test]
async fn encrypt_data_rejects_non_numeric_payloads() {
    let base = serve_gateway(VendorBases::default()).await;
    let client = reqwest::Client::new();

    for bad in [json!({"data": "not-an-array"}), json!({"data": [1, "two"]})] {
        let response = client
            .post(format!("{base}/api/encrypt-data"))
            .json(&bad)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["code"], json!("VALIDATION_ERROR"));
    }
}

#[tokio::test]
async fn fhe_public_key_serves_the_simulation_constant() {
    let base = serve_gateway(VendorBases::default()).await;
    let body: Value = reqwest::get(format!("{base}/api/fhe-public-key"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["publicKey"], json!(SIMULATION_PUBLIC_KEY));
}

#[tokio::test]
async fn compute_encrypted_prediction_round_trips_unknown_domains() {
    let base = serve_gateway(VendorBases::default()).await;
    let client = reqwest::Client::new();

    let encrypted: Value = client
        .post(format!("{base}/api/encrypt-data"))
        .json(&json!({"data": [10, 20, 30]}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let inputs = encrypted["encrypted"]["encrypted"].clone();

    let mut handles = Vec::new();
    for _ in 0..2 {
        let body: Value = client
            .post(format!("{base}/api/compute-encrypted-prediction"))
            .json(&json!({"encryptedInputs": inputs, "domain": "sports"}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["prediction"]["domain"], json!("sports"));
        handles.push(body["prediction"]["prediction"].clone());
    }
    // Simulated multiply-accumulate is deterministic in its inputs.
    assert_eq!(handles[0], handles[1]);
    assert!(handles[0].as_str().unwrap().starts_with("0x"));
}

#[tokio::test]
async fn compute_encrypted_prediction_requires_inputs_and_domain() {
    let base = serve_gateway(VendorBases::default()).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{base}/api/compute-encrypted-prediction"))
        .json(&json!({"domain": "financial"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], json!("VALIDATION_ERROR"));
}

#[tokio::test]
async fn vendor_failures_surface_as_mirrored_envelopes() {
    let market = Router::new().route(
        "/simple/price",
        get(|| async { (StatusCode::TOO_MANY_REQUESTS, Json(json!({}))) }),
    );
    let base = serve_gateway(VendorBases {
        market: spawn(market).await,
        ..VendorBases::default()
    })
    .await;

    let response = reqwest::get(format!("{base}/api/fetch-market/bitcoin"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["service"], json!("market-data"));
    assert_eq!(body["code"], json!("429"));
    assert_eq!(body["statusCode"], json!(429));
}

#[tokio::test]
async fn fetch_prediction_validates_its_body() {
    let base = serve_gateway(VendorBases::default()).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{base}/api/fetch-prediction"))
        .json(&json!({"domain": "financial"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["service"], json!("validation"));
    assert_eq!(body["code"], json!("VALIDATION_ERROR"));
}

#[tokio::test]
async fn confidential_prediction_runs_the_full_pipeline() {
    let prediction = Router::new().route(
        "/models/:model",
        post(|| async {
            Json(json!({
                "candidates": [{"content": {"parts": [{"text": "Win probability: 73.5%"}]}}]
            }))
        }),
    );
    let base = serve_gateway(VendorBases {
        prediction: spawn(prediction).await,
        ..VendorBases::default()
    })
    .await;
    let client = reqwest::Client::new();

    let body: Value = client
        .post(format!("{base}/api/confidential-prediction"))
        .json(&json!({"inputs": [1200, 35, 88], "domain": "gaming"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["success"], json!(true));
    assert_eq!(
        body["data"]["aiPrediction"]["prediction"],
        json!("Win probability: 73.5%")
    );
    assert_eq!(body["data"]["encryptedPrediction"]["domain"], json!("gaming"));
    assert_eq!(body["data"]["encryptedPrediction"]["encrypted"], json!(true));
}

#[tokio::test]
async fn health_reports_503_with_the_critical_failure_envelope() {
    // Market feed down (non-critical) but weather down too (critical).
    let base = serve_gateway(VendorBases::default()).await;

    let response = reqwest::get(format!("{base}/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["code"], json!("CONNECTION_ERROR"));
}
