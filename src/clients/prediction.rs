use crate::clients::{ProbeStatus, VendorHttp};
use crate::error::{ErrorCode, Service, ServiceError};
use crate::types::{Domain, PredictionInputs, PredictionResult};
use serde_json::json;
use std::time::Duration;

const CALL_BUDGET: Duration = Duration::from_secs(30);
const VENDOR: &str = "Gemini API";
const MODEL: &str = "gemini-2.0-flash";

/// The variance of the three inputs is normalized against this scale before
/// it discounts confidence.
const VARIANCE_SCALE: f64 = 10_000.0;
/// Confidence never drops below this floor.
const CONFIDENCE_FLOOR: f64 = 0.6;

const SYSTEM_PREAMBLE: &str = "You are an AI prediction expert. Provide concise, specific \
predictions based on the input data. Return only the prediction text without explanations.";

/// Text-generation wrapper. One request per prediction, no retries.
pub struct PredictionClient {
    base: String,
    api_key: String,
    http: VendorHttp,
}

impl PredictionClient {
    pub fn new(base: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base: base.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            http: VendorHttp::new(Service::Prediction, VENDOR, CALL_BUDGET),
        }
    }

    pub async fn predict(
        &self,
        domain: &Domain,
        inputs: &PredictionInputs,
    ) -> Result<PredictionResult, ServiceError> {
        let prompt = build_prompt(domain, inputs);
        let body = json!({
            "contents": [{
                "parts": [{ "text": format!("{SYSTEM_PREAMBLE}\n\n{prompt}") }]
            }],
            "generationConfig": {
                "maxOutputTokens": 150,
                "temperature": 0.7
            }
        });

        let response = self
            .http
            .post_json(&self.generate_url(), &body)
            .await
            .map_err(remap_auth_rows)?;

        let text = response
            .pointer("/candidates/0/content/parts/0/text")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                ServiceError::new(
                    Service::Prediction,
                    ErrorCode::InvalidResponse,
                    format!("{VENDOR} returned no candidates"),
                )
                .with_status(502)
            })?;

        Ok(PredictionResult {
            prediction: text.trim().to_string(),
            model: MODEL.to_string(),
            confidence: confidence(&inputs.numeric()),
            domain: domain.clone(),
        })
    }

    /// One-token request to verify the key and reachability.
    pub async fn probe(&self) -> ProbeStatus {
        let body = json!({
            "contents": [{ "parts": [{ "text": "Hi" }] }],
            "generationConfig": { "maxOutputTokens": 1 }
        });
        match self.http.post_json(&self.generate_url(), &body).await {
            Ok(_) => ProbeStatus::connected(Service::Prediction),
            Err(err) => match err.code {
                ErrorCode::Http(status @ (400 | 401 | 403)) => {
                    ProbeStatus::down(Service::Prediction, ErrorCode::Http(status), "invalid API key")
                }
                ErrorCode::Http(429) => ProbeStatus::down(
                    Service::Prediction,
                    ErrorCode::Http(429),
                    "rate limit reached",
                ),
                _ => (&err).into(),
            },
        }
    }

    fn generate_url(&self) -> String {
        // The vendor authenticates via a key query parameter.
        format!(
            "{}/models/{MODEL}:generateContent?key={}",
            self.base, self.api_key
        )
    }
}

/// This vendor signals bad keys with 400 as well as 401/403.
fn remap_auth_rows(mut err: ServiceError) -> ServiceError {
    if let ErrorCode::Http(400 | 401 | 403) = err.code {
        err.message = format!("{VENDOR} key invalid or expired");
    }
    err
}

fn build_prompt(domain: &Domain, inputs: &PredictionInputs) -> String {
    let (a, b, c) = (&inputs.input1.0, &inputs.input2.0, &inputs.input3.0);
    match domain {
        Domain::Financial => format!(
            "Predict cryptocurrency price trend based on:\n\
             Market Cap: ${a}M\n\
             Volume (24h): ${b}M\n\
             Price Change: {c}%\n\
             Provide a specific prediction like \"Price trend: UP 8.5%\" or \"Price trend: DOWN 3.2%\""
        ),
        Domain::Gaming => format!(
            "Predict gaming match outcome based on:\n\
             Player Score: {a}\n\
             Match Duration: {b} minutes\n\
             Team Rating: {c}\n\
             Provide a specific prediction like \"Win probability: 73.5%\" or \"Performance: Above Average\""
        ),
        Domain::Iot => format!(
            "Predict weather/environmental conditions based on:\n\
             Temperature: {a}\u{b0}C\n\
             Humidity: {b}%\n\
             Pressure: {c} hPa\n\
             Provide a specific prediction like \"Forecast: Sunny, 24\u{b0}C\" or \"Conditions: Rainy, 18\u{b0}C\""
        ),
        Domain::Other(name) => format!(
            "Analyze the following data and provide a prediction:\n\
             Input 1: {a}\n\
             Input 2: {b}\n\
             Input 3: {c}\n\
             Domain: {name}"
        ),
    }
}

/// Confidence heuristic: tightly clustered inputs read as high confidence.
/// `max(0.6, 1 - min(variance / 10000, 1))` over the population variance of
/// the three numeric inputs.
pub fn confidence(values: &[f64; 3]) -> f64 {
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    let normalized = (variance / VARIANCE_SCALE).min(1.0);
    (1.0 - normalized).max(CONFIDENCE_FLOOR)
}
