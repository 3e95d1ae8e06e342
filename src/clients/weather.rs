use crate::clients::{ProbeStatus, VendorHttp};
use crate::error::{ErrorCode, Service, ServiceError};
use crate::types::{rfc3339_now, ForecastHour, WeatherForecast, WeatherReport};
use std::time::Duration;

const CALL_BUDGET: Duration = Duration::from_secs(15);
const VENDOR: &str = "WeatherAPI";

/// Weather-feed wrapper (WeatherAPI-compatible surface).
pub struct WeatherClient {
    base: String,
    api_key: String,
    http: VendorHttp,
}

impl WeatherClient {
    pub fn new(base: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base: base.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            http: VendorHttp::new(Service::Weather, VENDOR, CALL_BUDGET),
        }
    }

    pub async fn current(&self, city: &str) -> Result<WeatherReport, ServiceError> {
        let url = format!("{}/current.json", self.base);
        let body = self
            .http
            .get_json(&url, &[("key", &self.api_key), ("q", city), ("aqi", "no")])
            .await
            .map_err(|e| remap_vendor_rows(e, city))?;

        Ok(WeatherReport {
            city: str_at(&body, "/location/name")?,
            country: str_at(&body, "/location/country")?,
            temperature: f64_at(&body, "/current/temp_c")?,
            humidity: f64_at(&body, "/current/humidity")?,
            pressure: f64_at(&body, "/current/pressure_mb")?,
            description: str_at(&body, "/current/condition/text")?,
            // vendor reports km/h
            wind_speed: f64_at(&body, "/current/wind_kph")? / 3.6,
            timestamp: rfc3339_now(),
        })
    }

    /// Next eight hourly entries of today's forecast.
    pub async fn forecast(&self, city: &str) -> Result<WeatherForecast, ServiceError> {
        let url = format!("{}/forecast.json", self.base);
        let body = self
            .http
            .get_json(
                &url,
                &[
                    ("key", &self.api_key),
                    ("q", city),
                    ("days", "1"),
                    ("aqi", "no"),
                    ("alerts", "no"),
                ],
            )
            .await
            .map_err(|e| remap_vendor_rows(e, city))?;

        let hours = body
            .pointer("/forecast/forecastday/0/hour")
            .and_then(|v| v.as_array())
            .ok_or_else(|| invalid_response("forecast response missing hourly data"))?;

        let forecast = hours
            .iter()
            .take(8)
            .map(|hour| {
                Ok(ForecastHour {
                    datetime: str_at(hour, "/time")?,
                    temperature: f64_at(hour, "/temp_c")?,
                    humidity: f64_at(hour, "/humidity")?,
                    pressure: f64_at(hour, "/pressure_mb")?,
                    description: str_at(hour, "/condition/text")?,
                })
            })
            .collect::<Result<Vec<_>, ServiceError>>()?;

        Ok(WeatherForecast {
            city: str_at(&body, "/location/name")?,
            country: str_at(&body, "/location/country")?,
            forecast,
            timestamp: rfc3339_now(),
        })
    }

    /// Probe with a known city and check the response carries a location.
    pub async fn probe(&self) -> ProbeStatus {
        let url = format!("{}/current.json", self.base);
        match self
            .http
            .get_json(&url, &[("key", &self.api_key), ("q", "London"), ("aqi", "no")])
            .await
        {
            Ok(body) if body.pointer("/location/name").is_some() => {
                ProbeStatus::connected(Service::Weather)
            }
            Ok(_) => ProbeStatus::down(
                Service::Weather,
                ErrorCode::InvalidResponse,
                format!("unexpected response from {VENDOR}"),
            ),
            Err(err) => match err.code {
                ErrorCode::Http(status @ (401 | 403)) => ProbeStatus::down(
                    Service::Weather,
                    ErrorCode::Http(status),
                    "invalid API key",
                ),
                _ => (&err).into(),
            },
        }
    }
}

/// Vendor-specific rows on top of the shared table: auth failures and the
/// 400 the vendor uses for unknown cities.
fn remap_vendor_rows(mut err: ServiceError, city: &str) -> ServiceError {
    match err.code {
        ErrorCode::Http(401) | ErrorCode::Http(403) => {
            err.message = format!("{VENDOR} key invalid or expired");
        }
        ErrorCode::Http(400) => {
            err.message = format!("city '{city}' not found");
        }
        _ => {}
    }
    err
}

fn invalid_response(message: &str) -> ServiceError {
    ServiceError::new(
        Service::Weather,
        ErrorCode::InvalidResponse,
        format!("{VENDOR}: {message}"),
    )
    .with_status(502)
}

fn str_at(body: &serde_json::Value, pointer: &str) -> Result<String, ServiceError> {
    body.pointer(pointer)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| invalid_response(&format!("missing field {pointer}")))
}

fn f64_at(body: &serde_json::Value, pointer: &str) -> Result<f64, ServiceError> {
    body.pointer(pointer)
        .and_then(|v| v.as_f64())
        .ok_or_else(|| invalid_response(&format!("missing field {pointer}")))
}
