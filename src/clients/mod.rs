use crate::error::{ErrorCode, Service, ServiceError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub mod market;
pub mod prediction;
pub mod weather;

/// Outcome of a lightweight connectivity probe. Probes report, they never
/// fail the caller; the aggregator folds these into the health map.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProbeStatus {
    pub success: bool,
    pub service: Service,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
}

impl ProbeStatus {
    pub fn connected(service: Service) -> Self {
        Self::up(service, "connected")
    }

    pub fn up(service: Service, status: impl Into<String>) -> Self {
        Self {
            success: true,
            service,
            status: Some(status.into()),
            error: None,
            code: None,
        }
    }

    pub fn down(service: Service, code: ErrorCode, error: impl Into<String>) -> Self {
        Self {
            success: false,
            service,
            status: None,
            error: Some(error.into()),
            code: Some(code),
        }
    }
}

impl From<&ServiceError> for ProbeStatus {
    fn from(err: &ServiceError) -> Self {
        ProbeStatus::down(err.service, err.code, err.message.clone())
    }
}

/// Shared vendor-call plumbing: one `reqwest` client, a fixed per-call
/// budget, and the common error-mapping table every wrapper goes through.
#[derive(Clone)]
pub struct VendorHttp {
    service: Service,
    vendor: &'static str,
    budget: Duration,
    http: reqwest::Client,
}

impl VendorHttp {
    pub fn new(service: Service, vendor: &'static str, budget: Duration) -> Self {
        Self {
            service,
            vendor,
            budget,
            http: reqwest::Client::new(),
        }
    }

    pub async fn get_json(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<serde_json::Value, ServiceError> {
        let response = self
            .http
            .get(url)
            .query(query)
            .timeout(self.budget)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        self.read_json(response).await
    }

    pub async fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, ServiceError> {
        let response = self
            .http
            .post(url)
            .json(body)
            .timeout(self.budget)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        self.read_json(response).await
    }

    /// The shared mapping table: 429 gets its own row, other non-2xx carry
    /// the status as the code, and a 2xx body that fails to decode is an
    /// INVALID_RESPONSE.
    async fn read_json(
        &self,
        response: reqwest::Response,
    ) -> Result<serde_json::Value, ServiceError> {
        let status = response.status();
        if status.as_u16() == 429 {
            return Err(ServiceError::new(
                self.service,
                ErrorCode::Http(429),
                format!("{} rate limit reached - retry later", self.vendor),
            )
            .with_status(429));
        }
        if !status.is_success() {
            let body: serde_json::Value = response.json().await.unwrap_or_default();
            let message = vendor_message(&body)
                .unwrap_or_else(|| format!("{} error", self.vendor));
            return Err(ServiceError::new(
                self.service,
                ErrorCode::Http(status.as_u16()),
                message,
            )
            .with_status(status.as_u16()));
        }
        response.json().await.map_err(|e| self.transport_error(e))
    }

    fn transport_error(&self, err: reqwest::Error) -> ServiceError {
        if err.is_timeout() {
            ServiceError::timeout(self.service, self.vendor)
        } else if err.is_decode() {
            ServiceError::new(
                self.service,
                ErrorCode::InvalidResponse,
                format!("unexpected response from {}", self.vendor),
            )
            .with_status(502)
        } else {
            ServiceError::unreachable(self.service, self.vendor)
        }
    }
}

/// Best-effort extraction of a vendor-supplied message out of an error body.
fn vendor_message(body: &serde_json::Value) -> Option<String> {
    body.pointer("/error/message")
        .or_else(|| body.get("error"))
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}
