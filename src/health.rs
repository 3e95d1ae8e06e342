//! Fan-out connectivity checks across the four service wrappers.

use crate::clients::market::MarketDataClient;
use crate::clients::prediction::PredictionClient;
use crate::clients::weather::WeatherClient;
use crate::clients::ProbeStatus;
use crate::error::Service;
use crate::fhe::ConfidentialComputeClient;
use crate::types::rfc3339_now;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Services allowed to fail without flipping overall health: the rate-limit
/// prone market feed and the coprocessor RPC (absent in demo setups).
const NON_CRITICAL: [Service; 2] = [Service::MarketData, Service::ConfidentialComputeRpc];

pub fn is_critical(service: Service) -> bool {
    !NON_CRITICAL.contains(&service)
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub success: bool,
    pub services: BTreeMap<String, ProbeStatus>,
    pub timestamp: String,
}

impl HealthReport {
    /// Fold probe outcomes into one report. Built fresh per check, never
    /// cached or persisted.
    pub fn from_probes(probes: impl IntoIterator<Item = ProbeStatus>) -> Self {
        let services: BTreeMap<String, ProbeStatus> = probes
            .into_iter()
            .map(|probe| (probe.service.name().to_string(), probe))
            .collect();
        let success = !services
            .values()
            .any(|probe| !probe.success && is_critical(probe.service));
        Self {
            success,
            services,
            timestamp: rfc3339_now(),
        }
    }

    pub fn first_critical_failure(&self) -> Option<&ProbeStatus> {
        self.services
            .values()
            .find(|probe| !probe.success && is_critical(probe.service))
    }
}

/// Probes all four clients concurrently and composes the result. No ordering
/// between probes is guaranteed or needed; the report waits for all of them.
pub struct HealthAggregator {
    market: Arc<MarketDataClient>,
    weather: Arc<WeatherClient>,
    prediction: Arc<PredictionClient>,
    confidential: Arc<ConfidentialComputeClient>,
}

impl HealthAggregator {
    pub fn new(
        market: Arc<MarketDataClient>,
        weather: Arc<WeatherClient>,
        prediction: Arc<PredictionClient>,
        confidential: Arc<ConfidentialComputeClient>,
    ) -> Self {
        Self {
            market,
            weather,
            prediction,
            confidential,
        }
    }

    pub async fn check_all(&self) -> HealthReport {
        let (market, weather, prediction, confidential) = tokio::join!(
            self.market.probe(),
            self.weather.probe(),
            self.prediction.probe(),
            self.confidential.probe(),
        );
        HealthReport::from_probes([market, weather, prediction, confidential])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use pretty_assertions::assert_eq;

    fn all_up() -> Vec<ProbeStatus> {
        vec![
            ProbeStatus::connected(Service::MarketData),
            ProbeStatus::connected(Service::Weather),
            ProbeStatus::connected(Service::Prediction),
            ProbeStatus::connected(Service::ConfidentialComputeRpc),
        ]
    }

    #[test]
    fn rate_limited_market_feed_does_not_fail_overall_health() {
        let mut probes = all_up();
        probes[0] = ProbeStatus::down(
            Service::MarketData,
            ErrorCode::Http(429),
            "rate limit reached",
        );
        let report = HealthReport::from_probes(probes);
        assert!(report.success);
        assert!(!report.services["market-data"].success);
        assert!(report.first_critical_failure().is_none());
    }

    #[test]
    fn failing_weather_feed_is_critical() {
        let mut probes = all_up();
        probes[1] = ProbeStatus::down(
            Service::Weather,
            ErrorCode::ConnectionError,
            "connection failed",
        );
        let report = HealthReport::from_probes(probes);
        assert!(!report.success);
        let critical = report.first_critical_failure().unwrap();
        assert_eq!(critical.service, Service::Weather);
    }

    #[test]
    fn missing_coprocessor_rpc_is_tolerated() {
        let mut probes = all_up();
        probes[3] = ProbeStatus::down(
            Service::ConfidentialComputeRpc,
            ErrorCode::ConnectionError,
            "coprocessor RPC connection failed",
        );
        assert!(HealthReport::from_probes(probes).success);
    }
}
