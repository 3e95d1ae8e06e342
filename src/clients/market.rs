use crate::clients::{ProbeStatus, VendorHttp};
use crate::error::{ErrorCode, Service, ServiceError};
use crate::types::{rfc3339_now, MarketQuote, TrendingCoin, TrendingCoins};
use std::time::Duration;

const CALL_BUDGET: Duration = Duration::from_secs(15);
const VENDOR: &str = "CoinGecko API";

/// Price-feed wrapper (CoinGecko-compatible surface).
pub struct MarketDataClient {
    base: String,
    http: VendorHttp,
}

impl MarketDataClient {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into().trim_end_matches('/').to_string(),
            http: VendorHttp::new(Service::MarketData, VENDOR, CALL_BUDGET),
        }
    }

    /// Spot price for one coin id. A response that does not contain the
    /// requested id is a SYMBOL_NOT_FOUND, not a transport failure.
    pub async fn quote(&self, symbol: &str) -> Result<MarketQuote, ServiceError> {
        let url = format!("{}/simple/price", self.base);
        let body = self
            .http
            .get_json(
                &url,
                &[
                    ("ids", symbol),
                    ("vs_currencies", "usd"),
                    ("include_24hr_change", "true"),
                    ("include_market_cap", "true"),
                    ("include_24hr_vol", "true"),
                ],
            )
            .await?;

        let data = body.get(symbol).filter(|v| !v.is_null()).ok_or_else(|| {
            ServiceError::new(
                Service::MarketData,
                ErrorCode::SymbolNotFound,
                format!("cryptocurrency '{symbol}' not found"),
            )
            .with_status(404)
        })?;

        let price = data.get("usd").and_then(|v| v.as_f64()).ok_or_else(|| {
            ServiceError::new(
                Service::MarketData,
                ErrorCode::InvalidResponse,
                format!("{VENDOR} returned no usd price for '{symbol}'"),
            )
            .with_status(502)
        })?;

        Ok(MarketQuote {
            symbol: symbol.to_string(),
            price,
            change_24h: data.get("usd_24h_change").and_then(|v| v.as_f64()),
            market_cap: data.get("usd_market_cap").and_then(|v| v.as_f64()),
            volume_24h: data.get("usd_24h_vol").and_then(|v| v.as_f64()),
            timestamp: rfc3339_now(),
        })
    }

    pub async fn trending(&self) -> Result<TrendingCoins, ServiceError> {
        let url = format!("{}/search/trending", self.base);
        let body = self.http.get_json(&url, &[]).await?;

        let coins = body
            .get("coins")
            .and_then(|v| v.as_array())
            .ok_or_else(|| {
                ServiceError::new(
                    Service::MarketData,
                    ErrorCode::InvalidResponse,
                    format!("{VENDOR} trending response missing coins"),
                )
                .with_status(502)
            })?;

        let trending = coins
            .iter()
            .filter_map(|coin| {
                let item = coin.get("item")?;
                Some(TrendingCoin {
                    id: item.get("id")?.as_str()?.to_string(),
                    name: item.get("name")?.as_str()?.to_string(),
                    symbol: item.get("symbol")?.as_str()?.to_string(),
                    rank: item
                        .get("market_cap_rank")
                        .and_then(|v| v.as_u64())
                        .map(|r| r as u32),
                })
            })
            .collect();

        Ok(TrendingCoins {
            trending,
            timestamp: rfc3339_now(),
        })
    }

    /// Connectivity probe against the vendor's ping endpoint.
    pub async fn probe(&self) -> ProbeStatus {
        let url = format!("{}/ping", self.base);
        match self.http.get_json(&url, &[]).await {
            Ok(body)
                if body.get("gecko_says").and_then(|v| v.as_str())
                    == Some("(V3) To the Moon!") =>
            {
                ProbeStatus::connected(Service::MarketData)
            }
            Ok(_) => ProbeStatus::down(
                Service::MarketData,
                ErrorCode::InvalidResponse,
                format!("unexpected response from {VENDOR}"),
            ),
            Err(err) => (&err).into(),
        }
    }
}
