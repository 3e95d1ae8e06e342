use anyhow::{bail, Context};
use std::net::SocketAddr;

/// Which `FheBackend` implementation the process runs with. Picked once at
/// startup; never re-probed at call time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FheMode {
    /// Deterministic hash-based stand-in. Default, so the demo runs with no
    /// external coprocessor.
    Simulation,
    /// Delegate every primitive to the configured coprocessor RPC.
    Gateway,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub bind: SocketAddr,
    pub prediction_api_key: String,
    pub weather_api_key: String,
    pub fhe_rpc_url: String,
    pub fhe_chain_id: u64,
    pub fhe_mode: FheMode,
    pub market_api_base: String,
    pub weather_api_base: String,
    pub prediction_api_base: String,
}

impl Config {
    /// Read configuration from the environment. All missing required names
    /// are reported in one error so operators fix them in one pass.
    pub fn from_env() -> anyhow::Result<Self> {
        let mut missing = Vec::new();
        let prediction_api_key = require("PREDICTION_API_KEY", &mut missing);
        let weather_api_key = require("WEATHER_API_KEY", &mut missing);
        let fhe_rpc_url = require("FHE_RPC_URL", &mut missing);
        if !missing.is_empty() {
            bail!(
                "missing required environment variables: {}",
                missing.join(", ")
            );
        }

        let bind: SocketAddr = env_or("BIND", "0.0.0.0:3001")
            .parse()
            .context("invalid BIND")?;

        let fhe_chain_id: u64 = env_or("FHE_CHAIN_ID", "31337")
            .parse()
            .context("invalid FHE_CHAIN_ID")?;

        let fhe_mode = match env_or("FHE_MODE", "simulation").as_str() {
            "simulation" => FheMode::Simulation,
            "gateway" => FheMode::Gateway,
            other => bail!("invalid FHE_MODE: {other} (expected simulation|gateway)"),
        };

        Ok(Self {
            bind,
            prediction_api_key,
            weather_api_key,
            fhe_rpc_url,
            fhe_chain_id,
            fhe_mode,
            market_api_base: env_or("MARKET_API_BASE", "https://api.coingecko.com/api/v3"),
            weather_api_base: env_or("WEATHER_API_BASE", "http://api.weatherapi.com/v1"),
            prediction_api_base: env_or(
                "PREDICTION_API_BASE",
                "https://generativelanguage.googleapis.com/v1beta",
            ),
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn require(key: &str, missing: &mut Vec<String>) -> String {
    match std::env::var(key) {
        Ok(v) if !v.is_empty() => v,
        _ => {
            missing.push(key.to_string());
            String::new()
        }
    }
}
