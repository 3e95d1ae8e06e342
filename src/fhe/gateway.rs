//! Coprocessor-delegating backend.
//!
//! Every primitive becomes one JSON-RPC call against the configured FHE
//! coprocessor endpoint. This is the "real SDK" side of the capability
//! interface; transport failures surface as the SDK-level error codes.

use crate::error::{ErrorCode, Service, ServiceError};
use crate::fhe::{EncryptedValue, FheBackend, Handle};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

const RPC_BUDGET: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
struct RpcRequest {
    jsonrpc: &'static str,
    method: String,
    params: Value,
    id: u64,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

/// Minimal JSON-RPC client for the coprocessor endpoint. Also used for the
/// chain-id connectivity probe in simulation mode.
pub struct RpcClient {
    url: String,
    http: reqwest::Client,
    request_id: AtomicU64,
}

impl RpcClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            http: reqwest::Client::new(),
            request_id: AtomicU64::new(1),
        }
    }

    pub async fn call(&self, method: &str, params: Value) -> Result<Value, ServiceError> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            method: method.to_string(),
            params,
            id: self.request_id.fetch_add(1, Ordering::SeqCst),
        };

        let response = self
            .http
            .post(&self.url)
            .json(&request)
            .timeout(RPC_BUDGET)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ServiceError::new(
                Service::ConfidentialComputeRpc,
                ErrorCode::Http(status.as_u16()),
                format!("coprocessor RPC returned HTTP {status}"),
            )
            .with_status(status.as_u16()));
        }

        let body: RpcResponse = response.json().await.map_err(transport_error)?;
        if let Some(err) = body.error {
            return Err(ServiceError::new(
                Service::ConfidentialComputeRpc,
                ErrorCode::Server,
                format!("RPC error {}: {}", err.code, err.message),
            ));
        }
        Ok(body.result)
    }

    /// `eth_chainId`, decoded from its hex form.
    pub async fn chain_id(&self) -> Result<u64, ServiceError> {
        let result = self.call("eth_chainId", json!([])).await?;
        let raw = result.as_str().ok_or_else(|| {
            ServiceError::new(
                Service::ConfidentialComputeRpc,
                ErrorCode::InvalidResponse,
                "eth_chainId returned a non-string result",
            )
        })?;
        u64::from_str_radix(raw.trim_start_matches("0x"), 16).map_err(|_| {
            ServiceError::new(
                Service::ConfidentialComputeRpc,
                ErrorCode::InvalidResponse,
                format!("eth_chainId returned unparseable chain id '{raw}'"),
            )
        })
    }
}

fn transport_error(err: reqwest::Error) -> ServiceError {
    if err.is_timeout() {
        ServiceError::timeout(Service::ConfidentialComputeRpc, "coprocessor RPC")
    } else {
        ServiceError::unreachable(Service::ConfidentialComputeRpc, "coprocessor RPC")
    }
}

pub struct GatewayBackend {
    rpc: RpcClient,
}

impl GatewayBackend {
    pub fn new(rpc_url: impl Into<String>) -> Self {
        Self {
            rpc: RpcClient::new(rpc_url),
        }
    }
}

/// Re-tag a transport/RPC failure with the code of the operation that hit it.
fn recode(err: ServiceError, code: ErrorCode, op: &str) -> ServiceError {
    ServiceError::new(
        Service::ConfidentialCompute,
        code,
        format!("{op} failed: {}", err.message),
    )
}

#[async_trait]
impl FheBackend for GatewayBackend {
    fn name(&self) -> &'static str {
        "gateway"
    }

    async fn public_key(&self) -> Result<String, ServiceError> {
        let result = self
            .rpc
            .call("fhe_getPublicKey", json!([]))
            .await
            .map_err(|e| recode(e, ErrorCode::SdkInit, "FHE public key fetch"))?;
        result
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| {
                ServiceError::new(
                    Service::ConfidentialCompute,
                    ErrorCode::SdkInit,
                    "coprocessor returned a non-string public key",
                )
            })
    }

    async fn encrypt(&self, value: i64) -> Result<EncryptedValue, ServiceError> {
        let result = self
            .rpc
            .call("fhe_encrypt", json!([value]))
            .await
            .map_err(|e| recode(e, ErrorCode::Encryption, "FHE encryption"))?;
        serde_json::from_value(result).map_err(|e| {
            ServiceError::new(
                Service::ConfidentialCompute,
                ErrorCode::Encryption,
                format!("FHE encryption failed: bad ciphertext shape: {e}"),
            )
        })
    }

    async fn decrypt(&self, handle: &Handle) -> Result<i64, ServiceError> {
        let result = self
            .rpc
            .call("fhe_publicDecrypt", json!([handle]))
            .await
            .map_err(|e| recode(e, ErrorCode::Decryption, "FHE decryption"))?;
        result.as_i64().ok_or_else(|| {
            ServiceError::new(
                Service::ConfidentialCompute,
                ErrorCode::Decryption,
                "coprocessor returned a non-integer plaintext",
            )
        })
    }

    async fn add(&self, a: &Handle, b: &Handle) -> Result<Handle, ServiceError> {
        let result = self
            .rpc
            .call("fhe_add", json!([a, b]))
            .await
            .map_err(|e| recode(e, ErrorCode::Computation, "FHE addition"))?;
        handle_from(result, "fhe_add")
    }

    async fn mul(&self, a: &Handle, b: &Handle) -> Result<Handle, ServiceError> {
        let result = self
            .rpc
            .call("fhe_mul", json!([a, b]))
            .await
            .map_err(|e| recode(e, ErrorCode::Computation, "FHE multiplication"))?;
        handle_from(result, "fhe_mul")
    }
}

fn handle_from(result: Value, method: &str) -> Result<Handle, ServiceError> {
    result
        .as_str()
        .map(|s| Handle(s.to_string()))
        .ok_or_else(|| {
            ServiceError::new(
                Service::ConfidentialCompute,
                ErrorCode::Computation,
                format!("{method} returned a non-string handle"),
            )
        })
}
