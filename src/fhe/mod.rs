//! Confidential-compute layer.
//!
//! The actual encrypted arithmetic is a capability behind [`FheBackend`]:
//! either the deterministic [`simulation::SimulationBackend`] (default) or
//! the [`gateway::GatewayBackend`] that delegates to a coprocessor RPC.
//! Which one runs is decided once at startup from configuration, never by
//! probing for a vendor SDK at call time.

use crate::clients::ProbeStatus;
use crate::error::{ErrorCode, Service, ServiceError};
use crate::types::{rfc3339_now, Domain};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub mod gateway;
pub mod simulation;

/// Opaque ciphertext handle: `0x`-prefixed hex, meaningful only to the
/// backend that produced it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Handle(pub String);

/// Ciphertext as exposed to callers. Opaque; produced and consumed only
/// inside this module.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedValue {
    pub data: String,
    pub handles: Handle,
}

/// Result of a weighted encrypted computation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EncryptedPrediction {
    pub prediction: Handle,
    pub confidence: EncryptedValue,
    pub domain: Domain,
    pub timestamp: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct InitSummary {
    pub status: &'static str,
    pub chain_id: String,
    pub backend: &'static str,
}

/// The encrypt/decrypt/arithmetic primitives every backend provides.
#[async_trait]
pub trait FheBackend: Send + Sync {
    fn name(&self) -> &'static str;

    async fn public_key(&self) -> Result<String, ServiceError>;

    async fn encrypt(&self, value: i64) -> Result<EncryptedValue, ServiceError>;

    async fn decrypt(&self, handle: &Handle) -> Result<i64, ServiceError>;

    async fn add(&self, a: &Handle, b: &Handle) -> Result<Handle, ServiceError>;

    async fn mul(&self, a: &Handle, b: &Handle) -> Result<Handle, ServiceError>;
}

/// Per-domain weight vector for the encrypted multiply-accumulate.
pub fn domain_weights(domain: &Domain) -> [i64; 3] {
    match domain {
        Domain::Financial => [40, 35, 25],
        Domain::Gaming => [50, 30, 20],
        Domain::Iot => [30, 40, 30],
        Domain::Other(_) => [33, 33, 34],
    }
}

const CONFIDENCE_BASE: i64 = 85;

/// Confidence for an encrypted computation: base 85, minus 10 per missing
/// input below three.
fn compute_confidence(input_count: usize) -> i64 {
    let penalty = (3i64 - input_count as i64).max(0) * 10;
    CONFIDENCE_BASE - penalty
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum InitState {
    Uninitialized,
    Initializing,
    Ready { chain_id: u64 },
}

/// Client wrapper over one backend plus the coprocessor RPC endpoint.
///
/// Holds only immutable configuration and the init-state cell; safe to share
/// behind an `Arc` across request handlers.
pub struct ConfidentialComputeClient {
    backend: Arc<dyn FheBackend>,
    rpc: gateway::RpcClient,
    default_chain_id: u64,
    state: tokio::sync::Mutex<InitState>,
}

impl ConfidentialComputeClient {
    pub fn new(
        backend: Arc<dyn FheBackend>,
        rpc_url: impl Into<String>,
        default_chain_id: u64,
    ) -> Self {
        Self {
            backend,
            rpc: gateway::RpcClient::new(rpc_url),
            default_chain_id,
            state: tokio::sync::Mutex::new(InitState::Uninitialized),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Uninitialized -> Initializing -> Ready. Probes the RPC endpoint for
    /// its chain id (falling back to the configured one when unreachable,
    /// which is expected in demo setups), then runs an encrypt/decrypt
    /// self-test through the backend. Idempotent once Ready.
    pub async fn initialize(&self) -> Result<InitSummary, ServiceError> {
        let mut state = self.state.lock().await;
        if let InitState::Ready { chain_id } = *state {
            return Ok(self.summary(chain_id));
        }
        *state = InitState::Initializing;

        let chain_id = match self.rpc.chain_id().await {
            Ok(id) => id,
            Err(err) => {
                tracing::warn!(error = %err, "coprocessor RPC unreachable, using configured chain id");
                self.default_chain_id
            }
        };

        // Self-test: one round trip through the backend.
        let roundtrip = async {
            let sample = self.backend.encrypt(42).await?;
            self.backend.decrypt(&sample.handles).await
        };
        if let Err(err) = roundtrip.await {
            *state = InitState::Uninitialized;
            return Err(ServiceError::new(
                Service::ConfidentialCompute,
                ErrorCode::SdkInit,
                format!("FHE backend initialization failed: {}", err.message),
            ));
        }

        *state = InitState::Ready { chain_id };
        tracing::info!(backend = self.backend.name(), chain_id, "confidential compute ready");
        Ok(self.summary(chain_id))
    }

    fn summary(&self, chain_id: u64) -> InitSummary {
        InitSummary {
            status: "initialized",
            chain_id: chain_id.to_string(),
            backend: self.backend.name(),
        }
    }

    async fn ensure_ready(&self) -> Result<(), ServiceError> {
        {
            let state = self.state.lock().await;
            if matches!(*state, InitState::Ready { .. }) {
                return Ok(());
            }
        }
        self.initialize().await.map(|_| ())
    }

    pub async fn public_key(&self) -> Result<String, ServiceError> {
        self.ensure_ready().await?;
        self.backend.public_key().await
    }

    /// Encrypt a batch of numbers. Values are floored to integers first, the
    /// granularity the encrypted arithmetic works at.
    pub async fn encrypt_batch(
        &self,
        data: &[f64],
    ) -> Result<Vec<EncryptedValue>, ServiceError> {
        self.ensure_ready().await?;
        let mut out = Vec::with_capacity(data.len());
        for value in data {
            out.push(self.backend.encrypt(value.floor() as i64).await?);
        }
        Ok(out)
    }

    /// Decrypt a caller-supplied ciphertext handle.
    pub async fn public_decrypt(&self, ciphertext: &str) -> Result<i64, ServiceError> {
        self.ensure_ready().await?;
        self.backend.decrypt(&Handle(ciphertext.to_string())).await
    }

    /// Weighted multiply-accumulate over encrypted inputs, entirely through
    /// backend primitives.
    pub async fn compute_prediction(
        &self,
        encrypted_inputs: &[EncryptedValue],
        domain: &Domain,
    ) -> Result<EncryptedPrediction, ServiceError> {
        self.ensure_ready().await?;

        let weights = domain_weights(domain);
        let result = async {
            let mut acc = self.backend.encrypt(0).await?.handles;
            for (input, weight) in encrypted_inputs.iter().zip(weights) {
                let weight_ct = self.backend.encrypt(weight).await?;
                let weighted = self.backend.mul(&input.handles, &weight_ct.handles).await?;
                acc = self.backend.add(&acc, &weighted).await?;
            }
            self.backend
                .encrypt(compute_confidence(encrypted_inputs.len()))
                .await
                .map(|confidence| (acc, confidence))
        };

        let (prediction, confidence) = result.await.map_err(|err| {
            ServiceError::new(
                Service::ConfidentialCompute,
                ErrorCode::Computation,
                format!("FHE prediction computation failed: {}", err.message),
            )
        })?;

        Ok(EncryptedPrediction {
            prediction,
            confidence,
            domain: domain.clone(),
            timestamp: rfc3339_now(),
        })
    }

    /// Connectivity probe reported under the RPC service name: chain id
    /// reachability plus a backend round trip.
    pub async fn probe(&self) -> ProbeStatus {
        if let Err(err) = self.rpc.chain_id().await {
            return ProbeStatus::down(
                Service::ConfidentialComputeRpc,
                err.code,
                format!("coprocessor RPC connection failed: {}", err.message),
            );
        }

        let roundtrip = async {
            let sample = self.backend.encrypt(42).await?;
            self.backend.decrypt(&sample.handles).await
        };
        match roundtrip.await {
            Ok(_) => ProbeStatus::connected(Service::ConfidentialComputeRpc),
            Err(err) => ProbeStatus::down(
                Service::ConfidentialComputeRpc,
                err.code,
                err.message,
            ),
        }
    }
}
