//! Deterministic stand-in for the real encryption backend.
//!
//! This is NOT homomorphic arithmetic. Ciphertexts are SHA-256 digests and
//! the "operations" act on a truncated integer view of the handle, so the
//! demo runs end-to-end without a coprocessor. Every output is fully
//! determined by its inputs, which is exactly what the tests rely on.

use crate::error::{ErrorCode, Service, ServiceError};
use crate::fhe::{EncryptedValue, FheBackend, Handle};
use async_trait::async_trait;
use sha2::{Digest, Sha256};

/// Fixed public key served when no real network key exists.
pub const SIMULATION_PUBLIC_KEY: &str =
    "0x1234567890abcdef1234567890abcdef1234567890abcdef1234567890abcdef";

#[derive(Clone, Copy, Debug, Default)]
pub struct SimulationBackend;

impl SimulationBackend {
    /// First 8 hex digits of a handle as an integer, the unit all simulated
    /// arithmetic operates on. Handles arrive from callers, so nothing here
    /// may panic on arbitrary input.
    fn word(handle: &Handle, code: ErrorCode) -> Result<u64, ServiceError> {
        let hex_digits = handle.0.strip_prefix("0x").unwrap_or(&handle.0);
        let window: String = hex_digits.chars().take(8).collect();
        if window.is_empty() {
            return Err(Self::malformed(handle, code));
        }
        u64::from_str_radix(&window, 16).map_err(|_| Self::malformed(handle, code))
    }

    fn malformed(handle: &Handle, code: ErrorCode) -> ServiceError {
        ServiceError::new(
            Service::ConfidentialCompute,
            code,
            format!("malformed ciphertext handle '{}'", handle.0),
        )
    }

    fn encode(word: u64) -> Handle {
        Handle(format!("0x{word:08x}"))
    }
}

#[async_trait]
impl FheBackend for SimulationBackend {
    fn name(&self) -> &'static str {
        "simulation"
    }

    async fn public_key(&self) -> Result<String, ServiceError> {
        Ok(SIMULATION_PUBLIC_KEY.to_string())
    }

    async fn encrypt(&self, value: i64) -> Result<EncryptedValue, ServiceError> {
        let digest = Sha256::digest(value.to_string().as_bytes());
        let hash = hex::encode(digest);
        Ok(EncryptedValue {
            data: format!("0x{hash}"),
            handles: Handle(format!("0x{}", &hash[..32])),
        })
    }

    async fn decrypt(&self, handle: &Handle) -> Result<i64, ServiceError> {
        let word = Self::word(handle, ErrorCode::Decryption)?;
        Ok((word % 1000) as i64)
    }

    async fn add(&self, a: &Handle, b: &Handle) -> Result<Handle, ServiceError> {
        let sum = Self::word(a, ErrorCode::Computation)? + Self::word(b, ErrorCode::Computation)?;
        Ok(Self::encode(sum))
    }

    async fn mul(&self, a: &Handle, b: &Handle) -> Result<Handle, ServiceError> {
        let product =
            Self::word(a, ErrorCode::Computation)? * Self::word(b, ErrorCode::Computation)?;
        Ok(Self::encode(product))
    }
}
