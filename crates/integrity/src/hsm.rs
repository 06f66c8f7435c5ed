//! Hardware Security Module port.
//!
//! The HSM is a remote, possibly unavailable dependency with high latency.
//! Payloads are raw UTF-8 bytes; signatures and ciphertexts travel as base64.

use std::sync::Arc;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HsmError {
    #[error("hsm is disabled")]
    Disabled,

    #[error("invalid hsm input: {0}")]
    InvalidInput(String),

    #[error("hsm unavailable: {0}")]
    Unavailable(String),

    #[error("hsm rejected request: {0}")]
    Rejected(String),
}

/// Sign / verify / encrypt / decrypt against key material held by an HSM.
///
/// Clients are constructed explicitly and passed by reference; `close`
/// releases any underlying connection. Operations after `close` fail with
/// [`HsmError::Unavailable`].
#[async_trait]
pub trait HsmClient: Send + Sync {
    /// Sign `payload`, returning a base64 signature.
    async fn sign(&self, payload: &[u8]) -> Result<String, HsmError>;

    /// Verify a base64 `signature` over `payload`.
    async fn verify(&self, payload: &[u8], signature: &str) -> Result<bool, HsmError>;

    /// Encrypt `plaintext`, returning base64 ciphertext.
    async fn encrypt(&self, plaintext: &[u8]) -> Result<String, HsmError>;

    /// Decrypt base64 `ciphertext` back to the original bytes.
    async fn decrypt(&self, ciphertext: &str) -> Result<Vec<u8>, HsmError>;

    async fn close(&self) {}
}

#[async_trait]
impl<H> HsmClient for Arc<H>
where
    H: HsmClient + ?Sized,
{
    async fn sign(&self, payload: &[u8]) -> Result<String, HsmError> {
        (**self).sign(payload).await
    }

    async fn verify(&self, payload: &[u8], signature: &str) -> Result<bool, HsmError> {
        (**self).verify(payload, signature).await
    }

    async fn encrypt(&self, plaintext: &[u8]) -> Result<String, HsmError> {
        (**self).encrypt(plaintext).await
    }

    async fn decrypt(&self, ciphertext: &str) -> Result<Vec<u8>, HsmError> {
        (**self).decrypt(ciphertext).await
    }

    async fn close(&self) {
        (**self).close().await
    }
}

/// Reject empty payloads before any HSM round trip.
pub fn require_payload(payload: &[u8]) -> Result<(), HsmError> {
    if payload.is_empty() {
        return Err(HsmError::InvalidInput("payload cannot be empty".to_string()));
    }
    Ok(())
}

/// Reject blank or non-base64 signatures, returning the decoded bytes.
pub fn decode_signature(signature: &str) -> Result<Vec<u8>, HsmError> {
    if signature.trim().is_empty() {
        return Err(HsmError::InvalidInput("signature cannot be empty".to_string()));
    }
    STANDARD
        .decode(signature.trim())
        .map_err(|_| HsmError::InvalidInput("signature is not valid base64".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_inputs_are_rejected_up_front() {
        assert!(matches!(require_payload(b""), Err(HsmError::InvalidInput(_))));
        assert!(require_payload(b"x").is_ok());
        assert!(matches!(decode_signature("  "), Err(HsmError::InvalidInput(_))));
        assert!(matches!(decode_signature("%%%"), Err(HsmError::InvalidInput(_))));
        assert_eq!(decode_signature("AQI=").unwrap(), vec![1, 2]);
    }
}
