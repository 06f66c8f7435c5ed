//! In-process HSM stand-in for development and tests.
//!
//! Signatures are HMAC-SHA256 over the payload; encryption is AES-256-GCM
//! with a random 96-bit nonce prepended to the ciphertext. Both keys are
//! derived from a single shared secret.

use std::sync::atomic::{AtomicBool, Ordering};

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::hsm::{decode_signature, require_payload, HsmClient, HsmError};

type HmacSha256 = Hmac<Sha256>;

const NONCE_LEN: usize = 12;

pub struct LocalHsm {
    mac_key: Vec<u8>,
    cipher_key: [u8; 32],
    enabled: bool,
    closed: AtomicBool,
}

impl LocalHsm {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        let secret = secret.as_ref();
        let mut cipher_key = [0u8; 32];
        cipher_key.copy_from_slice(&Sha256::digest(secret));
        Self {
            mac_key: secret.to_vec(),
            cipher_key,
            enabled: true,
            closed: AtomicBool::new(false),
        }
    }

    /// A client whose every operation fails with [`HsmError::Disabled`].
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::new(b"disabled")
        }
    }

    fn ensure_ready(&self) -> Result<(), HsmError> {
        if !self.enabled {
            return Err(HsmError::Disabled);
        }
        if self.closed.load(Ordering::Acquire) {
            return Err(HsmError::Unavailable("client closed".to_string()));
        }
        Ok(())
    }

    fn mac(&self) -> Result<HmacSha256, HsmError> {
        <HmacSha256 as Mac>::new_from_slice(&self.mac_key)
            .map_err(|e| HsmError::Rejected(format!("mac key: {e}")))
    }

    fn cipher(&self) -> Result<Aes256Gcm, HsmError> {
        <Aes256Gcm as KeyInit>::new_from_slice(&self.cipher_key)
            .map_err(|e| HsmError::Rejected(format!("cipher key: {e}")))
    }
}

impl core::fmt::Debug for LocalHsm {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LocalHsm")
            .field("enabled", &self.enabled)
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl HsmClient for LocalHsm {
    async fn sign(&self, payload: &[u8]) -> Result<String, HsmError> {
        self.ensure_ready()?;
        require_payload(payload)?;
        let mut mac = self.mac()?;
        mac.update(payload);
        Ok(STANDARD.encode(mac.finalize().into_bytes()))
    }

    async fn verify(&self, payload: &[u8], signature: &str) -> Result<bool, HsmError> {
        self.ensure_ready()?;
        require_payload(payload)?;
        let expected = decode_signature(signature)?;
        let mut mac = self.mac()?;
        mac.update(payload);
        Ok(mac.verify_slice(&expected).is_ok())
    }

    async fn encrypt(&self, plaintext: &[u8]) -> Result<String, HsmError> {
        self.ensure_ready()?;
        require_payload(plaintext)?;
        let nonce_bytes: [u8; NONCE_LEN] = rand::random();
        let sealed = self
            .cipher()?
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
            .map_err(|_| HsmError::Rejected("encryption failed".to_string()))?;

        let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&sealed);
        Ok(STANDARD.encode(out))
    }

    async fn decrypt(&self, ciphertext: &str) -> Result<Vec<u8>, HsmError> {
        self.ensure_ready()?;
        if ciphertext.trim().is_empty() {
            return Err(HsmError::InvalidInput("ciphertext cannot be empty".to_string()));
        }
        let raw = STANDARD
            .decode(ciphertext.trim())
            .map_err(|_| HsmError::InvalidInput("ciphertext is not valid base64".to_string()))?;
        if raw.len() <= NONCE_LEN {
            return Err(HsmError::InvalidInput("ciphertext is truncated".to_string()));
        }
        let (nonce, sealed) = raw.split_at(NONCE_LEN);
        self.cipher()?
            .decrypt(Nonce::from_slice(nonce), sealed)
            .map_err(|_| HsmError::Rejected("decryption failed".to_string()))
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}
