//! Client for the remote HSM signing service.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde::Serialize;
use tracing::error;

use keystone_integrity::hsm::{decode_signature, require_payload};
use keystone_integrity::{HsmClient, HsmError};

use crate::config::HsmConfig;

const SIGN_PATH: &str = "/api/auth/oracle/hsm/v1/sign";
const VERIFY_PATH: &str = "/api/auth/oracle/hsm/v1/verify";
const ENCRYPT_PATH: &str = "/api/auth/oracle/hsm/v1/encrypt";
const DECRYPT_PATH: &str = "/api/auth/oracle/hsm/v1/decrypt";

#[derive(Debug, Default, Serialize)]
struct HsmRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    signature: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    plaintext: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ciphertext: Option<&'a str>,
}

#[derive(Debug)]
pub struct HttpHsmClient {
    client: reqwest::Client,
    base_url: String,
    enabled: bool,
    closed: AtomicBool,
}

impl HttpHsmClient {
    /// Validate the configuration and build the underlying connection pool.
    pub fn connect(config: &HsmConfig) -> Result<Self, HsmError> {
        let base_url = config
            .service_url
            .as_deref()
            .map(|u| u.trim().trim_end_matches('/'))
            .filter(|u| u.starts_with("http://") || u.starts_with("https://"))
            .ok_or_else(|| HsmError::InvalidInput("hsm service url must be an http(s) url".into()))?
            .to_string();

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| HsmError::Unavailable(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            enabled: config.enabled,
            closed: AtomicBool::new(false),
        })
    }

    fn ensure_ready(&self) -> Result<(), HsmError> {
        if !self.enabled {
            return Err(HsmError::Disabled);
        }
        if self.closed.load(Ordering::Acquire) {
            return Err(HsmError::Unavailable("client closed".into()));
        }
        Ok(())
    }

    async fn post(&self, operation: &'static str, path: &str, body: &HsmRequest<'_>) -> Result<reqwest::Response, HsmError> {
        let resp = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .json(body)
            .send()
            .await
            .map_err(|e| {
                error!(operation, timeout = e.is_timeout(), "hsm request failed");
                HsmError::Unavailable(if e.is_timeout() { "timeout".into() } else { "transport error".into() })
            })?;

        let status = resp.status();
        if status.is_success() {
            Ok(resp)
        } else if status.is_server_error() {
            error!(operation, status = status.as_u16(), "hsm service error");
            Err(HsmError::Unavailable(format!("status {}", status.as_u16())))
        } else {
            Err(HsmError::Rejected(format!("status {}", status.as_u16())))
        }
    }

    async fn text(resp: reqwest::Response) -> Result<String, HsmError> {
        let raw = resp
            .text()
            .await
            .map_err(|e| HsmError::Unavailable(e.to_string()))?;
        // Accept both a bare body and a JSON string.
        let value = serde_json::from_str::<String>(&raw).unwrap_or(raw);
        let value = value.trim();
        if value.is_empty() {
            return Err(HsmError::Rejected("empty response".into()));
        }
        Ok(value.to_string())
    }
}

fn utf8(payload: &[u8]) -> Result<&str, HsmError> {
    std::str::from_utf8(payload).map_err(|_| HsmError::InvalidInput("payload must be utf-8".into()))
}

#[async_trait]
impl HsmClient for HttpHsmClient {
    async fn sign(&self, payload: &[u8]) -> Result<String, HsmError> {
        self.ensure_ready()?;
        require_payload(payload)?;
        let body = HsmRequest {
            data: Some(utf8(payload)?),
            ..Default::default()
        };
        Self::text(self.post("sign", SIGN_PATH, &body).await?).await
    }

    async fn verify(&self, payload: &[u8], signature: &str) -> Result<bool, HsmError> {
        self.ensure_ready()?;
        require_payload(payload)?;
        decode_signature(signature)?;
        let body = HsmRequest {
            data: Some(utf8(payload)?),
            signature: Some(signature.trim()),
            ..Default::default()
        };
        self.post("verify", VERIFY_PATH, &body)
            .await?
            .json::<bool>()
            .await
            .map_err(|e| HsmError::Rejected(e.to_string()))
    }

    async fn encrypt(&self, plaintext: &[u8]) -> Result<String, HsmError> {
        self.ensure_ready()?;
        require_payload(plaintext)?;
        let body = HsmRequest {
            plaintext: Some(utf8(plaintext)?),
            ..Default::default()
        };
        Self::text(self.post("encrypt", ENCRYPT_PATH, &body).await?).await
    }

    async fn decrypt(&self, ciphertext: &str) -> Result<Vec<u8>, HsmError> {
        self.ensure_ready()?;
        if ciphertext.trim().is_empty() {
            return Err(HsmError::InvalidInput("ciphertext cannot be empty".into()));
        }
        let body = HsmRequest {
            ciphertext: Some(ciphertext.trim()),
            ..Default::default()
        };
        let plain = Self::text(self.post("decrypt", DECRYPT_PATH, &body).await?).await?;
        Ok(plain.into_bytes())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}
