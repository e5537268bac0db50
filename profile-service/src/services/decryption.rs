//! Decryption collaborator for PII stored encrypted at rest.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use service_core::observability::outbound_headers;

use crate::config::DecryptionConfig;

#[async_trait]
pub trait Decryptor: Send + Sync {
    async fn decrypt(&self, value: &str, request_id: Option<&str>)
    -> Result<String, anyhow::Error>;
}

#[derive(Debug, Serialize)]
struct DecryptRequest<'a> {
    value: &'a str,
}

#[derive(Debug, Deserialize)]
struct DecryptResponse {
    value: String,
}

/// HTTP client of the key-management decryption endpoint.
pub struct HttpDecryptor {
    client: Client,
    base_url: String,
}

impl HttpDecryptor {
    pub fn new(config: &DecryptionConfig) -> Result<Self, anyhow::Error> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build decryption client: {}", e))?;
        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl Decryptor for HttpDecryptor {
    async fn decrypt(
        &self,
        value: &str,
        request_id: Option<&str>,
    ) -> Result<String, anyhow::Error> {
        let response = self
            .client
            .post(format!("{}/v1/decrypt", self.base_url))
            .headers(outbound_headers(request_id))
            .json(&DecryptRequest { value })
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to reach decryption service: {}", e))?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!(
                "Decryption service returned error status {}",
                response.status()
            ));
        }

        let parsed: DecryptResponse = response
            .json()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to parse decryption response: {}", e))?;
        Ok(parsed.value)
    }
}

/// Mock decryptor for testing. Ciphertext is `enc:<plaintext>`; anything
/// else fails to decrypt.
#[derive(Default)]
pub struct MockDecryptor {
    failing: bool,
}

impl MockDecryptor {
    pub const PREFIX: &'static str = "enc:";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self { failing: true }
    }

    pub fn encrypt(plaintext: &str) -> String {
        format!("{}{}", Self::PREFIX, plaintext)
    }
}

#[async_trait]
impl Decryptor for MockDecryptor {
    async fn decrypt(
        &self,
        value: &str,
        _request_id: Option<&str>,
    ) -> Result<String, anyhow::Error> {
        if self.failing {
            return Err(anyhow::anyhow!("Decryption service unavailable"));
        }
        value
            .strip_prefix(Self::PREFIX)
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("Value is not a ciphertext"))
    }
}
