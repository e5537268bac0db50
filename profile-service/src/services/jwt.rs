use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

use crate::config::ManagedTokenConfig;

/// Issues tokens that let an owner act for the accounts it manages.
#[async_trait]
pub trait TokenIssuer: Send + Sync {
    /// One token per subject id, keyed by subject id.
    async fn issue_managed_tokens(
        &self,
        owner_id: &str,
        subject_ids: &[String],
    ) -> Result<HashMap<String, String>, anyhow::Error>;
}

/// Claims of a managed-account token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagedTokenClaims {
    /// Managed account id
    pub sub: String,
    /// Managing account id
    pub parent_id: String,
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
}

/// RS256 signer of managed-account tokens.
#[derive(Clone)]
pub struct ManagedTokenService {
    encoding_key: EncodingKey,
    expiry_minutes: i64,
}

impl ManagedTokenService {
    /// Create the service by loading the RSA private key from file
    pub fn new(config: &ManagedTokenConfig) -> Result<Self, anyhow::Error> {
        let private_key_pem = fs::read_to_string(&config.private_key_path).map_err(|e| {
            anyhow::anyhow!(
                "Failed to read private key from {}: {}",
                config.private_key_path,
                e
            )
        })?;

        let encoding_key = EncodingKey::from_rsa_pem(private_key_pem.as_bytes())
            .map_err(|e| anyhow::anyhow!("Failed to parse private key: {}", e))?;

        tracing::info!("Managed token service initialized with RS256 key");

        Ok(Self {
            encoding_key,
            expiry_minutes: config.expiry_minutes,
        })
    }

    pub fn generate_managed_token(
        &self,
        owner_id: &str,
        subject_id: &str,
    ) -> Result<String, anyhow::Error> {
        let now = Utc::now();
        let exp = now + Duration::minutes(self.expiry_minutes);

        let claims = ManagedTokenClaims {
            sub: subject_id.to_string(),
            parent_id: owner_id.to_string(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::new(Algorithm::RS256), &claims, &self.encoding_key)
            .map_err(|e| anyhow::anyhow!("Failed to encode managed token: {}", e))
    }
}

#[async_trait]
impl TokenIssuer for ManagedTokenService {
    async fn issue_managed_tokens(
        &self,
        owner_id: &str,
        subject_ids: &[String],
    ) -> Result<HashMap<String, String>, anyhow::Error> {
        subject_ids
            .iter()
            .map(|subject| {
                self.generate_managed_token(owner_id, subject)
                    .map(|token| (subject.clone(), token))
            })
            .collect()
    }
}

/// Mock issuer for testing: tokens are `managed:<owner>:<subject>`.
#[derive(Default)]
pub struct MockTokenIssuer {
    failing: bool,
    issued: AtomicU64,
}

impl MockTokenIssuer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Default::default()
        }
    }

    pub fn issued_count(&self) -> u64 {
        self.issued.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenIssuer for MockTokenIssuer {
    async fn issue_managed_tokens(
        &self,
        owner_id: &str,
        subject_ids: &[String],
    ) -> Result<HashMap<String, String>, anyhow::Error> {
        if self.failing {
            return Err(anyhow::anyhow!("Token issuer unavailable"));
        }
        self.issued
            .fetch_add(subject_ids.len() as u64, Ordering::SeqCst);
        Ok(subject_ids
            .iter()
            .map(|s| (s.clone(), format!("managed:{}:{}", owner_id, s)))
            .collect())
    }
}
