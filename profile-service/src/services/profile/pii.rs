use std::sync::Arc;
use tracing::instrument;

use crate::models::UserProfile;
use crate::services::decryption::Decryptor;
use crate::services::metrics;

/// Plaintext contact fields of a profile.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecryptedContacts {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub recovery_email: Option<String>,
    pub recovery_phone: Option<String>,
    pub prev_used_email: Option<String>,
    pub prev_used_phone: Option<String>,
}

/// Field-by-field decryption of values stored encrypted at rest.
#[derive(Clone)]
pub struct PiiDecryptor {
    decryptor: Arc<dyn Decryptor>,
}

impl PiiDecryptor {
    pub fn new(decryptor: Arc<dyn Decryptor>) -> Self {
        Self { decryptor }
    }

    #[instrument(skip_all, fields(user_id = %profile.id))]
    pub async fn decrypt_profile(
        &self,
        profile: &UserProfile,
        request_id: Option<&str>,
    ) -> DecryptedContacts {
        let (email, phone, recovery_email, recovery_phone, prev_used_email, prev_used_phone) = tokio::join!(
            self.decrypt_field("email", profile.email.as_deref(), request_id),
            self.decrypt_field("phone", profile.phone.as_deref(), request_id),
            self.decrypt_field("recoveryEmail", profile.recovery_email.as_deref(), request_id),
            self.decrypt_field("recoveryPhone", profile.recovery_phone.as_deref(), request_id),
            self.decrypt_field("prevUsedEmail", profile.prev_used_email.as_deref(), request_id),
            self.decrypt_field("prevUsedPhone", profile.prev_used_phone.as_deref(), request_id),
        );
        DecryptedContacts {
            email,
            phone,
            recovery_email,
            recovery_phone,
            prev_used_email,
            prev_used_phone,
        }
    }

    /// A value that cannot be decrypted is left out rather than returned as
    /// ciphertext.
    pub async fn decrypt_field(
        &self,
        field: &str,
        value: Option<&str>,
        request_id: Option<&str>,
    ) -> Option<String> {
        let value = value?;
        if value.trim().is_empty() {
            return Some(value.to_string());
        }
        match self.decryptor.decrypt(value, request_id).await {
            Ok(plain) => Some(plain),
            Err(e) => {
                tracing::warn!(field, error = %e, "Failed to decrypt field, omitting it");
                metrics::record_degraded("pii_decrypt");
                None
            }
        }
    }

    /// Strict variant for steps that degrade as a whole.
    pub async fn decrypt(
        &self,
        value: &str,
        request_id: Option<&str>,
    ) -> Result<String, anyhow::Error> {
        self.decryptor.decrypt(value, request_id).await
    }
}
