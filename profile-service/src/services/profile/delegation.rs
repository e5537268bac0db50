use std::sync::Arc;
use tracing::instrument;

use crate::dtos::Requester;
use crate::models::UserProfile;
use crate::services::error::ServiceError;
use crate::services::jwt::TokenIssuer;
use crate::services::metrics;

/// Outcome of a successful delegation check for one read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelegationGrant {
    pub requested_by: Option<String>,
    pub subject_id: String,
    /// Owner of a managed account, if the subject is one.
    pub managed_by: Option<String>,
}

/// Trust decision for managed accounts plus token attachment.
#[derive(Clone)]
pub struct DelegationAuthorizer {
    issuer: Arc<dyn TokenIssuer>,
}

impl DelegationAuthorizer {
    pub fn new(issuer: Arc<dyn TokenIssuer>) -> Self {
        Self { issuer }
    }

    /// A managed account is only visible to its owner unless the view is
    /// private. Owner ids are compared exactly.
    pub fn authorize(
        &self,
        requester: &Requester,
        subject: &UserProfile,
        private: bool,
    ) -> Result<DelegationGrant, ServiceError> {
        let managed_by = subject.managed_by.clone();
        if let Some(owner) = managed_by.as_deref() {
            if !private && requester.requested_by.as_deref() != Some(owner) {
                tracing::info!(
                    user_id = %subject.id,
                    managed_by = %owner,
                    requested_by = ?requester.requested_by,
                    "Managed account read by someone other than its owner"
                );
                return Err(ServiceError::Unauthorized);
            }
        }

        Ok(DelegationGrant {
            requested_by: requester.requested_by.clone(),
            subject_id: subject.id.clone(),
            managed_by,
        })
    }

    /// Token for the owner to act as the subject. A caller-supplied token is
    /// echoed; an issuer failure leaves the token out.
    #[instrument(skip_all, fields(user_id = %grant.subject_id))]
    pub async fn attach_token(
        &self,
        grant: &DelegationGrant,
        requester: &Requester,
        with_tokens: bool,
    ) -> Option<String> {
        if !with_tokens {
            return None;
        }
        let owner = grant.managed_by.as_deref()?;
        if let Some(token) = requester
            .managed_token
            .as_deref()
            .filter(|t| !t.trim().is_empty())
        {
            return Some(token.to_string());
        }

        tracing::info!(managed_by = %owner, "Issuing managed token");
        match self
            .issuer
            .issue_managed_tokens(owner, std::slice::from_ref(&grant.subject_id))
            .await
        {
            Ok(mut tokens) => tokens.remove(&grant.subject_id),
            Err(e) => {
                tracing::warn!(error = %e, "Managed token issuance failed");
                metrics::record_degraded("managed_token");
                None
            }
        }
    }
}
