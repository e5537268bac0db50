use std::sync::Arc;
use tracing::instrument;

use crate::dtos::ProfileReadRequest;
use crate::services::error::ServiceError;
use crate::services::store::ExternalIdentityStore;

/// Maps a provider-scoped id onto the canonical user id.
#[derive(Clone)]
pub struct IdentityResolver {
    store: Arc<dyn ExternalIdentityStore>,
}

impl IdentityResolver {
    pub fn new(store: Arc<dyn ExternalIdentityStore>) -> Self {
        Self { store }
    }

    /// Without a provider the request id already is the canonical id.
    #[instrument(skip(self, request), fields(id = %request.user_id, provider = ?request.provider))]
    pub async fn resolve(&self, request: &ProfileReadRequest) -> Result<String, ServiceError> {
        let Some(provider) = request.provider.as_deref() else {
            return Ok(request.user_id.clone());
        };
        let id_type = request
            .id_type
            .as_deref()
            .ok_or_else(|| ServiceError::MissingParameter("idType".to_string()))?;

        self.store
            .resolve_user_id(&request.user_id, id_type, provider)
            .await
            .map_err(ServiceError::Database)?
            .ok_or_else(|| ServiceError::ExternalIdentityNotFound {
                id: request.user_id.clone(),
                id_type: id_type.to_string(),
                provider: provider.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtos::ApiVersion;
    use crate::models::ExternalIdentityRow;
    use crate::services::memory::MemoryStore;

    fn resolver() -> IdentityResolver {
        let store = MemoryStore::new();
        store.insert_external_id(ExternalIdentityRow {
            user_id: "u1".to_string(),
            external_id: Some("ext-1".to_string()),
            id_type: Some("teacher-id".to_string()),
            provider: Some("org1".to_string()),
            ..Default::default()
        });
        IdentityResolver::new(Arc::new(store))
    }

    #[tokio::test]
    async fn test_without_provider_id_is_canonical() {
        let request = ProfileReadRequest::new("u9", ApiVersion::V4);
        assert_eq!(resolver().resolve(&request).await.unwrap(), "u9");
    }

    #[tokio::test]
    async fn test_provider_requires_id_type() {
        let mut request = ProfileReadRequest::new("ext-1", ApiVersion::V4);
        request.provider = Some("org1".to_string());
        let err = resolver().resolve(&request).await.unwrap_err();
        assert!(matches!(err, ServiceError::MissingParameter(p) if p == "idType"));
    }

    #[tokio::test]
    async fn test_resolves_external_id() {
        let mut request = ProfileReadRequest::new("EXT-1", ApiVersion::V4);
        request.provider = Some("org1".to_string());
        request.id_type = Some("teacher-id".to_string());
        assert_eq!(resolver().resolve(&request).await.unwrap(), "u1");
    }

    #[tokio::test]
    async fn test_unknown_external_id() {
        let mut request = ProfileReadRequest::new("ext-2", ApiVersion::V4);
        request.provider = Some("org1".to_string());
        request.id_type = Some("teacher-id".to_string());
        let err = resolver().resolve(&request).await.unwrap_err();
        match err {
            ServiceError::ExternalIdentityNotFound { id, id_type, provider } => {
                assert_eq!(id, "ext-2");
                assert_eq!(id_type, "teacher-id");
                assert_eq!(provider, "org1");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
