use std::sync::Arc;
use tracing::instrument;

use crate::models::UserProfile;
use crate::services::error::ServiceError;
use crate::services::store::ProfileStore;

/// Loads the canonical record and applies the existence and lock checks.
#[derive(Clone)]
pub struct ProfileLoader {
    store: Arc<dyn ProfileStore>,
}

impl ProfileLoader {
    pub fn new(store: Arc<dyn ProfileStore>) -> Self {
        Self { store }
    }

    #[instrument(skip(self))]
    pub async fn load(&self, user_id: &str) -> Result<UserProfile, ServiceError> {
        let record = self
            .store
            .find_user(user_id)
            .await
            .map_err(ServiceError::Database)?
            .ok_or(ServiceError::UserNotFound)?;

        if record.is_unavailable() {
            tracing::info!(user_id = %user_id, "Refusing to serve deleted or locked account");
            return Err(ServiceError::AccountLocked);
        }

        Ok(UserProfile::from(record))
    }
}
