use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::instrument;

use super::pii::PiiDecryptor;
use crate::models::declaration::{DECLARED_EMAIL, DECLARED_PHONE};
use crate::models::{Declaration, DeclarationRow};
use crate::services::store::ProfileStore;

/// Loads the fields a user self-declared to organisations.
#[derive(Clone)]
pub struct DeclarationReader {
    store: Arc<dyn ProfileStore>,
    pii: PiiDecryptor,
}

impl DeclarationReader {
    pub fn new(store: Arc<dyn ProfileStore>, pii: PiiDecryptor) -> Self {
        Self { store, pii }
    }

    #[instrument(skip(self, request_id))]
    pub async fn load(
        &self,
        user_id: &str,
        request_id: Option<&str>,
    ) -> Result<Vec<Declaration>, anyhow::Error> {
        let rows = self.store.find_declarations(user_id).await?;
        let declarations =
            futures::future::join_all(rows.into_iter().map(|row| self.decrypt_row(row, request_id)))
                .await;
        Ok(declarations)
    }

    async fn decrypt_row(&self, row: DeclarationRow, request_id: Option<&str>) -> Declaration {
        let mut info: BTreeMap<String, String> = row.user_info.map(|j| j.0).unwrap_or_default();
        for key in [DECLARED_EMAIL, DECLARED_PHONE] {
            let Some(cipher) = info.remove(key) else {
                continue;
            };
            if let Some(plain) = self.pii.decrypt_field(key, Some(&cipher), request_id).await {
                info.insert(key.to_string(), plain);
            }
        }
        Declaration {
            status: row.status,
            error_type: row.error_type,
            org_id: row.org_id,
            persona: row.persona,
            info,
        }
    }
}
