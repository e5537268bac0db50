use futures::future::try_join_all;
use std::sync::Arc;
use tracing::instrument;

use super::locations::LocationHierarchyEnricher;
use super::pii::PiiDecryptor;
use crate::models::{DeclaredIdType, ExternalIdentity, ExternalIdentityRow, UserProfile};
use crate::services::store::ExternalIdentityStore;

/// Builds the public external identity list of a profile.
#[derive(Clone)]
pub struct ExternalIdentityMerger {
    store: Arc<dyn ExternalIdentityStore>,
    pii: PiiDecryptor,
    locations: LocationHierarchyEnricher,
}

impl ExternalIdentityMerger {
    pub fn new(
        store: Arc<dyn ExternalIdentityStore>,
        pii: PiiDecryptor,
        locations: LocationHierarchyEnricher,
    ) -> Self {
        Self {
            store,
            pii,
            locations,
        }
    }

    /// Any failure fails the whole list; callers wrap this in
    /// [`super::degrade::best_effort`].
    #[instrument(skip(self, profile, request_id), fields(user_id = %profile.id))]
    pub async fn merge(
        &self,
        profile: &UserProfile,
        merge_declarations: bool,
        request_id: Option<&str>,
    ) -> Result<Vec<ExternalIdentity>, anyhow::Error> {
        let rows = self
            .store
            .find_external_ids(&profile.id, merge_declarations)
            .await?;
        let identities =
            try_join_all(rows.into_iter().map(|row| self.publish(row, request_id))).await?;

        match (profile.root_org_id.as_deref(), profile.channel.as_deref()) {
            (Some(root), Some(channel)) if all_provided_by(&identities, root) => {
                Ok(relabel_with_channel(identities, channel))
            }
            _ => self.store.normalize_provider_labels(identities).await,
        }
    }

    /// Public triple of one row, with declared values made readable.
    async fn publish(
        &self,
        row: ExternalIdentityRow,
        request_id: Option<&str>,
    ) -> Result<ExternalIdentity, anyhow::Error> {
        let mut identity = ExternalIdentity {
            id: row.original_external_id.or(row.external_id),
            id_type: row.original_id_type.or(row.id_type),
            provider: row.original_provider.or(row.provider),
        };

        let declared = identity.id_type.as_deref().and_then(DeclaredIdType::parse);
        let (Some(kind), Some(value)) = (declared, identity.id.clone()) else {
            return Ok(identity);
        };

        if kind.is_encrypted() {
            identity.id = Some(self.pii.decrypt(&value, request_id).await?);
        } else if kind.is_location() {
            match self.locations.resolve_code(&value).await {
                Ok(Some(code)) => identity.id = Some(code),
                Ok(None) => {}
                Err(e) => {
                    tracing::debug!(location_id = %value, error = %e, "Keeping raw declared location")
                }
            }
        }
        Ok(identity)
    }
}

fn all_provided_by(identities: &[ExternalIdentity], root_org_id: &str) -> bool {
    !identities.is_empty()
        && identities.iter().all(|identity| {
            identity
                .provider
                .as_deref()
                .is_some_and(|p| p.eq_ignore_ascii_case(root_org_id))
        })
}

/// Older clients expect the channel where the root org id is stored.
fn relabel_with_channel(identities: Vec<ExternalIdentity>, channel: &str) -> Vec<ExternalIdentity> {
    identities
        .into_iter()
        .map(|mut identity| {
            if identity.provider.is_some() && identity.id_type == identity.provider {
                identity.id_type = Some(channel.to_string());
            }
            identity.provider = Some(channel.to_string());
            identity
        })
        .collect()
}
