//! Read-only collaborator seams of the profile pipeline.
//!
//! Each trait has a PostgreSQL implementation in [`super::database`] and an
//! in-memory one in [`super::memory`].

use async_trait::async_trait;

use crate::models::{
    DeclarationRow, ExternalIdentity, ExternalIdentityRow, LocationRecord, OrganisationRecord,
    UserOrgRow, UserRecord,
};

/// Primary record store: users, memberships, organisations, locations.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn find_user(&self, user_id: &str) -> Result<Option<UserRecord>, anyhow::Error>;

    /// All membership rows of a user, soft-deleted ones included.
    async fn find_user_orgs(&self, user_id: &str) -> Result<Vec<UserOrgRow>, anyhow::Error>;

    /// Batch lookup; ids without a record are absent from the result.
    async fn find_organisations(
        &self,
        org_ids: &[String],
    ) -> Result<Vec<OrganisationRecord>, anyhow::Error>;

    /// Batch lookup; ids without a record are absent from the result.
    async fn find_locations(
        &self,
        location_ids: &[String],
    ) -> Result<Vec<LocationRecord>, anyhow::Error>;

    async fn find_declarations(&self, user_id: &str)
    -> Result<Vec<DeclarationRow>, anyhow::Error>;

    async fn health_check(&self) -> Result<(), anyhow::Error>;
}

/// Provider-scoped identities of users.
#[async_trait]
pub trait ExternalIdentityStore: Send + Sync {
    /// Canonical user id behind `(external_id, id_type, provider)`.
    ///
    /// Matching is case-insensitive on all three parts.
    async fn resolve_user_id(
        &self,
        external_id: &str,
        id_type: &str,
        provider: &str,
    ) -> Result<Option<String>, anyhow::Error>;

    /// Verified identity rows, with declaration entries merged in when
    /// `merge_declarations` is set.
    async fn find_external_ids(
        &self,
        user_id: &str,
        merge_declarations: bool,
    ) -> Result<Vec<ExternalIdentityRow>, anyhow::Error>;

    /// Relabel organisation-id providers with the organisation's channel.
    async fn normalize_provider_labels(
        &self,
        identities: Vec<ExternalIdentity>,
    ) -> Result<Vec<ExternalIdentity>, anyhow::Error>;
}
