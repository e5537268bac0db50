//! PostgreSQL record store for profile-service.
//!
//! All multi-id reads are single `= ANY($1)` queries.

use async_trait::async_trait;
use sqlx::postgres::PgPool;
use std::collections::{BTreeSet, HashMap};

use super::store::{ExternalIdentityStore, ProfileStore};
use crate::models::{
    DeclarationRow, ExternalIdentity, ExternalIdentityRow, LocationRecord, OrganisationRecord,
    UserOrgRow, UserRecord, external_identity,
};

/// PostgreSQL database wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl ProfileStore for Database {
    async fn find_user(&self, user_id: &str) -> Result<Option<UserRecord>, anyhow::Error> {
        sqlx::query_as::<_, UserRecord>("SELECT * FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to load user {}: {}", user_id, e))
    }

    async fn find_user_orgs(&self, user_id: &str) -> Result<Vec<UserOrgRow>, anyhow::Error> {
        sqlx::query_as::<_, UserOrgRow>(
            "SELECT * FROM user_organisations WHERE user_id = $1 ORDER BY org_join_date, id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to load memberships of {}: {}", user_id, e))
    }

    async fn find_organisations(
        &self,
        org_ids: &[String],
    ) -> Result<Vec<OrganisationRecord>, anyhow::Error> {
        if org_ids.is_empty() {
            return Ok(Vec::new());
        }
        sqlx::query_as::<_, OrganisationRecord>(
            r#"
            SELECT id, org_name, description, channel, slug, hash_tag_id, external_id,
                   is_tenant, status, organisation_type, org_location
            FROM organisations
            WHERE id = ANY($1)
            ORDER BY array_position($1, id)
            "#,
        )
        .bind(org_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to load organisations: {}", e))
    }

    async fn find_locations(
        &self,
        location_ids: &[String],
    ) -> Result<Vec<LocationRecord>, anyhow::Error> {
        if location_ids.is_empty() {
            return Ok(Vec::new());
        }
        sqlx::query_as::<_, LocationRecord>(
            r#"
            SELECT id, code, name, type, parent_id
            FROM locations
            WHERE id = ANY($1)
            ORDER BY array_position($1, id)
            "#,
        )
        .bind(location_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to load locations: {}", e))
    }

    async fn find_declarations(
        &self,
        user_id: &str,
    ) -> Result<Vec<DeclarationRow>, anyhow::Error> {
        sqlx::query_as::<_, DeclarationRow>(
            r#"
            SELECT user_id, org_id, persona, status, error_type, user_info
            FROM user_declarations
            WHERE user_id = $1
            ORDER BY org_id, persona
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to load declarations of {}: {}", user_id, e))
    }

    async fn health_check(&self) -> Result<(), anyhow::Error> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Database health check failed: {}", e);
                anyhow::anyhow!("Database health check failed: {}", e)
            })?;
        Ok(())
    }
}

#[async_trait]
impl ExternalIdentityStore for Database {
    async fn resolve_user_id(
        &self,
        external_id: &str,
        id_type: &str,
        provider: &str,
    ) -> Result<Option<String>, anyhow::Error> {
        sqlx::query_scalar::<_, String>(
            r#"
            SELECT user_id FROM user_external_identities
            WHERE external_id = LOWER($1) AND id_type = LOWER($2) AND provider = LOWER($3)
            LIMIT 1
            "#,
        )
        .bind(external_id)
        .bind(id_type)
        .bind(provider)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to resolve external id: {}", e))
    }

    async fn find_external_ids(
        &self,
        user_id: &str,
        merge_declarations: bool,
    ) -> Result<Vec<ExternalIdentityRow>, anyhow::Error> {
        let verified = sqlx::query_as::<_, ExternalIdentityRow>(
            "SELECT * FROM user_external_identities WHERE user_id = $1 ORDER BY id_type, provider",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to load external ids of {}: {}", user_id, e))?;

        if !merge_declarations {
            return Ok(verified);
        }
        let declarations = self.find_declarations(user_id).await?;
        Ok(external_identity::merge_declared_identities(
            user_id,
            verified,
            &declarations,
        ))
    }

    async fn normalize_provider_labels(
        &self,
        identities: Vec<ExternalIdentity>,
    ) -> Result<Vec<ExternalIdentity>, anyhow::Error> {
        let providers: Vec<String> = identities
            .iter()
            .filter_map(|i| i.provider.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let channels: HashMap<String, String> = self
            .find_organisations(&providers)
            .await?
            .into_iter()
            .filter_map(|org| Some((org.id, org.channel?)))
            .collect();
        Ok(external_identity::apply_provider_channels(
            identities, &channels,
        ))
    }
}
