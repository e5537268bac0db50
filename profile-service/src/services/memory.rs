//! In-memory record store used by tests and local runs without PostgreSQL.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use super::store::{ExternalIdentityStore, ProfileStore};
use crate::models::{
    DeclarationRow, ExternalIdentity, ExternalIdentityRow, LocationRecord, OrganisationRecord,
    UserOrgRow, UserRecord, external_identity,
};

#[derive(Default)]
pub struct MemoryStore {
    users: Mutex<HashMap<String, UserRecord>>,
    user_orgs: Mutex<Vec<UserOrgRow>>,
    organisations: Mutex<HashMap<String, OrganisationRecord>>,
    locations: Mutex<HashMap<String, LocationRecord>>,
    declarations: Mutex<Vec<DeclarationRow>>,
    external_ids: Mutex<Vec<ExternalIdentityRow>>,
    failing: Mutex<HashSet<&'static str>>,
    calls: Mutex<HashMap<&'static str, usize>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_user(&self, user: UserRecord) {
        lock(&self.users).insert(user.id.clone(), user);
    }

    pub fn insert_user_org(&self, row: UserOrgRow) {
        lock(&self.user_orgs).push(row);
    }

    pub fn insert_organisation(&self, org: OrganisationRecord) {
        lock(&self.organisations).insert(org.id.clone(), org);
    }

    pub fn insert_location(&self, location: LocationRecord) {
        lock(&self.locations).insert(location.id.clone(), location);
    }

    pub fn insert_declaration(&self, row: DeclarationRow) {
        lock(&self.declarations).push(row);
    }

    pub fn insert_external_id(&self, row: ExternalIdentityRow) {
        lock(&self.external_ids).push(row);
    }

    /// Make every later call of `operation` fail, e.g. `"find_locations"`.
    pub fn fail_on(&self, operation: &'static str) {
        lock(&self.failing).insert(operation);
    }

    /// How many times `operation` has been called, failed calls included.
    pub fn calls(&self, operation: &str) -> usize {
        lock(&self.calls).get(operation).copied().unwrap_or(0)
    }

    fn check(&self, operation: &'static str) -> Result<(), anyhow::Error> {
        *lock(&self.calls).entry(operation).or_insert(0) += 1;
        if lock(&self.failing).contains(operation) {
            return Err(anyhow::anyhow!("{} unavailable", operation));
        }
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl ProfileStore for MemoryStore {
    async fn find_user(&self, user_id: &str) -> Result<Option<UserRecord>, anyhow::Error> {
        self.check("find_user")?;
        Ok(lock(&self.users).get(user_id).cloned())
    }

    async fn find_user_orgs(&self, user_id: &str) -> Result<Vec<UserOrgRow>, anyhow::Error> {
        self.check("find_user_orgs")?;
        Ok(lock(&self.user_orgs)
            .iter()
            .filter(|row| row.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn find_organisations(
        &self,
        org_ids: &[String],
    ) -> Result<Vec<OrganisationRecord>, anyhow::Error> {
        self.check("find_organisations")?;
        let organisations = lock(&self.organisations);
        Ok(org_ids
            .iter()
            .filter_map(|id| organisations.get(id).cloned())
            .collect())
    }

    async fn find_locations(
        &self,
        location_ids: &[String],
    ) -> Result<Vec<LocationRecord>, anyhow::Error> {
        self.check("find_locations")?;
        let locations = lock(&self.locations);
        Ok(location_ids
            .iter()
            .filter_map(|id| locations.get(id).cloned())
            .collect())
    }

    async fn find_declarations(
        &self,
        user_id: &str,
    ) -> Result<Vec<DeclarationRow>, anyhow::Error> {
        self.check("find_declarations")?;
        Ok(lock(&self.declarations)
            .iter()
            .filter(|row| row.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn health_check(&self) -> Result<(), anyhow::Error> {
        self.check("health_check")
    }
}

#[async_trait]
impl ExternalIdentityStore for MemoryStore {
    async fn resolve_user_id(
        &self,
        external_id: &str,
        id_type: &str,
        provider: &str,
    ) -> Result<Option<String>, anyhow::Error> {
        self.check("resolve_user_id")?;
        let matches = |stored: &Option<String>, wanted: &str| {
            stored
                .as_deref()
                .is_some_and(|s| s.eq_ignore_ascii_case(wanted))
        };
        Ok(lock(&self.external_ids)
            .iter()
            .find(|row| {
                matches(&row.external_id, external_id)
                    && matches(&row.id_type, id_type)
                    && matches(&row.provider, provider)
            })
            .map(|row| row.user_id.clone()))
    }

    async fn find_external_ids(
        &self,
        user_id: &str,
        merge_declarations: bool,
    ) -> Result<Vec<ExternalIdentityRow>, anyhow::Error> {
        self.check("find_external_ids")?;
        let verified: Vec<ExternalIdentityRow> = lock(&self.external_ids)
            .iter()
            .filter(|row| row.user_id == user_id)
            .cloned()
            .collect();
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
        self.check("normalize_provider_labels")?;
        let channels: HashMap<String, String> = lock(&self.organisations)
            .values()
            .filter_map(|org| Some((org.id.clone(), org.channel.clone()?)))
            .collect();
        Ok(external_identity::apply_provider_channels(
            identities, &channels,
        ))
    }
}
