use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::instrument;

use super::degrade::best_effort;
use super::locations::LocationHierarchyEnricher;
use crate::models::user::{location_ids, parse_location_refs};
use crate::models::{LocationRef, OrgAffiliation, OrgType, OrganisationRecord, RootOrgView};
use crate::services::store::ProfileStore;

/// Loads a user's memberships and, on request, the organisations behind them.
#[derive(Clone)]
pub struct OrgAffiliationEnricher {
    store: Arc<dyn ProfileStore>,
    locations: LocationHierarchyEnricher,
}

impl OrgAffiliationEnricher {
    pub fn new(store: Arc<dyn ProfileStore>, locations: LocationHierarchyEnricher) -> Self {
        Self { store, locations }
    }

    /// Live memberships with their association flags decoded.
    #[instrument(skip(self))]
    pub async fn load_affiliations(
        &self,
        user_id: &str,
    ) -> Result<Vec<OrgAffiliation>, anyhow::Error> {
        let rows = self.store.find_user_orgs(user_id).await?;
        Ok(rows
            .into_iter()
            .filter(|row| !row.is_deleted.unwrap_or(false))
            .map(OrgAffiliation::from)
            .collect())
    }

    /// Merge organisation details and their resolved locations into every
    /// membership. Missing or unreadable organisation data leaves a
    /// membership as it was.
    #[instrument(skip(self, affiliations), fields(count = affiliations.len()))]
    pub async fn enrich_with_details(
        &self,
        user_id: &str,
        mut affiliations: Vec<OrgAffiliation>,
    ) -> Vec<OrgAffiliation> {
        let mut seen = HashSet::new();
        let org_ids: Vec<String> = affiliations
            .iter()
            .map(|a| a.organisation_id.clone())
            .filter(|id| !id.trim().is_empty() && seen.insert(id.clone()))
            .collect();
        if org_ids.is_empty() {
            return affiliations;
        }

        let records: Vec<OrganisationRecord> = best_effort(
            "organisation_details",
            user_id,
            self.store.find_organisations(&org_ids),
        )
        .await;
        let by_id: HashMap<String, OrganisationRecord> =
            records.into_iter().map(|org| (org.id.clone(), org)).collect();

        for affiliation in affiliations.iter_mut() {
            if let Some(org) = by_id.get(&affiliation.organisation_id) {
                apply_details(affiliation, org);
            }
        }

        let all_location_ids: Vec<String> = affiliations
            .iter()
            .filter_map(|a| a.location_ids.as_ref())
            .flatten()
            .cloned()
            .collect();
        let resolved = best_effort(
            "organisation_locations",
            user_id,
            self.locations.resolve_map(&all_location_ids),
        )
        .await;
        if !resolved.is_empty() {
            for affiliation in affiliations.iter_mut() {
                if let Some(ids) = affiliation.location_ids.as_ref() {
                    affiliation.locations =
                        Some(ids.iter().filter_map(|id| resolved.get(id).cloned()).collect());
                }
            }
        }

        affiliations
    }

    #[instrument(skip(self))]
    pub async fn load_root_org(
        &self,
        root_org_id: &str,
    ) -> Result<Option<RootOrgView>, anyhow::Error> {
        let found = self
            .store
            .find_organisations(&[root_org_id.to_string()])
            .await?;
        Ok(found.into_iter().next().map(|org| RootOrgView {
            org_location: org_locations(&org),
            id: org.id,
            org_name: org.org_name,
            description: org.description,
            channel: org.channel,
            slug: org.slug,
            hash_tag_id: org.hash_tag_id,
            external_id: org.external_id,
            is_tenant: org.is_tenant,
            status: org.status,
            organisation_type: org.organisation_type,
        }))
    }
}

fn apply_details(affiliation: &mut OrgAffiliation, org: &OrganisationRecord) {
    let declared = org_locations(org);
    affiliation.hash_tag_id = org.hash_tag_id.clone();
    affiliation.org_name = org.org_name.clone();
    affiliation.channel = org.channel.clone();
    affiliation.external_id = org.external_id.clone();
    affiliation.location_ids = Some(location_ids(&declared));
    affiliation.org_location = Some(declared);
    affiliation.is_school = org
        .organisation_type
        .map(|code| OrgType::from_code(code).is_school());
}

/// Declared locations of an organisation; malformed documents read as none.
fn org_locations(org: &OrganisationRecord) -> Vec<LocationRef> {
    let Some(raw) = org.org_location.as_deref() else {
        return Vec::new();
    };
    parse_location_refs(raw).unwrap_or_else(|e| {
        tracing::warn!(org_id = %org.id, error = %e, "Malformed organisation location list");
        Vec::new()
    })
}
