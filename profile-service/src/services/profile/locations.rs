use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::instrument;

use crate::models::location::LOCATION_TYPE_SCHOOL;
use crate::models::{LocationRecord, OrgAffiliation};
use crate::services::metrics;
use crate::services::search::LocationSearch;
use crate::services::store::ProfileStore;

/// Resolved location levels needed before a school is looked up
/// (state, district and block or deeper).
const MIN_LEVELS_FOR_SCHOOL: usize = 3;

/// Resolves location ids into denormalized location records.
#[derive(Clone)]
pub struct LocationHierarchyEnricher {
    store: Arc<dyn ProfileStore>,
    search: Arc<dyn LocationSearch>,
}

impl LocationHierarchyEnricher {
    pub fn new(store: Arc<dyn ProfileStore>, search: Arc<dyn LocationSearch>) -> Self {
        Self { store, search }
    }

    /// One batch lookup for the distinct non-blank ids. Missing ids are
    /// simply absent; order is the store's.
    #[instrument(skip(self, ids), fields(count = ids.len()))]
    pub async fn resolve(&self, ids: &[String]) -> Result<Vec<LocationRecord>, anyhow::Error> {
        let mut seen = HashSet::new();
        let distinct: Vec<String> = ids
            .iter()
            .filter(|id| !id.trim().is_empty())
            .filter(|id| seen.insert(id.as_str()))
            .cloned()
            .collect();
        if distinct.is_empty() {
            return Ok(Vec::new());
        }
        self.store.find_locations(&distinct).await
    }

    pub async fn resolve_map(
        &self,
        ids: &[String],
    ) -> Result<HashMap<String, LocationRecord>, anyhow::Error> {
        Ok(self
            .resolve(ids)
            .await?
            .into_iter()
            .map(|loc| (loc.id.clone(), loc))
            .collect())
    }

    /// Append the school location of each secondary organisation.
    ///
    /// Only runs for users with more than one membership whose location
    /// chain already has enough levels. A failed lookup skips that school.
    #[instrument(skip_all, fields(orgs = affiliations.len(), levels = user_locations.len()))]
    pub async fn infer_schools(
        &self,
        user_locations: &mut Vec<LocationRecord>,
        affiliations: &[OrgAffiliation],
        root_org_id: Option<&str>,
        request_id: Option<&str>,
    ) {
        if affiliations.len() <= 1 || user_locations.len() < MIN_LEVELS_FOR_SCHOOL {
            return;
        }

        for org in affiliations {
            if org.organisation_id.trim().is_empty()
                || root_org_id.is_some_and(|root| org.organisation_id.eq_ignore_ascii_case(root))
            {
                continue;
            }
            let (Some(name), Some(code)) = (
                org.org_name.as_deref().filter(|s| !s.trim().is_empty()),
                org.external_id.as_deref().filter(|s| !s.trim().is_empty()),
            ) else {
                tracing::debug!(org_id = %org.organisation_id, "School details are blank");
                continue;
            };

            let filters = BTreeMap::from([
                ("name".to_string(), name.to_string()),
                ("type".to_string(), LOCATION_TYPE_SCHOOL.to_string()),
                ("code".to_string(), code.to_string()),
            ]);
            match self.search.search(&filters, request_id).await {
                Ok(found) => {
                    if let Some(school) = found.into_iter().next() {
                        user_locations.push(school);
                    }
                }
                Err(e) => {
                    tracing::warn!(org_id = %org.organisation_id, error = %e, "School lookup failed");
                    metrics::record_degraded("school_location");
                }
            }
        }
    }

    /// Code of a single location, if it resolves.
    pub async fn resolve_code(&self, location_id: &str) -> Result<Option<String>, anyhow::Error> {
        Ok(self
            .resolve(&[location_id.to_string()])
            .await?
            .into_iter()
            .next()
            .and_then(|loc| loc.code))
    }
}
