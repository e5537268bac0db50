//! Location search collaborator, used for exact-match school lookups.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use service_core::observability::outbound_headers;
use std::collections::BTreeMap;
use std::sync::Mutex;
use tracing::instrument;

use crate::config::SearchConfig;
use crate::models::LocationRecord;

/// Exact-match filter query against the location index.
#[async_trait]
pub trait LocationSearch: Send + Sync {
    /// Matching locations, best match first.
    async fn search(
        &self,
        filters: &BTreeMap<String, String>,
        request_id: Option<&str>,
    ) -> Result<Vec<LocationRecord>, anyhow::Error>;
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    request: SearchFilters<'a>,
}

#[derive(Debug, Serialize)]
struct SearchFilters<'a> {
    filters: &'a BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    result: SearchResult,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    #[serde(default)]
    response: Vec<SearchHit>,
}

/// Index document; ids are not guaranteed on every hit.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchHit {
    id: Option<String>,
    code: Option<String>,
    name: Option<String>,
    #[serde(rename = "type")]
    location_type: Option<String>,
    parent_id: Option<String>,
}

impl SearchResult {
    /// Hits that can be used as locations, in ranking order.
    fn into_locations(self) -> Vec<LocationRecord> {
        self.response
            .into_iter()
            .filter_map(|hit| {
                Some(LocationRecord {
                    id: hit.id.filter(|id| !id.trim().is_empty())?,
                    code: hit.code,
                    name: hit.name,
                    location_type: hit.location_type,
                    parent_id: hit.parent_id,
                })
            })
            .collect()
    }
}

/// HTTP client of the location search API.
pub struct HttpLocationSearch {
    client: Client,
    base_url: String,
}

impl HttpLocationSearch {
    pub fn new(config: &SearchConfig) -> Result<Self, anyhow::Error> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build search client: {}", e))?;
        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl LocationSearch for HttpLocationSearch {
    #[instrument(skip(self, request_id), fields(filters = ?filters))]
    async fn search(
        &self,
        filters: &BTreeMap<String, String>,
        request_id: Option<&str>,
    ) -> Result<Vec<LocationRecord>, anyhow::Error> {
        let response = self
            .client
            .post(format!("{}/v1/location/search", self.base_url))
            .headers(outbound_headers(request_id))
            .json(&SearchRequest {
                request: SearchFilters { filters },
            })
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to reach location search: {}", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!(
                "Location search returned error status {}: {}",
                status,
                body
            ));
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to parse location search response: {}", e))?;
        Ok(parsed.result.into_locations())
    }
}

/// Mock search for testing: answers with every seeded location whose
/// fields match all filters.
#[derive(Default)]
pub struct MockLocationSearch {
    locations: Mutex<Vec<LocationRecord>>,
    failing: bool,
    calls: Mutex<Vec<BTreeMap<String, String>>>,
}

impl MockLocationSearch {
    pub fn new(locations: Vec<LocationRecord>) -> Self {
        Self {
            locations: Mutex::new(locations),
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Default::default()
        }
    }

    /// Filters of every search issued so far.
    pub fn calls(&self) -> Vec<BTreeMap<String, String>> {
        self.calls
            .lock()
            .map(|c| c.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl LocationSearch for MockLocationSearch {
    async fn search(
        &self,
        filters: &BTreeMap<String, String>,
        _request_id: Option<&str>,
    ) -> Result<Vec<LocationRecord>, anyhow::Error> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(filters.clone());
        }
        if self.failing {
            return Err(anyhow::anyhow!("Location search unavailable"));
        }
        let locations = self
            .locations
            .lock()
            .map_err(|e| anyhow::anyhow!("Mock search poisoned: {}", e))?;
        Ok(locations
            .iter()
            .filter(|loc| {
                filters.iter().all(|(key, value)| {
                    let field = match key.as_str() {
                        "id" => Some(&loc.id),
                        "code" => loc.code.as_ref(),
                        "name" => loc.name.as_ref(),
                        "type" => loc.location_type.as_ref(),
                        "parentId" => loc.parent_id.as_ref(),
                        _ => None,
                    };
                    field == Some(value)
                })
            })
            .cloned()
            .collect())
    }
}
