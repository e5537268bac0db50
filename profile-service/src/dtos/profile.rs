//! Request and response shapes of the profile read API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

use crate::models::{
    Declaration, ExternalIdentity, LocationRecord, LocationRef, OrgAffiliation, Role, RootOrgView,
    UserFlagsView, UserTypeDetails,
};

/// Response contract selected by the route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiVersion {
    /// Carries user-type/location-id convenience fields and the default-value block.
    V3,
    /// Omits the convenience fields and strips the default-value keys.
    V4,
}

impl ApiVersion {
    pub fn is_legacy(&self) -> bool {
        matches!(self, ApiVersion::V3)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ApiVersion::V3 => "v3",
            ApiVersion::V4 => "v4",
        }
    }
}

impl std::str::FromStr for ApiVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "v3" => Ok(ApiVersion::V3),
            "v4" => Ok(ApiVersion::V4),
            _ => Err(format!("Unsupported API version: {}", s)),
        }
    }
}

/// Optional sections a caller can ask for through `fields`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ProfileField {
    Topic,
    Organisations,
    Roles,
    Locations,
    Declarations,
    ExternalIds,
}

impl ProfileField {
    fn parse(token: &str) -> Option<Self> {
        match token {
            "topic" | "topics" => Some(ProfileField::Topic),
            "organisations" => Some(ProfileField::Organisations),
            "roles" => Some(ProfileField::Roles),
            "locations" => Some(ProfileField::Locations),
            "declarations" => Some(ProfileField::Declarations),
            "externalIds" => Some(ProfileField::ExternalIds),
            _ => None,
        }
    }
}

/// Parsed `fields` selector.
///
/// A non-blank selector counts as present even when none of its tokens
/// are recognised.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldSelection {
    present: bool,
    fields: BTreeSet<ProfileField>,
}

impl FieldSelection {
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw.filter(|r| !r.trim().is_empty()) else {
            return Self::default();
        };
        Self {
            present: true,
            fields: raw
                .split(',')
                .map(str::trim)
                .filter_map(ProfileField::parse)
                .collect(),
        }
    }

    pub fn is_present(&self) -> bool {
        self.present
    }

    pub fn contains(&self, field: ProfileField) -> bool {
        self.fields.contains(&field)
    }
}

/// Query string of the read endpoints.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadProfileQuery {
    pub fields: Option<String>,
    pub id_type: Option<String>,
    pub provider: Option<String>,
    /// Any casing of `true` enables tokens; every other value disables them.
    pub with_tokens: Option<String>,
}

impl ReadProfileQuery {
    pub fn wants_tokens(&self) -> bool {
        self.with_tokens
            .as_deref()
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("true"))
    }
}

/// Everything the pipeline needs to know about one read.
#[derive(Debug, Clone)]
pub struct ProfileReadRequest {
    pub user_id: String,
    pub id_type: Option<String>,
    pub provider: Option<String>,
    pub private: bool,
    pub fields: FieldSelection,
    pub with_tokens: bool,
    pub version: ApiVersion,
}

impl ProfileReadRequest {
    pub fn new(user_id: impl Into<String>, version: ApiVersion) -> Self {
        Self {
            user_id: user_id.into(),
            id_type: None,
            provider: None,
            private: false,
            fields: FieldSelection::default(),
            with_tokens: false,
            version,
        }
    }

    pub fn from_query(
        user_id: String,
        version: ApiVersion,
        private: bool,
        query: ReadProfileQuery,
    ) -> Self {
        let with_tokens = query.wants_tokens();
        Self {
            user_id,
            id_type: query.id_type.filter(|s| !s.trim().is_empty()),
            provider: query.provider.filter(|s| !s.trim().is_empty()),
            private,
            fields: FieldSelection::parse(query.fields.as_deref()),
            with_tokens,
            version,
        }
    }
}

/// Caller identity as asserted by the authenticating gateway.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Requester {
    pub requested_by: Option<String>,
    pub managed_for: Option<String>,
    /// Pre-issued managed token to echo instead of issuing a new one.
    pub managed_token: Option<String>,
    pub request_id: Option<String>,
}

impl Requester {
    pub fn new(requested_by: impl Into<String>) -> Self {
        Self {
            requested_by: Some(requested_by.into()),
            ..Default::default()
        }
    }

    /// The caller is reading its own profile or one it acts for.
    pub fn is_reading_self(&self, user_id: &str) -> bool {
        [&self.requested_by, &self.managed_for]
            .into_iter()
            .flatten()
            .any(|id| id.eq_ignore_ascii_case(user_id))
    }
}

/// Terms-of-service state derived from the consent configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsentState {
    pub latest_version: Option<String>,
    pub latest_version_url: Option<String>,
    pub prompt: bool,
}

/// Typed profile before version-specific projection.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileView {
    pub id: String,
    pub identifier: String,
    pub user_id: String,
    pub user_name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub masked_email: Option<String>,
    pub masked_phone: Option<String>,
    pub recovery_email: Option<String>,
    pub recovery_phone: Option<String>,
    pub prev_used_email: Option<String>,
    pub prev_used_phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enc_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enc_phone: Option<String>,
    pub root_org_id: Option<String>,
    pub root_org: Option<RootOrgView>,
    pub channel: Option<String>,
    pub profile_user_type: UserTypeDetails,
    pub profile_location: Vec<LocationRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub managed_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub managed_token: Option<String>,
    pub tnc_accepted_version: Option<String>,
    pub tnc_accepted_on: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub all_tnc_accepted: Option<BTreeMap<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tnc_latest_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tnc_latest_version_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_tnc: Option<bool>,
    pub flags_value: i32,
    #[serde(flatten)]
    pub flags: UserFlagsView,
    pub dob: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_minor: Option<bool>,
    pub status: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub framework: Option<Value>,
    pub created_date: Option<DateTime<Utc>>,
    pub updated_date: Option<DateTime<Utc>>,
    pub organisations: Vec<OrgAffiliation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_ids: Option<Vec<ExternalIdentity>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_login_time: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topics: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role_list: Option<Vec<Role>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_locations: Option<Vec<LocationRecord>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub declarations: Option<Vec<Declaration>>,
}

impl ProfileView {
    pub fn apply_consent(&mut self, consent: ConsentState) {
        self.tnc_latest_version = consent.latest_version;
        self.tnc_latest_version_url = consent.latest_version_url;
        self.prompt_tnc = Some(consent.prompt);
    }
}

#[derive(Debug, Serialize)]
pub struct ResponseParams {
    pub resmsgid: String,
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ResponseResult {
    pub response: Map<String, Value>,
}

/// Envelope wrapped around every successful read.
#[derive(Debug, Serialize)]
pub struct ReadProfileResponse {
    pub id: &'static str,
    pub ver: &'static str,
    pub ts: DateTime<Utc>,
    pub params: ResponseParams,
    pub result: ResponseResult,
}

impl ReadProfileResponse {
    pub fn new(version: ApiVersion, request_id: String, profile: Map<String, Value>) -> Self {
        Self {
            id: "api.user.read",
            ver: version.as_str(),
            ts: Utc::now(),
            params: ResponseParams {
                resmsgid: request_id,
                status: "successful",
            },
            result: ResponseResult { response: profile },
        }
    }
}
