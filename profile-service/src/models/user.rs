//! User model - the canonical profile record and the values decoded from it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::FromRow;
use sqlx::types::Json;
use std::collections::HashMap;

/// Row of the `users` table as stored.
///
/// Carries structurally private columns; convert to [`UserProfile`] before
/// anything leaves the loader.
#[derive(Debug, Clone, Default, FromRow)]
pub struct UserRecord {
    pub id: String,
    pub user_name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// Encrypted at rest.
    pub email: Option<String>,
    /// Encrypted at rest.
    pub phone: Option<String>,
    pub masked_email: Option<String>,
    pub masked_phone: Option<String>,
    pub recovery_email: Option<String>,
    pub recovery_phone: Option<String>,
    pub prev_used_email: Option<String>,
    pub prev_used_phone: Option<String>,
    pub root_org_id: Option<String>,
    pub channel: Option<String>,
    /// Serialized `{"type": .., "subType": ..}`.
    pub profile_user_type: Option<String>,
    /// Serialized `[{"id": .., "type": ..}, ..]`.
    pub profile_location: Option<String>,
    pub managed_by: Option<String>,
    pub tnc_accepted_version: Option<String>,
    pub tnc_accepted_on: Option<DateTime<Utc>>,
    /// Terms type -> serialized acceptance document.
    pub all_tnc_accepted: Option<Json<HashMap<String, String>>>,
    pub flags_value: Option<i32>,
    pub dob: Option<String>,
    pub status: Option<i32>,
    pub is_deleted: Option<bool>,
    pub is_locked: Option<bool>,
    pub framework: Option<Json<Value>>,
    pub created_date: Option<DateTime<Utc>>,
    pub updated_date: Option<DateTime<Utc>>,
    pub password: Option<String>,
    pub temp_password: Option<String>,
    pub security_question: Option<String>,
    pub security_answer: Option<String>,
    pub address: Option<Json<Value>>,
}

impl UserRecord {
    /// Deleted or locked accounts are never served.
    pub fn is_unavailable(&self) -> bool {
        self.is_deleted.unwrap_or(false) || self.is_locked.unwrap_or(false)
    }
}

/// A loaded profile with every structurally private field removed.
#[derive(Debug, Clone, Default)]
pub struct UserProfile {
    pub id: String,
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
    pub root_org_id: Option<String>,
    pub channel: Option<String>,
    pub profile_user_type: Option<String>,
    pub profile_location: Option<String>,
    pub managed_by: Option<String>,
    pub tnc_accepted_version: Option<String>,
    pub tnc_accepted_on: Option<DateTime<Utc>>,
    pub all_tnc_accepted: HashMap<String, String>,
    pub flags: UserFlags,
    pub flags_value: i32,
    pub dob: Option<String>,
    pub status: Option<i32>,
    pub framework: Option<Value>,
    pub created_date: Option<DateTime<Utc>>,
    pub updated_date: Option<DateTime<Utc>>,
}

impl From<UserRecord> for UserProfile {
    fn from(r: UserRecord) -> Self {
        let flags_value = r.flags_value.unwrap_or(0);
        Self {
            id: r.id,
            user_name: r.user_name,
            first_name: r.first_name,
            last_name: r.last_name,
            email: r.email,
            phone: r.phone,
            masked_email: r.masked_email,
            masked_phone: r.masked_phone,
            recovery_email: r.recovery_email,
            recovery_phone: r.recovery_phone,
            prev_used_email: r.prev_used_email,
            prev_used_phone: r.prev_used_phone,
            root_org_id: r.root_org_id,
            channel: r.channel,
            profile_user_type: r.profile_user_type,
            profile_location: r.profile_location,
            managed_by: r.managed_by.filter(|m| !m.trim().is_empty()),
            tnc_accepted_version: r.tnc_accepted_version,
            tnc_accepted_on: r.tnc_accepted_on,
            all_tnc_accepted: r.all_tnc_accepted.map(|j| j.0).unwrap_or_default(),
            flags: UserFlags::from_value(flags_value),
            flags_value,
            dob: r.dob,
            status: r.status,
            framework: r.framework.map(|j| j.0),
            created_date: r.created_date,
            updated_date: r.updated_date,
        }
    }
}

/// Declared user type, e.g. `{"type": "teacher", "subType": "hm"}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserTypeDetails {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub user_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_type: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One declared location reference; only `id` is interpreted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocationRef {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Decode a serialized location list; a blank value is an empty list.
pub fn parse_location_refs(raw: &str) -> Result<Vec<LocationRef>, serde_json::Error> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(raw)
}

/// Ids of a declared location list, skipping entries without one.
pub fn location_ids(refs: &[LocationRef]) -> Vec<String> {
    refs.iter()
        .filter_map(|r| r.id.as_deref())
        .filter(|id| !id.trim().is_empty())
        .map(str::to_string)
        .collect()
}

/// Bit-packed feature flags of a user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UserFlags(u32);

impl UserFlags {
    pub const PHONE_VERIFIED: u32 = 1;
    pub const EMAIL_VERIFIED: u32 = 1 << 1;
    pub const STATE_VALIDATED: u32 = 1 << 2;

    pub fn from_value(value: i32) -> Self {
        Self(value as u32)
    }

    pub fn bits(&self) -> u32 {
        self.0
    }

    pub fn phone_verified(&self) -> bool {
        self.0 & Self::PHONE_VERIFIED != 0
    }

    pub fn email_verified(&self) -> bool {
        self.0 & Self::EMAIL_VERIFIED != 0
    }

    pub fn state_validated(&self) -> bool {
        self.0 & Self::STATE_VALIDATED != 0
    }
}

/// Named booleans decoded from [`UserFlags`], merged into the response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserFlagsView {
    pub phone_verified: bool,
    pub email_verified: bool,
    pub state_validated: bool,
}

impl From<UserFlags> for UserFlagsView {
    fn from(flags: UserFlags) -> Self {
        Self {
            phone_verified: flags.phone_verified(),
            email_verified: flags.email_verified(),
            state_validated: flags.state_validated(),
        }
    }
}
