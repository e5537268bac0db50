//! Response shaping: derived fields and the version-specific projection.
//!
//! The pipeline fills a typed [`ProfileView`]; [`Projection::apply`] turns
//! it into the response map. All version-dependent keys and scratch fields
//! are added or removed in that one place.

use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};

use crate::dtos::{ApiVersion, ProfileView};
use crate::models::UserTypeDetails;
use crate::models::user::{LocationRef, parse_location_refs};

/// Years since the (year-end normalized) birth year up to which a user
/// still counts as a minor.
const MINOR_AGE_LIMIT: i32 = 19;

const DEFAULT_COUNTRY_CODE: &str = "+91";

/// Keys of the legacy user default block. All default to null except
/// `countryCode`.
pub const USER_DEFAULT_KEYS: &[&str] = &[
    "avatar",
    "gender",
    "grade",
    "language",
    "lastLoginTime",
    "location",
    "profileSummary",
    "profileVisibility",
    "tempPassword",
    "thumbnail",
    "registryId",
    "accesscode",
    "subject",
    "webPages",
    "currentLoginTime",
    "password",
    "loginId",
    "countryCode",
];

/// Keys of the legacy organisation default block, all null.
pub const ORG_DEFAULT_KEYS: &[&str] = &[
    "dateTime",
    "preferredLanguage",
    "approvedBy",
    "addressId",
    "approvedDate",
    "communityId",
    "homeUrl",
    "imgUrl",
    "isApproved",
    "locationId",
    "noOfMembers",
    "orgCode",
    "theme",
    "thumbnail",
    "isDefault",
    "parentOrgId",
    "orgTypeId",
    "orgType",
];

const USER_TYPE: &str = "userType";
const USER_SUB_TYPE: &str = "userSubType";
const LOCATION_IDS: &str = "locationIds";
const PROFILE_LOCATION: &str = "profileLocation";
const USER_LOCATIONS: &str = "userLocations";
const ROOT_ORG: &str = "rootOrg";

/// Minor flag from a `YYYY-MM-DD` birth date. `None` when there is no
/// usable date.
pub fn is_minor(dob: Option<&str>, current_year: i32) -> Option<bool> {
    let dob = dob.filter(|d| !d.trim().is_empty())?;
    let year = dob.split('-').next()?.trim().parse::<i32>().ok();
    if year.is_none() {
        tracing::warn!(dob = %dob, "Unparseable date of birth");
    }
    year.map(|birth_year| current_year - birth_year <= MINOR_AGE_LIMIT)
}

/// Declared user type; malformed documents read as empty.
pub fn parse_user_type(raw: Option<&str>, user_id: &str) -> UserTypeDetails {
    let Some(raw) = raw.filter(|r| !r.trim().is_empty()) else {
        return UserTypeDetails::default();
    };
    serde_json::from_str(raw).unwrap_or_else(|e| {
        tracing::warn!(user_id = %user_id, error = %e, "Malformed profile user type");
        UserTypeDetails::default()
    })
}

/// Declared locations; malformed documents read as empty.
pub fn parse_profile_location(raw: Option<&str>, user_id: &str) -> Vec<LocationRef> {
    let Some(raw) = raw else {
        return Vec::new();
    };
    parse_location_refs(raw).unwrap_or_else(|e| {
        tracing::warn!(user_id = %user_id, error = %e, "Malformed profile location list");
        Vec::new()
    })
}

/// Each accepted-terms document parsed to JSON, or kept as a string when
/// it is not JSON.
pub fn parse_accepted_terms(raw: &HashMap<String, String>) -> BTreeMap<String, Value> {
    raw.iter()
        .map(|(kind, doc)| {
            let value =
                serde_json::from_str(doc).unwrap_or_else(|_| Value::String(doc.clone()));
            (kind.clone(), value)
        })
        .collect()
}

/// Final, version-specific projection of a [`ProfileView`].
#[derive(Debug, Clone)]
pub struct Projection {
    pub version: ApiVersion,
    pub user_type: UserTypeDetails,
    pub location_ids: Vec<String>,
}

impl Projection {
    pub fn apply(&self, view: &ProfileView) -> Result<Map<String, Value>, serde_json::Error> {
        let mut map = match serde_json::to_value(view)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };

        if self.version.is_legacy() {
            self.add_legacy_fields(&mut map);
        } else {
            strip_keys(&mut map, USER_DEFAULT_KEYS);
            strip_keys(&mut map, &[USER_TYPE, USER_SUB_TYPE, LOCATION_IDS]);
            if let Some(Value::Object(root)) = map.get_mut(ROOT_ORG) {
                strip_keys(root, ORG_DEFAULT_KEYS);
            }
        }

        if map.contains_key(USER_LOCATIONS) {
            strip_keys(&mut map, &[LOCATION_IDS, PROFILE_LOCATION]);
        }
        Ok(map)
    }

    fn add_legacy_fields(&self, map: &mut Map<String, Value>) {
        map.insert(USER_TYPE.to_string(), optional(&self.user_type.user_type));
        map.insert(USER_SUB_TYPE.to_string(), optional(&self.user_type.sub_type));
        map.insert(
            LOCATION_IDS.to_string(),
            Value::from(self.location_ids.clone()),
        );

        for key in USER_DEFAULT_KEYS {
            let default = if *key == "countryCode" {
                Value::from(DEFAULT_COUNTRY_CODE)
            } else {
                Value::Null
            };
            map.entry(key.to_string()).or_insert(default);
        }

        if let Some(Value::Object(root)) = map.get_mut(ROOT_ORG) {
            for key in ORG_DEFAULT_KEYS {
                root.entry(key.to_string()).or_insert(Value::Null);
            }
        }
    }
}

fn optional(value: &Option<String>) -> Value {
    value.clone().map(Value::String).unwrap_or(Value::Null)
}

fn strip_keys(map: &mut Map<String, Value>, keys: &[&str]) {
    for key in keys {
        map.remove(*key);
    }
}
