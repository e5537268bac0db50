//! Organisation model - memberships of a user and the organisations behind them.

use serde::Serialize;
use sqlx::FromRow;
use sqlx::types::Json;

use super::location::LocationRecord;
use super::user::LocationRef;

/// Row of the `user_organisations` table.
#[derive(Debug, Clone, Default, FromRow)]
pub struct UserOrgRow {
    pub id: String,
    pub user_id: String,
    pub organisation_id: String,
    pub roles: Option<Json<Vec<String>>>,
    pub hash_tag_id: Option<String>,
    pub org_join_date: Option<String>,
    pub association_type: Option<i32>,
    pub is_deleted: Option<bool>,
}

/// How a membership came to exist. Bits are independent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssociationType(u32);

impl AssociationType {
    pub const SSO: u32 = 1;
    pub const SELF_DECLARATION: u32 = 1 << 1;
    pub const SYSTEM_UPLOAD: u32 = 1 << 2;

    pub fn from_value(value: i32) -> Self {
        Self(value as u32)
    }

    pub fn is_sso(&self) -> bool {
        self.0 & Self::SSO != 0
    }

    pub fn is_self_declaration(&self) -> bool {
        self.0 & Self::SELF_DECLARATION != 0
    }

    pub fn is_system_upload(&self) -> bool {
        self.0 & Self::SYSTEM_UPLOAD != 0
    }
}

/// Organisation type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrgType {
    School,
    Other(i32),
}

impl OrgType {
    pub fn from_code(code: i32) -> Self {
        match code {
            2 => OrgType::School,
            other => OrgType::Other(other),
        }
    }

    pub fn is_school(&self) -> bool {
        matches!(self, OrgType::School)
    }
}

/// Row of the `organisations` table.
#[derive(Debug, Clone, Default, FromRow)]
pub struct OrganisationRecord {
    pub id: String,
    pub org_name: Option<String>,
    pub description: Option<String>,
    pub channel: Option<String>,
    pub slug: Option<String>,
    pub hash_tag_id: Option<String>,
    pub external_id: Option<String>,
    pub is_tenant: Option<bool>,
    pub status: Option<i32>,
    pub organisation_type: Option<i32>,
    /// Serialized `[{"id": .., "type": ..}, ..]`.
    pub org_location: Option<String>,
}

/// One membership as surfaced in `organisations`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrgAffiliation {
    pub id: String,
    pub user_id: String,
    pub organisation_id: String,
    pub roles: Vec<String>,
    pub hash_tag_id: Option<String>,
    pub org_join_date: Option<String>,
    pub association_type: Option<i32>,
    #[serde(rename = "isSSO", skip_serializing_if = "Option::is_none")]
    pub is_sso: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_self_declaration: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_system_upload: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub org_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_ids: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub org_location: Option<Vec<LocationRef>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_school: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locations: Option<Vec<LocationRecord>>,
}

impl From<UserOrgRow> for OrgAffiliation {
    fn from(row: UserOrgRow) -> Self {
        let association = row.association_type.map(AssociationType::from_value);
        Self {
            id: row.id,
            user_id: row.user_id,
            organisation_id: row.organisation_id,
            roles: row.roles.map(|j| j.0).unwrap_or_default(),
            hash_tag_id: row.hash_tag_id,
            org_join_date: row.org_join_date,
            association_type: row.association_type,
            is_sso: association.map(|a| a.is_sso()),
            is_self_declaration: association.map(|a| a.is_self_declaration()),
            is_system_upload: association.map(|a| a.is_system_upload()),
            ..Default::default()
        }
    }
}

/// The root organisation embedded as `rootOrg`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RootOrgView {
    pub id: String,
    pub org_name: Option<String>,
    pub description: Option<String>,
    pub channel: Option<String>,
    pub slug: Option<String>,
    pub hash_tag_id: Option<String>,
    pub external_id: Option<String>,
    pub is_tenant: Option<bool>,
    pub status: Option<i32>,
    pub organisation_type: Option<i32>,
    pub org_location: Vec<LocationRef>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_association_bits_are_disjoint() {
        for bits in 0..8 {
            let a = AssociationType::from_value(bits);
            assert_eq!(a.is_sso(), bits & 1 != 0);
            assert_eq!(a.is_self_declaration(), bits & 2 != 0);
            assert_eq!(a.is_system_upload(), bits & 4 != 0);
        }
    }

    #[test]
    fn test_affiliation_without_association_type_has_no_flags() {
        let row = UserOrgRow {
            id: "m1".to_string(),
            user_id: "u1".to_string(),
            organisation_id: "o1".to_string(),
            ..Default::default()
        };
        let affiliation = OrgAffiliation::from(row);
        assert!(affiliation.is_sso.is_none());

        let json = serde_json::to_value(&affiliation).unwrap();
        assert!(json.get("isSSO").is_none());
        assert_eq!(json["organisationId"], "o1");
    }

    #[test]
    fn test_affiliation_serializes_sso_key() {
        let row = UserOrgRow {
            association_type: Some(3),
            ..Default::default()
        };
        let json = serde_json::to_value(OrgAffiliation::from(row)).unwrap();
        assert_eq!(json["isSSO"], true);
        assert_eq!(json["isSelfDeclaration"], true);
        assert_eq!(json["isSystemUpload"], false);
    }

    #[test]
    fn test_org_type_school() {
        assert!(OrgType::from_code(2).is_school());
        assert!(!OrgType::from_code(5).is_school());
        assert_eq!(OrgType::from_code(5), OrgType::Other(5));
        assert_eq!(OrgType::from_code(9), OrgType::Other(9));
    }
}
