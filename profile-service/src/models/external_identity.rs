//! External identity model - provider-scoped ids mapped onto a user.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use std::collections::{HashMap, HashSet};

use super::declaration::DeclarationRow;

/// Row of the `user_external_identities` table.
///
/// `external_id`/`id_type`/`provider` are the normalized lookup keys; the
/// `original_*` columns keep what was actually submitted.
#[derive(Debug, Clone, Default, FromRow)]
pub struct ExternalIdentityRow {
    pub user_id: String,
    pub external_id: Option<String>,
    pub id_type: Option<String>,
    pub provider: Option<String>,
    pub original_external_id: Option<String>,
    pub original_id_type: Option<String>,
    pub original_provider: Option<String>,
    pub created_by: Option<String>,
    pub created_on: Option<DateTime<Utc>>,
    pub last_updated_by: Option<String>,
    pub last_updated_on: Option<DateTime<Utc>>,
}

/// Public form of an external identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalIdentity {
    pub id: Option<String>,
    pub id_type: Option<String>,
    pub provider: Option<String>,
}

/// Self-declared identity kinds that need special handling on read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclaredIdType {
    Email,
    Phone,
    District,
    State,
}

impl DeclaredIdType {
    pub fn parse(id_type: &str) -> Option<Self> {
        match id_type {
            "declared-email" | "declaredEmail" => Some(DeclaredIdType::Email),
            "declared-phone" | "declaredPhone" => Some(DeclaredIdType::Phone),
            "declared-district" | "declaredDistrict" => Some(DeclaredIdType::District),
            "declared-state" | "declaredState" => Some(DeclaredIdType::State),
            _ => None,
        }
    }

    /// Value is PII and stored encrypted.
    pub fn is_encrypted(&self) -> bool {
        matches!(self, DeclaredIdType::Email | DeclaredIdType::Phone)
    }

    /// Value is a location id to be shown as the location's code.
    pub fn is_location(&self) -> bool {
        matches!(self, DeclaredIdType::District | DeclaredIdType::State)
    }
}

/// Append declaration info entries as identity rows, skipping any
/// `(idType, provider)` pair the verified rows already hold.
pub fn merge_declared_identities(
    user_id: &str,
    mut verified: Vec<ExternalIdentityRow>,
    declarations: &[DeclarationRow],
) -> Vec<ExternalIdentityRow> {
    let mut seen: HashSet<(String, String)> = verified
        .iter()
        .filter_map(|row| {
            Some((
                row.original_id_type.clone().or_else(|| row.id_type.clone())?,
                row.original_provider.clone().or_else(|| row.provider.clone())?,
            ))
        })
        .collect();

    for declaration in declarations {
        let Some(org_id) = declaration.org_id.as_deref() else {
            continue;
        };
        let Some(info) = declaration.user_info.as_ref() else {
            continue;
        };
        for (id_type, value) in info.0.iter() {
            if value.trim().is_empty() {
                continue;
            }
            if !seen.insert((id_type.clone(), org_id.to_string())) {
                continue;
            }
            verified.push(ExternalIdentityRow {
                user_id: user_id.to_string(),
                external_id: Some(value.to_lowercase()),
                id_type: Some(id_type.to_lowercase()),
                provider: Some(org_id.to_lowercase()),
                original_external_id: Some(value.clone()),
                original_id_type: Some(id_type.clone()),
                original_provider: Some(org_id.to_string()),
                ..Default::default()
            });
        }
    }

    verified
}

/// Replace organisation-id providers with the organisation's channel.
///
/// An id type that repeats the old provider is relabelled too.
pub fn apply_provider_channels(
    identities: Vec<ExternalIdentity>,
    channels: &HashMap<String, String>,
) -> Vec<ExternalIdentity> {
    identities
        .into_iter()
        .map(|mut identity| {
            if let Some(channel) = identity.provider.as_ref().and_then(|p| channels.get(p)) {
                if identity.id_type == identity.provider {
                    identity.id_type = Some(channel.clone());
                }
                identity.provider = Some(channel.clone());
            }
            identity
        })
        .collect()
}
