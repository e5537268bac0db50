//! Declaration model - self-reported fields a user submitted to an organisation.

use serde::Serialize;
use sqlx::FromRow;
use sqlx::types::Json;
use std::collections::BTreeMap;

/// Encrypted keys inside a declaration's info map.
pub const DECLARED_EMAIL: &str = "declared-email";
pub const DECLARED_PHONE: &str = "declared-phone";

/// Row of the `user_declarations` table.
#[derive(Debug, Clone, Default, FromRow)]
pub struct DeclarationRow {
    pub user_id: String,
    pub org_id: Option<String>,
    pub persona: Option<String>,
    pub status: Option<String>,
    pub error_type: Option<String>,
    pub user_info: Option<Json<BTreeMap<String, String>>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Declaration {
    pub status: Option<String>,
    pub error_type: Option<String>,
    pub org_id: Option<String>,
    pub persona: Option<String>,
    pub info: BTreeMap<String, String>,
}
