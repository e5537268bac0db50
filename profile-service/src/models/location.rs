//! Location model - denormalized nodes of the country/state/district/.. hierarchy.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Location type searched for during school inference.
pub const LOCATION_TYPE_SCHOOL: &str = "school";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct LocationRecord {
    pub id: String,
    pub code: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub location_type: Option<String>,
    pub parent_id: Option<String>,
}
