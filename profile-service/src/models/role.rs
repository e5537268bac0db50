use serde::{Deserialize, Serialize};

/// Entry of the role catalog returned with `fields=roles`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: String,
    pub name: String,
}
