use super::role::Role;

/// Cache keys the snapshot is built from.
pub const TNC_CONFIG_KEY: &str = "tncConfig";
pub const USER_READ_ROLES_KEY: &str = "userReadRoles";

/// Immutable view of the process-wide configuration taken at the start of
/// a request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigSnapshot {
    pub version: u64,
    /// Raw `tncConfig` document; parsed per request so a malformed value
    /// only disables consent computation.
    pub tnc_config: Option<String>,
    pub user_read_roles: Vec<Role>,
}
