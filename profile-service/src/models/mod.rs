pub mod config_snapshot;
pub mod consent;
pub mod declaration;
pub mod external_identity;
pub mod location;
pub mod organisation;
pub mod role;
pub mod user;

pub use config_snapshot::ConfigSnapshot;
pub use consent::TncConfig;
pub use declaration::{Declaration, DeclarationRow};
pub use external_identity::{DeclaredIdType, ExternalIdentity, ExternalIdentityRow};
pub use location::LocationRecord;
pub use organisation::{
    AssociationType, OrgAffiliation, OrgType, OrganisationRecord, RootOrgView, UserOrgRow,
};
pub use role::Role;
pub use user::{LocationRef, UserFlags, UserFlagsView, UserProfile, UserRecord, UserTypeDetails};
